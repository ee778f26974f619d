// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene façade: a graph, its root, and the animators driving it.

use alloc::boxed::Box;
use alloc::vec::Vec;

use canopy_draw::{Surface, Transform};
use kurbo::{Point, Rect};

use crate::graph::SceneGraph;
use crate::node::NodeId;
use crate::{InvalidationController, RenderContext};

/// Mutates graph state as a function of time.
///
/// Animators run in registration order, so a later animator deliberately
/// overrides an earlier one targeting the same attribute.
///
/// Closures implement this directly:
///
/// ```
/// use canopy_scene::{Animator, SceneGraph};
///
/// let mut animators: Vec<Box<dyn Animator>> = Vec::new();
/// animators.push(Box::new(|sg: &mut SceneGraph, t: f64| {
///     let _ = (sg, t);
/// }));
/// ```
pub trait Animator {
    /// Applies this animator's state for time `t` (in seconds).
    fn tick(&mut self, graph: &mut SceneGraph, t: f64);
}

impl<F: FnMut(&mut SceneGraph, f64)> Animator for F {
    fn tick(&mut self, graph: &mut SceneGraph, t: f64) {
        self(graph, t);
    }
}

/// A scene graph bound to a root render node, with animation and damage
/// tracking in one place.
///
/// The usual frame loop is [`animate`](Scene::animate), then
/// [`revalidate`](Scene::revalidate) with a controller to learn what
/// changed, then [`render`](Scene::render) (typically restricted to the
/// damaged region by the caller).
pub struct Scene {
    graph: SceneGraph,
    root: NodeId,
    animators: Vec<Box<dyn Animator>>,
}

impl Scene {
    /// Wraps a graph and a root render node.
    #[must_use]
    pub fn new(graph: SceneGraph, root: NodeId) -> Self {
        debug_assert!(
            graph.node(root).kind.is_render(),
            "scene root is not a render node"
        );
        Self {
            graph,
            root,
            animators: Vec::new(),
        }
    }

    /// The underlying graph.
    #[must_use]
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// The underlying graph, for mutation between frames.
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// The root render node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Registers an animator. Order of registration is order of execution.
    pub fn push_animator(&mut self, animator: Box<dyn Animator>) {
        self.animators.push(animator);
    }

    /// Runs all animators for time `t`.
    ///
    /// This only mutates graph state (invalidating as it goes); call
    /// [`revalidate`](Scene::revalidate) afterwards.
    pub fn animate(&mut self, t: f64) {
        for animator in &mut self.animators {
            animator.tick(&mut self.graph, t);
        }
    }

    /// Revalidates the graph, reporting damage to `ic` if given, and
    /// returns the root bounds.
    pub fn revalidate(&mut self, ic: Option<&mut InvalidationController>) -> Rect {
        self.graph.revalidate(self.root, ic, &Transform::IDENTITY)
    }

    /// Renders the scene, revalidating first if needed.
    ///
    /// Rendering without damage tracking; callers that want damage call
    /// [`revalidate`](Scene::revalidate) with a controller beforehand, which
    /// makes the revalidation here a no-op.
    pub fn render(&mut self, surface: &mut dyn Surface) {
        self.revalidate(None);
        self.graph.render(self.root, surface);
    }

    /// Renders the scene under an inherited render context.
    pub fn render_with_context(&mut self, surface: &mut dyn Surface, ctx: &RenderContext) {
        self.revalidate(None);
        self.graph.render_node(self.root, surface, Some(ctx));
    }

    /// Hit-tests the scene at a point in root coordinates.
    #[must_use]
    pub fn node_at(&self, point: Point) -> Option<NodeId> {
        self.graph.node_at(self.root, point)
    }
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scene")
            .field("graph", &self.graph)
            .field("root", &self.root)
            .field("animators", &self.animators.len())
            .finish()
    }
}
