// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Scene: a retained scene graph with precise damage tracking.
//!
//! The graph is a DAG of lightweight nodes — geometry, paint, and transform
//! producers combined by render nodes — addressed by [`NodeId`] handles.
//! Mutations are cheap: a setter flags the node and walks its observer edges
//! marking dependents stale. The next [`SceneGraph::revalidate`] recomputes
//! cached bounds for exactly the stale region and, given an
//! [`InvalidationController`], reports the damaged device-space rectangles,
//! so a renderer can redraw only what changed.
//!
//! Rendering targets any [`canopy_draw::Surface`]; the graph itself never
//! touches pixels.
//!
//! # Example
//!
//! ```
//! use canopy_draw::{Transform, record::RecordingSurface};
//! use canopy_scene::{InvalidationController, Scene, SceneGraph};
//! use kurbo::Rect;
//! use peniko::Color;
//!
//! let mut sg = SceneGraph::new();
//! let geo = sg.add_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
//! let paint = sg.add_color(Color::WHITE);
//! let draw = sg.add_draw(geo, paint);
//! let mut scene = Scene::new(sg, draw);
//!
//! // First frame: everything is new.
//! let mut ic = InvalidationController::new();
//! scene.revalidate(Some(&mut ic));
//! assert_eq!(ic.bounds(), Rect::new(0.0, 0.0, 100.0, 100.0));
//!
//! // Mutate and find out what changed.
//! scene.graph_mut().set_rect(geo, Rect::new(0.0, 0.0, 150.0, 100.0));
//! let mut ic = InvalidationController::new();
//! scene.revalidate(Some(&mut ic));
//! assert_eq!(ic.bounds(), Rect::new(0.0, 0.0, 150.0, 100.0));
//!
//! let mut surface = RecordingSurface::new();
//! scene.render(&mut surface);
//! assert_eq!(surface.depth(), 0);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod draw;
mod effects;
mod geometry;
mod graph;
mod invalidation;
mod node;
mod paint;
mod render;
mod scene;
mod transform;
mod util;

pub use effects::MaskMode;
pub use geometry::MergeMode;
pub use graph::SceneGraph;
pub use invalidation::InvalidationController;
pub use node::NodeId;
pub use render::{RenderContext, ScopedRenderContext};
pub use scene::{Animator, Scene};
