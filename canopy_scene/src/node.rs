// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node identifiers, state flags, and the closed set of node kinds.

use kurbo::Rect;
use smallvec::SmallVec;

use crate::draw::{DrawNode, GroupNode, ImageNode};
use crate::effects::{
    BlendModeEffectNode, ClipEffectNode, ColorFilterEffectNode, FilterEffectNode, MaskEffectNode,
    OpacityEffectNode, ShaderEffectNode, TransformEffectNode,
};
use crate::geometry::{
    GeometryTransformNode, MergeNode, PathNode, RRectNode, RectNode, RoundNode, TrimNode,
};
use crate::paint::PaintNode;
use crate::transform::TransformNode;

/// Identifier for a node in a [`SceneGraph`](crate::SceneGraph).
///
/// This is a small, copyable handle consisting of a slot index and a
/// generation counter. It stays stable while the node is alive and becomes
/// stale once the node is removed; a stale id never aliases a different live
/// node because the generation must match.
///
/// Sharing a node between multiple parents is expressed simply by handing
/// the same `NodeId` to several composite nodes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Mutable per-node invalidation state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct NodeFlags: u8 {
        /// Cached bounds are stale; the node needs revalidation.
        const INVALIDATED  = 0b0000_0001;
        /// This node is the damage receiver for a pending mutation.
        const DAMAGED      = 0b0000_0010;
        /// The node is currently on the traversal stack (cycle guard).
        const IN_TRAVERSAL = 0b0000_0100;
    }
}

bitflags::bitflags! {
    /// Invalidation behavior, fixed at construction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct InvalTraits: u8 {
        /// Damage is never absorbed here; it bubbles to observers. Geometry,
        /// paint, and transform nodes carry this so that damage is always
        /// attributed to the render node that aggregates them.
        const BUBBLE_DAMAGE   = 0b0000_0001;
        /// Damage reporting always uses this node's own before/after bounds,
        /// suppressing (redundant or wrong) descendant damage.
        const OVERRIDE_DAMAGE = 0b0000_0010;
    }
}

/// The closed set of node kinds.
///
/// The scene graph uses tagged variants rather than open subclassing: the
/// kind set is closed in practice within a rendering pipeline, and matching
/// keeps the dispatch in one place per operation.
#[derive(Debug)]
pub(crate) enum NodeKind {
    // Geometry nodes: produce shape data, never paint.
    Rect(RectNode),
    RRect(RRectNode),
    Path(PathNode),
    /// Covers the whole canvas; used for full-surface effects.
    Plane,
    Merge(MergeNode),
    GeometryTransform(GeometryTransformNode),
    Trim(TrimNode),
    Round(RoundNode),

    // Paint nodes: produce paint state, never paint themselves.
    Paint(PaintNode),

    // Transform nodes: produce transform values.
    Transform(TransformNode),

    // Render nodes: paint to a surface and answer hit tests.
    Draw(DrawNode),
    Image(ImageNode),
    Group(GroupNode),
    TransformEffect(TransformEffectNode),
    ClipEffect(ClipEffectNode),
    MaskEffect(MaskEffectNode),
    OpacityEffect(OpacityEffectNode),
    BlendModeEffect(BlendModeEffectNode),
    ColorFilterEffect(ColorFilterEffectNode),
    ShaderEffect(ShaderEffectNode),
    FilterEffect(FilterEffectNode),
}

impl NodeKind {
    /// Returns `true` for kinds that can render and be hit-tested.
    pub(crate) const fn is_render(&self) -> bool {
        matches!(
            self,
            Self::Draw(_)
                | Self::Image(_)
                | Self::Group(_)
                | Self::TransformEffect(_)
                | Self::ClipEffect(_)
                | Self::MaskEffect(_)
                | Self::OpacityEffect(_)
                | Self::BlendModeEffect(_)
                | Self::ColorFilterEffect(_)
                | Self::ShaderEffect(_)
                | Self::FilterEffect(_)
        )
    }

    /// Returns `true` for kinds that produce shape data.
    pub(crate) const fn is_geometry(&self) -> bool {
        matches!(
            self,
            Self::Rect(_)
                | Self::RRect(_)
                | Self::Path(_)
                | Self::Plane
                | Self::Merge(_)
                | Self::GeometryTransform(_)
                | Self::Trim(_)
                | Self::Round(_)
        )
    }

    /// The nodes this kind depends on, in a fixed order.
    ///
    /// These are the structural (forward) edges of the DAG; observer lists
    /// are their reverse.
    pub(crate) fn dependencies(&self) -> SmallVec<[NodeId; 4]> {
        let mut deps = SmallVec::new();
        match self {
            Self::Rect(_) | Self::RRect(_) | Self::Path(_) | Self::Plane => {}
            Self::Merge(m) => deps.extend_from_slice(&m.children),
            Self::GeometryTransform(g) => {
                deps.push(g.child);
                deps.push(g.transform);
            }
            Self::Trim(t) => deps.push(t.child),
            Self::Round(r) => deps.push(r.child),
            Self::Paint(_) => {}
            Self::Transform(t) => deps.extend_from_slice(&t.source.dependencies()),
            Self::Draw(d) => {
                deps.push(d.geometry);
                deps.push(d.paint);
            }
            Self::Image(_) => {}
            Self::Group(g) => deps.extend_from_slice(&g.children),
            Self::TransformEffect(t) => {
                deps.push(t.child);
                deps.push(t.transform);
            }
            Self::ClipEffect(c) => {
                deps.push(c.child);
                deps.push(c.clip);
            }
            Self::MaskEffect(m) => {
                deps.push(m.child);
                deps.push(m.mask);
            }
            Self::OpacityEffect(e) => deps.push(e.child),
            Self::BlendModeEffect(e) => deps.push(e.child),
            Self::ColorFilterEffect(e) => deps.push(e.child),
            Self::ShaderEffect(e) => deps.push(e.child),
            Self::FilterEffect(e) => deps.push(e.child),
        }
        deps
    }
}

/// A live node: kind plus the generic invalidation state.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    /// Cached bounds in the node's own coordinate space.
    /// Valid only while `INVALIDATED` is clear.
    pub(crate) bounds: Rect,
    pub(crate) flags: NodeFlags,
    pub(crate) traits: InvalTraits,
    /// Non-owning back-references to the nodes observing this one.
    pub(crate) observers: SmallVec<[NodeId; 2]>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, traits: InvalTraits) -> Self {
        Self {
            kind,
            bounds: Rect::ZERO,
            // Nodes start invalidated and damaged so the first damage-tracked
            // revalidation reports their initial extent.
            flags: NodeFlags::INVALIDATED | NodeFlags::DAMAGED,
            traits,
            observers: SmallVec::new(),
        }
    }

    pub(crate) fn has_inval(&self) -> bool {
        self.flags.contains(NodeFlags::INVALIDATED)
    }
}
