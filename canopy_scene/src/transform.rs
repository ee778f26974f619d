// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transform nodes: composable producers of [`Transform`] values.
//!
//! A transform node caches its total transform during revalidation, so a
//! chain of concatenations shared by many consumers is computed once per
//! pass no matter how many places reference it.

use canopy_draw::Transform;
use kurbo::Rect;
use smallvec::SmallVec;

use crate::InvalidationController;
use crate::graph::SceneGraph;
use crate::node::{InvalTraits, NodeId, NodeKind};

#[derive(Debug)]
pub(crate) enum TransformSource {
    /// A directly set matrix; the cached total *is* the attribute.
    Matrix,
    /// Composition of two transform nodes; `inner` applies first.
    Concat { outer: NodeId, inner: NodeId },
    /// The inverse of another transform node.
    Inverse { source: NodeId },
}

impl TransformSource {
    pub(crate) fn dependencies(&self) -> SmallVec<[NodeId; 4]> {
        let mut deps = SmallVec::new();
        match *self {
            Self::Matrix => {}
            Self::Concat { outer, inner } => {
                deps.push(outer);
                deps.push(inner);
            }
            Self::Inverse { source } => deps.push(source),
        }
        deps
    }
}

#[derive(Debug)]
pub(crate) struct TransformNode {
    pub(crate) source: TransformSource,
    /// Cached total transform, valid after revalidation.
    pub(crate) total: Transform,
    /// Set when an inverse source was singular and the total fell back to
    /// the identity.
    pub(crate) singular: bool,
}

impl SceneGraph {
    fn insert_transform(&mut self, source: TransformSource, total: Transform) -> NodeId {
        self.insert(
            NodeKind::Transform(TransformNode {
                source,
                total,
                singular: false,
            }),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    /// Adds a transform node holding a fixed matrix value.
    pub fn add_transform(&mut self, transform: Transform) -> NodeId {
        self.insert_transform(TransformSource::Matrix, transform)
    }

    /// Adds the composition of two transform nodes: `inner` applies first,
    /// then `outer`.
    ///
    /// If either input carries a 4×4 matrix, so does the composition.
    pub fn add_concat(&mut self, outer: NodeId, inner: NodeId) -> NodeId {
        debug_assert!(
            matches!(self.node(outer).kind, NodeKind::Transform(_))
                && matches!(self.node(inner).kind, NodeKind::Transform(_)),
            "concat of non-transform nodes"
        );
        self.insert_transform(
            TransformSource::Concat { outer, inner },
            Transform::IDENTITY,
        )
    }

    /// Adds the inverse of a transform node.
    ///
    /// When the source is singular the inverse falls back to the identity;
    /// [`inverse_is_singular`](SceneGraph::inverse_is_singular) reports this.
    pub fn add_inverse(&mut self, source: NodeId) -> NodeId {
        debug_assert!(
            matches!(self.node(source).kind, NodeKind::Transform(_)),
            "inverse of a non-transform node"
        );
        self.insert_transform(TransformSource::Inverse { source }, Transform::IDENTITY)
    }

    /// Replaces the matrix of a fixed transform node.
    pub fn set_transform(&mut self, id: NodeId, transform: Transform) {
        let NodeKind::Transform(t) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_transform on a non-transform node");
            return;
        };
        debug_assert!(
            matches!(t.source, TransformSource::Matrix),
            "set_transform on a derived transform node"
        );
        if t.total == transform {
            return;
        }
        t.total = transform;
        self.invalidate_node(id, true);
    }

    /// The cached total transform of a transform node.
    ///
    /// Valid only after revalidation.
    #[must_use]
    pub fn transform_value(&self, id: NodeId) -> Transform {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "transform value queried while stale");
        let NodeKind::Transform(t) = &node.kind else {
            panic!("transform_value on a non-transform node");
        };
        t.total
    }

    /// Returns `true` if an inverse transform node last revalidated against
    /// a singular source.
    #[must_use]
    pub fn inverse_is_singular(&self, id: NodeId) -> bool {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "singularity queried while stale");
        let NodeKind::Transform(t) = &node.kind else {
            panic!("inverse_is_singular on a non-transform node");
        };
        t.singular
    }

    pub(crate) fn revalidate_transform_node(
        &mut self,
        t: &mut TransformNode,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        match t.source {
            TransformSource::Matrix => {}
            TransformSource::Concat { outer, inner } => {
                self.revalidate(outer, ic.as_deref_mut(), ctm);
                self.revalidate(inner, ic, ctm);
                t.total = self
                    .transform_value(outer)
                    .concat(&self.transform_value(inner));
            }
            TransformSource::Inverse { source } => {
                self.revalidate(source, ic, ctm);
                match self.transform_value(source).invert() {
                    Some(inv) => {
                        t.total = inv;
                        t.singular = false;
                    }
                    None => {
                        t.total = Transform::IDENTITY;
                        t.singular = true;
                    }
                }
            }
        }
        // Transform nodes carry no spatial extent of their own.
        Rect::ZERO
    }
}
