// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene graph arena and the invalidation / revalidation engine.

use alloc::vec::Vec;

use canopy_draw::Transform;
use kurbo::{Rect, Shape};
use smallvec::SmallVec;

use crate::InvalidationController;
use crate::node::{InvalTraits, Node, NodeFlags, NodeId, NodeKind};
use crate::util;

#[derive(Debug, Default)]
struct Entry {
    generation: u32,
    node: Option<Node>,
}

/// A retained scene graph of invalidatable nodes.
///
/// Nodes are stored in a generational slot arena and addressed by
/// [`NodeId`]. The graph is a DAG: any node may be referenced by several
/// composites, and invalidation flows along the reverse (observer) edges
/// from a mutated node to every node whose cached state depends on it.
///
/// The core protocol has two phases:
///
/// 1. **Invalidate** ([`SceneGraph::invalidate`] or any setter): cheap flag
///    propagation up the observer edges. No bounds are recomputed.
/// 2. **Revalidate** ([`SceneGraph::revalidate`]): a top-down pass that
///    recomputes cached bounds for exactly the invalidated subgraph and,
///    when given an [`InvalidationController`], reports the damaged
///    device-space rectangles.
///
/// Rendering and hit-testing require a revalidated graph.
#[derive(Debug, Default)]
pub struct SceneGraph {
    entries: Vec<Entry>,
    free: Vec<u32>,
}

impl SceneGraph {
    /// Creates an empty scene graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `id` refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.entries
            .get(id.idx())
            .is_some_and(|e| e.generation == id.1 && e.node.is_some())
    }

    /// The number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    /// Returns `true` if the graph has no live nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cached bounds of a node, in its own coordinate space.
    ///
    /// Valid only after revalidation; in debug builds, querying a stale node
    /// asserts.
    #[must_use]
    pub fn bounds(&self, id: NodeId) -> Rect {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "bounds queried on an invalidated node");
        node.bounds
    }

    /// Returns `true` if the node (or something it depends on) has pending
    /// invalidation.
    #[must_use]
    pub fn needs_revalidation(&self, id: NodeId) -> bool {
        self.node(id).has_inval()
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        let entry = &self.entries[id.idx()];
        assert_eq!(entry.generation, id.1, "stale NodeId");
        entry.node.as_ref().expect("removed NodeId")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        let entry = &mut self.entries[id.idx()];
        assert_eq!(entry.generation, id.1, "stale NodeId");
        entry.node.as_mut().expect("removed NodeId")
    }

    /// Inserts a node and registers it as an observer of its dependencies.
    pub(crate) fn insert(&mut self, kind: NodeKind, traits: InvalTraits) -> NodeId {
        let deps = kind.dependencies();
        let node = Node::new(kind, traits);
        let id = if let Some(idx) = self.free.pop() {
            let entry = &mut self.entries[idx as usize];
            entry.node = Some(node);
            NodeId::new(idx, entry.generation)
        } else {
            let idx = u32::try_from(self.entries.len()).expect("node capacity exceeded");
            self.entries.push(Entry {
                generation: 0,
                node: Some(node),
            });
            NodeId::new(idx, 0)
        };
        for dep in deps {
            self.observe_inval(id, dep);
        }
        id
    }

    /// Registers `observer` to be notified when `target` is invalidated.
    ///
    /// Structural edges (a composite's dependencies) are registered
    /// automatically on construction; this is exposed for side channels such
    /// as an external cache keyed on a node's output.
    pub fn observe_inval(&mut self, observer: NodeId, target: NodeId) {
        debug_assert!(self.is_alive(observer), "observer is not alive");
        self.node_mut(target).observers.push(observer);
    }

    /// Removes one registration of `observer` from `target`.
    ///
    /// Observing the same target twice (for example through two dependency
    /// slots) requires unobserving twice.
    pub fn unobserve_inval(&mut self, observer: NodeId, target: NodeId) {
        let observers = &mut self.node_mut(target).observers;
        if let Some(pos) = observers.iter().position(|&o| o == observer) {
            observers.swap_remove(pos);
        } else {
            debug_assert!(false, "unobserve without a matching observe");
        }
    }

    /// Removes a node from the graph.
    ///
    /// The node must no longer be observed by anything; removing a node that
    /// still has live observers asserts in debug builds and leaves the
    /// observers with a dangling (stale) reference otherwise.
    pub fn remove(&mut self, id: NodeId) {
        debug_assert!(
            self.node(id).observers.is_empty(),
            "removing a node with live observers"
        );
        let deps = self.node(id).kind.dependencies();
        for dep in deps {
            self.unobserve_inval(id, dep);
        }
        let entry = &mut self.entries[id.idx()];
        assert_eq!(entry.generation, id.1, "stale NodeId");
        entry.node = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.0);
    }

    /// Marks a node and all its transitive observers as needing
    /// revalidation.
    ///
    /// Setters call this automatically; call it directly for state the graph
    /// cannot see (for example a paint server backed by external data).
    pub fn invalidate(&mut self, id: NodeId) {
        self.invalidate_node(id, true);
    }

    /// The propagation step shared by all mutations.
    ///
    /// `damage` is true while the traversal is still looking for the node
    /// that will report damage for this mutation. A node that does not
    /// bubble damage absorbs it: the node is flagged `DAMAGED` and upstream
    /// observers are only flagged `INVALIDATED`, so the next revalidation
    /// reports the damage exactly once, at the absorbing node.
    pub(crate) fn invalidate_node(&mut self, id: NodeId, mut damage: bool) {
        let node = self.node_mut(id);
        if node.flags.contains(NodeFlags::IN_TRAVERSAL) {
            return;
        }
        // Plain re-invalidation of an already invalidated node is a no-op;
        // the traversal only continues if it still has damage to place.
        if node.has_inval() && (!damage || node.flags.contains(NodeFlags::DAMAGED)) {
            return;
        }
        if damage && !node.traits.contains(InvalTraits::BUBBLE_DAMAGE) {
            node.flags.insert(NodeFlags::DAMAGED);
            damage = false;
        }
        node.flags
            .insert(NodeFlags::INVALIDATED | NodeFlags::IN_TRAVERSAL);
        let observers: SmallVec<[NodeId; 2]> = node.observers.clone();
        for observer in observers {
            if self.is_alive(observer) {
                self.invalidate_node(observer, damage);
            }
        }
        self.node_mut(id).flags.remove(NodeFlags::IN_TRAVERSAL);
    }

    /// Recomputes cached state for the invalidated part of the subgraph
    /// rooted at `id` and returns the node's bounds.
    ///
    /// `ctm` maps the node's coordinate space to device space and is used
    /// only for damage reporting. If `ic` is `Some`, every node flagged as a
    /// damage receiver reports its before/after bounds to the controller.
    ///
    /// Nodes whose `INVALIDATED` flag is clear return their cached bounds
    /// without visiting children; the cost of the pass is proportional to
    /// the invalidated region of the graph, not its total size.
    pub fn revalidate(
        &mut self,
        id: NodeId,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        let node = self.node(id);
        if node.flags.contains(NodeFlags::IN_TRAVERSAL) {
            // Revalidation re-entered this node through a cycle; the stale
            // bounds are the only consistent answer.
            return node.bounds;
        }
        if !node.has_inval() {
            return node.bounds;
        }

        let generate_damage = ic.is_some()
            && (node.flags.contains(NodeFlags::DAMAGED)
                || node.traits.contains(InvalTraits::OVERRIDE_DAMAGE));
        self.node_mut(id)
            .flags
            .insert(NodeFlags::IN_TRAVERSAL);

        let bounds = if generate_damage {
            // This node owns the damage for its subgraph: children revalidate
            // without a controller, and the node reports its own before/after
            // bounds instead.
            let prev = self.node(id).bounds;
            let new = self.on_revalidate(id, None, ctm);
            if let Some(ic) = ic.as_deref_mut() {
                ic.inval(prev, ctm);
                if new != prev {
                    ic.inval(new, ctm);
                }
            }
            new
        } else {
            self.on_revalidate(id, ic.as_deref_mut(), ctm)
        };

        let node = self.node_mut(id);
        node.bounds = bounds;
        node.flags
            .remove(NodeFlags::INVALIDATED | NodeFlags::DAMAGED | NodeFlags::IN_TRAVERSAL);
        bounds
    }

    /// Kind-specific revalidation: recompute caches, return new bounds.
    ///
    /// The kind is temporarily moved out of the slot so child recursion can
    /// borrow the graph mutably; the `IN_TRAVERSAL` guard on the node keeps
    /// anything from observing the vacated slot.
    fn on_revalidate(
        &mut self,
        id: NodeId,
        ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        let mut kind = core::mem::replace(&mut self.node_mut(id).kind, NodeKind::Plane);
        let bounds = match &mut kind {
            NodeKind::Rect(g) => g.rect,
            NodeKind::RRect(g) => g.rrect.rect(),
            NodeKind::Path(g) => g.path.bounding_box(),
            NodeKind::Plane => util::EVERYTHING,
            NodeKind::Merge(m) => self.revalidate_merge(m, ic, ctm),
            NodeKind::GeometryTransform(g) => self.revalidate_geometry_transform(g, ic, ctm),
            NodeKind::Trim(t) => self.revalidate_trim(t, ic, ctm),
            NodeKind::Round(r) => self.revalidate_round(r, ic, ctm),
            // Paint nodes carry no spatial extent.
            NodeKind::Paint(_) => Rect::ZERO,
            NodeKind::Transform(t) => self.revalidate_transform_node(t, ic, ctm),
            NodeKind::Draw(d) => self.revalidate_draw(d, ic, ctm),
            NodeKind::Image(i) => i.image.bounds(),
            NodeKind::Group(g) => self.revalidate_group(g, ic, ctm),
            NodeKind::TransformEffect(t) => self.revalidate_transform_effect(t, ic, ctm),
            NodeKind::ClipEffect(c) => self.revalidate_clip_effect(c, ic, ctm),
            NodeKind::MaskEffect(m) => self.revalidate_mask_effect(m, ic, ctm),
            NodeKind::OpacityEffect(e) => self.revalidate(e.child, ic, ctm),
            NodeKind::BlendModeEffect(e) => self.revalidate(e.child, ic, ctm),
            NodeKind::ColorFilterEffect(e) => self.revalidate(e.child, ic, ctm),
            NodeKind::ShaderEffect(e) => self.revalidate(e.child, ic, ctm),
            NodeKind::FilterEffect(e) => {
                let child = self.revalidate(e.child, ic, ctm);
                e.filter.map_bounds(child)
            }
        };
        self.node_mut(id).kind = kind;
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use canopy_draw::Transform;
    use kurbo::{Affine, Rect};
    use peniko::Color;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect::new(x0, y0, x1, y1)
    }

    /// A minimal draw: solid-color rect geometry under a paint node.
    fn draw_rect(sg: &mut SceneGraph, r: Rect) -> (NodeId, NodeId) {
        let geo = sg.add_rect(r);
        let paint = sg.add_color(Color::WHITE);
        let draw = sg.add_draw(geo, paint);
        (draw, geo)
    }

    #[test]
    fn initial_revalidation_reports_initial_extent() {
        let mut sg = SceneGraph::new();
        let (draw, _) = draw_rect(&mut sg, rect(0.0, 0.0, 100.0, 100.0));
        let mut ic = InvalidationController::new();
        let bounds = sg.revalidate(draw, Some(&mut ic), &Transform::IDENTITY);
        assert_eq!(bounds, rect(0.0, 0.0, 100.0, 100.0));
        // Nodes start damaged; the first tracked pass reports the new extent
        // (the zero-sized previous bounds are dropped as empty).
        assert_eq!(ic.damage(), &[rect(0.0, 0.0, 100.0, 100.0)]);
    }

    #[test]
    fn revalidation_is_idempotent() {
        let mut sg = SceneGraph::new();
        let (draw, _) = draw_rect(&mut sg, rect(0.0, 0.0, 10.0, 10.0));
        let mut ic = InvalidationController::new();
        sg.revalidate(draw, Some(&mut ic), &Transform::IDENTITY);
        ic.reset();
        let bounds = sg.revalidate(draw, Some(&mut ic), &Transform::IDENTITY);
        assert_eq!(bounds, rect(0.0, 0.0, 10.0, 10.0));
        assert!(ic.damage().is_empty(), "clean graph reports no damage");
        assert!(!sg.needs_revalidation(draw));
    }

    #[test]
    fn damage_is_absorbed_at_the_draw_node() {
        let mut sg = SceneGraph::new();
        let (draw, geo) = draw_rect(&mut sg, rect(0.0, 0.0, 10.0, 10.0));
        let group = sg.add_group(vec![draw]);
        sg.revalidate(group, None, &Transform::IDENTITY);

        // Geometry bubbles; the draw node is the first non-bubbling observer.
        sg.set_rect(geo, rect(0.0, 0.0, 20.0, 20.0));
        assert!(sg.needs_revalidation(group));

        let mut ic = InvalidationController::new();
        sg.revalidate(group, Some(&mut ic), &Transform::IDENTITY);
        assert_eq!(
            ic.damage(),
            &[rect(0.0, 0.0, 10.0, 10.0), rect(0.0, 0.0, 20.0, 20.0)],
            "old extent then new extent, reported once at the draw"
        );
    }

    #[test]
    fn unchanged_value_does_not_invalidate() {
        let mut sg = SceneGraph::new();
        let (draw, geo) = draw_rect(&mut sg, rect(0.0, 0.0, 10.0, 10.0));
        sg.revalidate(draw, None, &Transform::IDENTITY);
        sg.set_rect(geo, rect(0.0, 0.0, 10.0, 10.0));
        assert!(!sg.needs_revalidation(draw));
    }

    #[test]
    fn shared_node_invalidates_all_observers() {
        let mut sg = SceneGraph::new();
        let geo = sg.add_rect(rect(0.0, 0.0, 10.0, 10.0));
        let paint = sg.add_color(Color::WHITE);
        let a = sg.add_draw(geo, paint);
        let b = sg.add_draw(geo, paint);
        let root = sg.add_group(vec![a, b]);
        sg.revalidate(root, None, &Transform::IDENTITY);

        sg.set_rect(geo, rect(0.0, 0.0, 30.0, 10.0));
        assert!(sg.needs_revalidation(a));
        assert!(sg.needs_revalidation(b));

        let mut ic = InvalidationController::new();
        sg.revalidate(root, Some(&mut ic), &Transform::IDENTITY);
        // Both draws absorb damage independently.
        assert_eq!(ic.damage().len(), 4);
        assert_eq!(ic.bounds(), rect(0.0, 0.0, 30.0, 10.0));
    }

    #[test]
    fn shared_paint_invalidates_all_draws() {
        let mut sg = SceneGraph::new();
        let paint = sg.add_color(Color::WHITE);
        let a = sg.add_rect(rect(0.0, 0.0, 10.0, 10.0));
        let b = sg.add_rect(rect(20.0, 0.0, 30.0, 10.0));
        let da = sg.add_draw(a, paint);
        let db = sg.add_draw(b, paint);
        let root = sg.add_group(vec![da, db]);
        sg.revalidate(root, None, &Transform::IDENTITY);

        sg.set_color(paint, Color::BLACK);
        assert!(sg.needs_revalidation(da));
        assert!(sg.needs_revalidation(db));

        let mut ic = InvalidationController::new();
        sg.revalidate(root, Some(&mut ic), &Transform::IDENTITY);
        // Bounds do not move on a color change, so each draw reports its
        // extent exactly once.
        assert_eq!(
            ic.damage(),
            &[rect(0.0, 0.0, 10.0, 10.0), rect(20.0, 0.0, 30.0, 10.0)]
        );
    }

    #[test]
    fn clean_siblings_are_not_revisited() {
        let mut sg = SceneGraph::new();
        let (a, geo_a) = draw_rect(&mut sg, rect(0.0, 0.0, 10.0, 10.0));
        let (b, _) = draw_rect(&mut sg, rect(50.0, 0.0, 60.0, 10.0));
        let root = sg.add_group(vec![a, b]);
        sg.revalidate(root, None, &Transform::IDENTITY);

        sg.set_rect(geo_a, rect(0.0, 0.0, 12.0, 10.0));
        assert!(!sg.needs_revalidation(b), "sibling stays clean");

        let mut ic = InvalidationController::new();
        sg.revalidate(root, Some(&mut ic), &Transform::IDENTITY);
        for r in ic.damage() {
            assert!(r.x1 <= 12.0, "damage confined to the mutated draw: {r:?}");
        }
    }

    #[test]
    fn invalidation_survives_observer_cycles() {
        let mut sg = SceneGraph::new();
        let (draw, geo) = draw_rect(&mut sg, rect(0.0, 0.0, 10.0, 10.0));
        // A deliberately buggy side-channel registration forming a cycle.
        sg.observe_inval(geo, draw);

        sg.set_rect(geo, rect(0.0, 0.0, 20.0, 20.0));
        let bounds = sg.revalidate(draw, None, &Transform::IDENTITY);
        assert_eq!(bounds, rect(0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn damage_maps_through_the_ctm() {
        let mut sg = SceneGraph::new();
        let (draw, _) = draw_rect(&mut sg, rect(0.0, 0.0, 10.0, 10.0));
        let mut ic = InvalidationController::new();
        let ctm = Transform::from(Affine::scale(2.0));
        sg.revalidate(draw, Some(&mut ic), &ctm);
        assert_eq!(ic.damage(), &[rect(0.0, 0.0, 20.0, 20.0)]);
    }

    #[test]
    fn remove_recycles_slots_with_fresh_generations() {
        let mut sg = SceneGraph::new();
        let a = sg.add_rect(rect(0.0, 0.0, 1.0, 1.0));
        sg.remove(a);
        assert!(!sg.is_alive(a));
        let b = sg.add_rect(rect(0.0, 0.0, 2.0, 2.0));
        assert!(sg.is_alive(b));
        assert_ne!(a, b, "recycled slot gets a new generation");
        assert_eq!(sg.len(), 1);
    }

    #[test]
    #[should_panic(expected = "live observers")]
    fn remove_with_live_observers_asserts() {
        let mut sg = SceneGraph::new();
        let (_, geo) = draw_rect(&mut sg, rect(0.0, 0.0, 1.0, 1.0));
        sg.remove(geo);
    }
}
