// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leaf and grouping render nodes.

use alloc::vec::Vec;

use canopy_draw::{ImageData, Paint, Style, Surface, Transform};
use kurbo::Rect;
use peniko::ImageSampler;

use crate::InvalidationController;
use crate::graph::SceneGraph;
use crate::node::{InvalTraits, NodeId, NodeKind};
use crate::render::{RenderContext, ScopedRenderContext};
use crate::util;

/// Paints a geometry node with a paint node.
#[derive(Debug)]
pub(crate) struct DrawNode {
    pub(crate) geometry: NodeId,
    pub(crate) paint: NodeId,
}

/// Draws an image at its natural bounds.
#[derive(Debug)]
pub(crate) struct ImageNode {
    pub(crate) image: ImageData,
    pub(crate) sampler: ImageSampler,
}

/// An ordered list of render children, drawn back to front.
#[derive(Debug)]
pub(crate) struct GroupNode {
    pub(crate) children: Vec<NodeId>,
    /// Whether any two children overlap. Group-level effects (opacity and
    /// friends) must isolate overlapping children into a layer to composite
    /// correctly; disjoint children can take the cheap per-draw path.
    pub(crate) requires_isolation: bool,
}

impl SceneGraph {
    /// Adds a draw node pairing a geometry with a paint.
    pub fn add_draw(&mut self, geometry: NodeId, paint: NodeId) -> NodeId {
        debug_assert!(
            self.node(geometry).kind.is_geometry(),
            "draw geometry is not a geometry node"
        );
        debug_assert!(
            matches!(self.node(paint).kind, NodeKind::Paint(_)),
            "draw paint is not a paint node"
        );
        self.insert(
            NodeKind::Draw(DrawNode { geometry, paint }),
            InvalTraits::empty(),
        )
    }

    /// Adds an image render node.
    pub fn add_image(&mut self, image: ImageData) -> NodeId {
        self.insert(
            NodeKind::Image(ImageNode {
                image,
                sampler: ImageSampler::default(),
            }),
            InvalTraits::empty(),
        )
    }

    /// Adds a group of render nodes, drawn in order.
    pub fn add_group(&mut self, children: Vec<NodeId>) -> NodeId {
        debug_assert!(
            children.iter().all(|&c| self.node(c).kind.is_render()),
            "group child is not a render node"
        );
        self.insert(
            NodeKind::Group(GroupNode {
                children,
                requires_isolation: false,
            }),
            InvalTraits::empty(),
        )
    }

    /// Appends a render node to a group.
    pub fn group_add_child(&mut self, group: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).kind.is_render(),
            "group child is not a render node"
        );
        {
            let NodeKind::Group(g) = &mut self.node_mut(group).kind else {
                debug_assert!(false, "group_add_child on a non-group node");
                return;
            };
            g.children.push(child);
        }
        self.observe_inval(group, child);
        self.invalidate_node(group, true);
    }

    /// Removes the first occurrence of a child from a group.
    pub fn group_remove_child(&mut self, group: NodeId, child: NodeId) {
        {
            let NodeKind::Group(g) = &mut self.node_mut(group).kind else {
                debug_assert!(false, "group_remove_child on a non-group node");
                return;
            };
            let Some(pos) = g.children.iter().position(|&c| c == child) else {
                debug_assert!(false, "child is not in the group");
                return;
            };
            g.children.remove(pos);
        }
        self.unobserve_inval(group, child);
        self.invalidate_node(group, true);
    }

    /// Replaces the image of an image node.
    pub fn set_image(&mut self, id: NodeId, image: ImageData) {
        let NodeKind::Image(i) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_image on a non-image node");
            return;
        };
        if i.image == image {
            return;
        }
        i.image = image;
        self.invalidate_node(id, true);
    }

    /// Replaces the sampling parameters of an image node.
    pub fn set_image_sampler(&mut self, id: NodeId, sampler: ImageSampler) {
        let NodeKind::Image(i) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_image_sampler on a non-image node");
            return;
        };
        if i.sampler == sampler {
            return;
        }
        i.sampler = sampler;
        self.invalidate_node(id, true);
    }

    pub(crate) fn revalidate_draw(
        &mut self,
        d: &mut DrawNode,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        let bounds = self.revalidate(d.geometry, ic.as_deref_mut(), ctm);
        self.revalidate(d.paint, ic, ctm);
        match self.paint_node(d.paint).style {
            Style::Fill => bounds,
            Style::Stroke { width } => {
                // Strokes straddle the geometry edge.
                let outset = (width / 2.0).max(0.0);
                bounds.inflate(outset, outset)
            }
        }
    }

    pub(crate) fn revalidate_group(
        &mut self,
        g: &mut GroupNode,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        let mut bounds = Rect::ZERO;
        g.requires_isolation = false;
        for &child in &g.children {
            let child_bounds = self.revalidate(child, ic.as_deref_mut(), ctm);
            if util::overlaps(bounds, child_bounds) {
                g.requires_isolation = true;
            }
            bounds = util::union_nonempty(bounds, child_bounds);
        }
        bounds
    }

    pub(crate) fn render_draw(
        &self,
        d: &DrawNode,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let mut paint = self.make_paint(d.paint);
        if let Some(ctx) = ctx {
            ctx.modulate_paint(&surface.current_transform(), &mut paint);
        }
        self.draw_geometry(d.geometry, surface, &paint);
    }

    pub(crate) fn render_image(
        &self,
        i: &ImageNode,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let mut paint = Paint::default();
        if let Some(ctx) = ctx {
            ctx.modulate_paint(&surface.current_transform(), &mut paint);
        }
        surface.draw_image(&i.image, i.image.bounds(), i.sampler, &paint);
    }

    pub(crate) fn render_group(
        &self,
        g: &GroupNode,
        bounds: Rect,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let mut scope =
            ScopedRenderContext::new(surface, ctx).set_isolation(bounds, g.requires_isolation);
        let (surface, ctx) = scope.parts();
        let ctx = (!ctx.is_passthrough()).then_some(ctx);
        for &child in &g.children {
            self.render_node(child, surface, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use peniko::Color;

    #[test]
    fn stroke_outsets_draw_bounds() {
        let mut sg = SceneGraph::new();
        let geo = sg.add_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
        let paint = sg.add_color(Color::WHITE);
        sg.set_paint_style(paint, Style::Stroke { width: 4.0 });
        let draw = sg.add_draw(geo, paint);
        sg.revalidate(draw, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(draw), Rect::new(8.0, 8.0, 22.0, 22.0));
    }

    #[test]
    fn group_unions_child_bounds() {
        let mut sg = SceneGraph::new();
        let paint = sg.add_color(Color::WHITE);
        let a = sg.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = sg.add_rect(Rect::new(40.0, 40.0, 50.0, 50.0));
        let draw_a = sg.add_draw(a, paint);
        let draw_b = sg.add_draw(b, paint);
        let group = sg.add_group(vec![draw_a, draw_b]);
        sg.revalidate(group, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(group), Rect::new(0.0, 0.0, 50.0, 50.0));
    }

    #[test]
    fn group_membership_changes_invalidate() {
        let mut sg = SceneGraph::new();
        let paint = sg.add_color(Color::WHITE);
        let a = sg.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let draw_a = sg.add_draw(a, paint);
        let group = sg.add_group(vec![draw_a]);
        sg.revalidate(group, None, &Transform::IDENTITY);

        let b = sg.add_rect(Rect::new(20.0, 0.0, 30.0, 10.0));
        let draw_b = sg.add_draw(b, paint);
        sg.group_add_child(group, draw_b);
        assert!(sg.needs_revalidation(group));
        sg.revalidate(group, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(group), Rect::new(0.0, 0.0, 30.0, 10.0));

        sg.group_remove_child(group, draw_a);
        sg.revalidate(group, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(group), Rect::new(20.0, 0.0, 30.0, 10.0));
    }

    #[test]
    fn image_bounds_are_its_natural_size() {
        let mut sg = SceneGraph::new();
        let image = ImageData::new_rgba8(vec![0_u8; 16 * 8 * 4], 16, 8);
        let node = sg.add_image(image);
        sg.revalidate(node, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(node), Rect::new(0.0, 0.0, 16.0, 8.0));
    }
}
