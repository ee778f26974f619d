// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint nodes: producers of paint state for draw nodes.

use canopy_draw::{Paint, Style};
use peniko::{BlendMode, Brush, Color};

use crate::graph::SceneGraph;
use crate::node::{InvalTraits, NodeId, NodeKind};

#[derive(Debug)]
pub(crate) enum PaintSource {
    /// A solid color.
    Color(Color),
    /// An arbitrary brush (gradient, image).
    Brush(Brush),
}

#[derive(Debug)]
pub(crate) struct PaintNode {
    pub(crate) source: PaintSource,
    pub(crate) opacity: f32,
    pub(crate) blend: BlendMode,
    pub(crate) style: Style,
    pub(crate) anti_alias: bool,
}

impl PaintNode {
    fn new(source: PaintSource) -> Self {
        Self {
            source,
            opacity: 1.0,
            blend: BlendMode::default(),
            style: Style::Fill,
            anti_alias: true,
        }
    }
}

impl SceneGraph {
    /// Adds a solid-color paint node.
    pub fn add_color(&mut self, color: Color) -> NodeId {
        self.insert(
            NodeKind::Paint(PaintNode::new(PaintSource::Color(color))),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    /// Adds a brush-backed paint node (gradients, image fills).
    pub fn add_brush(&mut self, brush: Brush) -> NodeId {
        self.insert(
            NodeKind::Paint(PaintNode::new(PaintSource::Brush(brush))),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    fn paint_node_mut(&mut self, id: NodeId) -> Option<&mut PaintNode> {
        match &mut self.node_mut(id).kind {
            NodeKind::Paint(p) => Some(p),
            _ => {
                debug_assert!(false, "paint mutation on a non-paint node");
                None
            }
        }
    }

    pub(crate) fn paint_node(&self, id: NodeId) -> &PaintNode {
        match &self.node(id).kind {
            NodeKind::Paint(p) => p,
            _ => panic!("not a paint node"),
        }
    }

    /// The color of a solid-color paint node.
    #[must_use]
    pub fn color(&self, id: NodeId) -> Color {
        let PaintSource::Color(c) = &self.paint_node(id).source else {
            panic!("color on a brush paint node");
        };
        *c
    }

    /// Replaces the color of a solid-color paint node.
    pub fn set_color(&mut self, id: NodeId, color: Color) {
        let Some(p) = self.paint_node_mut(id) else {
            return;
        };
        let PaintSource::Color(current) = &mut p.source else {
            debug_assert!(false, "set_color on a brush paint node");
            return;
        };
        if *current == color {
            return;
        }
        *current = color;
        self.invalidate_node(id, true);
    }

    /// Replaces the brush of a brush-backed paint node.
    pub fn set_brush(&mut self, id: NodeId, brush: Brush) {
        let Some(p) = self.paint_node_mut(id) else {
            return;
        };
        let PaintSource::Brush(current) = &mut p.source else {
            debug_assert!(false, "set_brush on a color paint node");
            return;
        };
        if *current == brush {
            return;
        }
        *current = brush;
        self.invalidate_node(id, true);
    }

    /// Sets a paint node's opacity, clamped to `[0, 1]`.
    pub fn set_paint_opacity(&mut self, id: NodeId, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        let Some(p) = self.paint_node_mut(id) else {
            return;
        };
        if p.opacity == opacity {
            return;
        }
        p.opacity = opacity;
        self.invalidate_node(id, true);
    }

    /// Sets a paint node's blend mode.
    pub fn set_paint_blend_mode(&mut self, id: NodeId, blend: BlendMode) {
        let Some(p) = self.paint_node_mut(id) else {
            return;
        };
        if p.blend == blend {
            return;
        }
        p.blend = blend;
        self.invalidate_node(id, true);
    }

    /// Sets a paint node's fill/stroke style.
    ///
    /// Stroke width participates in draw bounds, so this can move damage.
    pub fn set_paint_style(&mut self, id: NodeId, style: Style) {
        let Some(p) = self.paint_node_mut(id) else {
            return;
        };
        if p.style == style {
            return;
        }
        p.style = style;
        self.invalidate_node(id, true);
    }

    /// Sets whether draws with this paint are anti-aliased.
    pub fn set_paint_anti_alias(&mut self, id: NodeId, anti_alias: bool) {
        let Some(p) = self.paint_node_mut(id) else {
            return;
        };
        if p.anti_alias == anti_alias {
            return;
        }
        p.anti_alias = anti_alias;
        self.invalidate_node(id, true);
    }

    /// Materializes a paint node into surface-level [`Paint`] state.
    #[must_use]
    pub fn make_paint(&self, id: NodeId) -> Paint {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "make_paint on a stale paint node");
        let NodeKind::Paint(p) = &node.kind else {
            panic!("make_paint on a non-paint node");
        };
        let mut brush = match &p.source {
            PaintSource::Color(c) => Brush::Solid(*c),
            PaintSource::Brush(b) => b.clone(),
        };
        if p.opacity < 1.0 {
            brush = brush.multiply_alpha(p.opacity);
        }
        Paint {
            brush,
            style: p.style,
            blend: p.blend,
            anti_alias: p.anti_alias,
            ..Paint::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_draw::Transform;

    #[test]
    fn make_paint_reflects_attributes() {
        let mut sg = SceneGraph::new();
        let id = sg.add_color(Color::WHITE);
        sg.set_paint_style(id, Style::Stroke { width: 4.0 });
        sg.set_paint_anti_alias(id, false);
        sg.revalidate(id, None, &Transform::IDENTITY);

        let paint = sg.make_paint(id);
        assert_eq!(paint.style, Style::Stroke { width: 4.0 });
        assert!(!paint.anti_alias);
        assert_eq!(paint.brush, Brush::Solid(Color::WHITE));
    }

    #[test]
    fn opacity_scales_brush_alpha() {
        let mut sg = SceneGraph::new();
        let id = sg.add_color(Color::WHITE);
        sg.set_paint_opacity(id, 0.5);
        sg.revalidate(id, None, &Transform::IDENTITY);
        let paint = sg.make_paint(id);
        assert_eq!(paint.brush, Brush::Solid(Color::WHITE).multiply_alpha(0.5));
    }

    #[test]
    fn unchanged_attribute_does_not_invalidate() {
        let mut sg = SceneGraph::new();
        let id = sg.add_color(Color::BLACK);
        sg.revalidate(id, None, &Transform::IDENTITY);
        sg.set_color(id, Color::BLACK);
        sg.set_paint_opacity(id, 1.0);
        assert!(!sg.needs_revalidation(id));
    }
}
