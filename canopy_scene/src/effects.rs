// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Effect nodes: single-child render nodes that change how the child draws.
//!
//! Cheap effects (opacity, color filter, blend, shader) defer their work
//! into the [`RenderContext`](crate::RenderContext) and touch no layers in
//! the common case. Structural effects (clip, mask, image filter) change
//! surface state or push layers directly.

use canopy_draw::{ColorFilter, Filter, Paint, Surface, Transform};
use kurbo::Rect;
use peniko::{BlendMode, Brush, Compose, Mix};

use crate::InvalidationController;
use crate::graph::SceneGraph;
use crate::node::{InvalTraits, NodeId, NodeKind};
use crate::render::{RenderContext, ScopedRenderContext};
use crate::util;

/// How a mask's coverage gates its content.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MaskMode {
    /// Content shows where the mask has alpha.
    Alpha,
    /// Content shows where the mask has no alpha.
    InverseAlpha,
    /// Content shows weighted by the mask's luminance.
    Luma,
    /// Content shows weighted by the inverse of the mask's luminance.
    InverseLuma,
}

impl MaskMode {
    /// Returns `true` for the inverted modes.
    #[must_use]
    pub const fn is_inverted(self) -> bool {
        matches!(self, Self::InverseAlpha | Self::InverseLuma)
    }

    /// Returns `true` for the luminance-based modes.
    #[must_use]
    pub const fn is_luma(self) -> bool {
        matches!(self, Self::Luma | Self::InverseLuma)
    }
}

#[derive(Debug)]
pub(crate) struct TransformEffectNode {
    pub(crate) child: NodeId,
    pub(crate) transform: NodeId,
}

#[derive(Debug)]
pub(crate) struct ClipEffectNode {
    pub(crate) child: NodeId,
    pub(crate) clip: NodeId,
    pub(crate) anti_alias: bool,
    /// Set during revalidation when the clip provably covers the child, in
    /// which case rendering skips the clip entirely.
    pub(crate) noop: bool,
}

#[derive(Debug)]
pub(crate) struct MaskEffectNode {
    pub(crate) child: NodeId,
    pub(crate) mask: NodeId,
    pub(crate) mode: MaskMode,
}

#[derive(Debug)]
pub(crate) struct OpacityEffectNode {
    pub(crate) child: NodeId,
    pub(crate) opacity: f32,
}

#[derive(Debug)]
pub(crate) struct BlendModeEffectNode {
    pub(crate) child: NodeId,
    pub(crate) blend: BlendMode,
}

#[derive(Debug)]
pub(crate) struct ColorFilterEffectNode {
    pub(crate) child: NodeId,
    pub(crate) filter: ColorFilter,
}

#[derive(Debug)]
pub(crate) struct ShaderEffectNode {
    pub(crate) child: NodeId,
    pub(crate) brush: Brush,
}

#[derive(Debug)]
pub(crate) struct FilterEffectNode {
    pub(crate) child: NodeId,
    pub(crate) filter: Filter,
}

impl SceneGraph {
    fn assert_render(&self, id: NodeId, what: &str) {
        debug_assert!(
            self.node(id).kind.is_render(),
            "{what} is not a render node"
        );
    }

    /// Adds an effect applying a transform node to a render child.
    pub fn add_transform_effect(&mut self, child: NodeId, transform: NodeId) -> NodeId {
        self.assert_render(child, "transform effect child");
        debug_assert!(
            matches!(self.node(transform).kind, NodeKind::Transform(_)),
            "transform effect source is not a transform node"
        );
        self.insert(
            NodeKind::TransformEffect(TransformEffectNode { child, transform }),
            InvalTraits::empty(),
        )
    }

    /// Adds an effect clipping a render child to a geometry.
    pub fn add_clip_effect(&mut self, child: NodeId, clip: NodeId, anti_alias: bool) -> NodeId {
        self.assert_render(child, "clip effect child");
        debug_assert!(
            self.node(clip).kind.is_geometry(),
            "clip effect clip is not a geometry node"
        );
        self.insert(
            NodeKind::ClipEffect(ClipEffectNode {
                child,
                clip,
                anti_alias,
                noop: false,
            }),
            InvalTraits::empty(),
        )
    }

    /// Adds an effect gating a render child by another render node's
    /// coverage.
    pub fn add_mask_effect(&mut self, child: NodeId, mask: NodeId, mode: MaskMode) -> NodeId {
        self.assert_render(child, "mask effect child");
        self.assert_render(mask, "mask effect mask");
        self.insert(
            NodeKind::MaskEffect(MaskEffectNode { child, mask, mode }),
            InvalTraits::empty(),
        )
    }

    /// Adds a group-opacity effect.
    pub fn add_opacity_effect(&mut self, child: NodeId, opacity: f32) -> NodeId {
        self.assert_render(child, "opacity effect child");
        self.insert(
            NodeKind::OpacityEffect(OpacityEffectNode {
                child,
                opacity: opacity.clamp(0.0, 1.0),
            }),
            InvalTraits::empty(),
        )
    }

    /// Adds an effect drawing its child with a blend mode.
    pub fn add_blend_mode_effect(&mut self, child: NodeId, blend: BlendMode) -> NodeId {
        self.assert_render(child, "blend mode effect child");
        self.insert(
            NodeKind::BlendModeEffect(BlendModeEffectNode { child, blend }),
            InvalTraits::empty(),
        )
    }

    /// Adds an effect applying a color filter to its child's output.
    pub fn add_color_filter_effect(&mut self, child: NodeId, filter: ColorFilter) -> NodeId {
        self.assert_render(child, "color filter effect child");
        self.insert(
            NodeKind::ColorFilterEffect(ColorFilterEffectNode { child, filter }),
            InvalTraits::empty(),
        )
    }

    /// Adds an effect overriding the brush of every draw below it.
    pub fn add_shader_effect(&mut self, child: NodeId, brush: Brush) -> NodeId {
        self.assert_render(child, "shader effect child");
        self.insert(
            NodeKind::ShaderEffect(ShaderEffectNode { child, brush }),
            InvalTraits::empty(),
        )
    }

    /// Adds an effect applying an image filter to its child's output.
    ///
    /// Filter effects always report damage over their own (filtered) bounds:
    /// the child's unfiltered damage does not describe what actually changed
    /// on screen.
    pub fn add_filter_effect(&mut self, child: NodeId, filter: Filter) -> NodeId {
        self.assert_render(child, "filter effect child");
        self.insert(
            NodeKind::FilterEffect(FilterEffectNode { child, filter }),
            InvalTraits::OVERRIDE_DAMAGE,
        )
    }

    /// The opacity of an opacity effect.
    #[must_use]
    pub fn opacity(&self, id: NodeId) -> f32 {
        let NodeKind::OpacityEffect(e) = &self.node(id).kind else {
            panic!("opacity on a non-opacity node");
        };
        e.opacity
    }

    /// Sets the opacity of an opacity effect, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        let NodeKind::OpacityEffect(e) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_opacity on a non-opacity node");
            return;
        };
        if e.opacity == opacity {
            return;
        }
        e.opacity = opacity;
        self.invalidate_node(id, true);
    }

    /// Sets the blend mode of a blend mode effect.
    pub fn set_blend_mode(&mut self, id: NodeId, blend: BlendMode) {
        let NodeKind::BlendModeEffect(e) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_blend_mode on a non-blend node");
            return;
        };
        if e.blend == blend {
            return;
        }
        e.blend = blend;
        self.invalidate_node(id, true);
    }

    /// Replaces the filter of a color filter effect.
    pub fn set_color_filter(&mut self, id: NodeId, filter: ColorFilter) {
        let NodeKind::ColorFilterEffect(e) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_color_filter on a non-color-filter node");
            return;
        };
        if e.filter == filter {
            return;
        }
        e.filter = filter;
        self.invalidate_node(id, true);
    }

    /// Replaces the brush of a shader effect.
    pub fn set_shader(&mut self, id: NodeId, brush: Brush) {
        let NodeKind::ShaderEffect(e) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_shader on a non-shader node");
            return;
        };
        if e.brush == brush {
            return;
        }
        e.brush = brush;
        self.invalidate_node(id, true);
    }

    /// Replaces the filter of an image filter effect.
    pub fn set_filter(&mut self, id: NodeId, filter: Filter) {
        let NodeKind::FilterEffect(e) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_filter on a non-filter node");
            return;
        };
        if e.filter == filter {
            return;
        }
        e.filter = filter;
        self.invalidate_node(id, true);
    }

    pub(crate) fn revalidate_transform_effect(
        &mut self,
        t: &mut TransformEffectNode,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        self.revalidate(t.transform, ic.as_deref_mut(), ctm);
        let ts = self.transform_value(t.transform);
        // Descendants see the composed transform, so their damage lands in
        // the right device-space location.
        let child = self.revalidate(t.child, ic, &ctm.concat(&ts));
        ts.map_rect(child)
    }

    pub(crate) fn revalidate_clip_effect(
        &mut self,
        c: &mut ClipEffectNode,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        let clip_bounds = self.revalidate(c.clip, ic.as_deref_mut(), ctm);
        let child_bounds = self.revalidate(c.child, ic, ctm);
        c.noop = self.geometry_contains_rect(c.clip, child_bounds);
        util::intersect_or_empty(clip_bounds, child_bounds)
    }

    pub(crate) fn revalidate_mask_effect(
        &mut self,
        m: &mut MaskEffectNode,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        let mask_bounds = self.revalidate(m.mask, ic.as_deref_mut(), ctm);
        let child_bounds = self.revalidate(m.child, ic, ctm);
        if m.mode.is_inverted() {
            // An inverted mask reveals the child everywhere outside the
            // mask, so the mask does not bound the output.
            child_bounds
        } else {
            util::intersect_or_empty(mask_bounds, child_bounds)
        }
    }

    pub(crate) fn render_transform_effect(
        &self,
        t: &TransformEffectNode,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let ts = self.transform_value(t.transform);
        if ts.is_identity() {
            self.render_node(t.child, surface, ctx);
            return;
        }
        surface.save();
        surface.concat(&ts);
        self.render_node(t.child, surface, ctx);
        surface.restore();
    }

    pub(crate) fn render_clip_effect(
        &self,
        c: &ClipEffectNode,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        if c.noop {
            self.render_node(c.child, surface, ctx);
            return;
        }
        surface.save();
        self.clip_geometry(c.clip, surface, c.anti_alias);
        self.render_node(c.child, surface, ctx);
        surface.restore();
    }

    pub(crate) fn render_mask_effect(
        &self,
        m: &MaskEffectNode,
        bounds: Rect,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let mut scope = ScopedRenderContext::new(surface, ctx).set_isolation(bounds, true);
        let (surface, _) = scope.parts();

        // Coverage layer: after this block the layer's alpha channel holds
        // the mask coverage. Only dst alpha matters to the compositing step,
        // so the alpha modes can draw the mask directly.
        surface.save_layer(Some(bounds), None);
        if m.mode.is_luma() {
            let luma = Paint {
                color_filter: Some(ColorFilter::LumaToAlpha),
                ..Paint::default()
            };
            surface.save_layer(Some(bounds), Some(&luma));
            self.render_node(m.mask, surface, None);
            surface.restore();
        } else {
            self.render_node(m.mask, surface, None);
        }

        // Content layer, composited against the coverage on restore.
        let content = Paint {
            blend: BlendMode::new(
                Mix::Normal,
                if m.mode.is_inverted() {
                    Compose::SrcOut
                } else {
                    Compose::SrcIn
                },
            ),
            ..Paint::default()
        };
        surface.save_layer(Some(bounds), Some(&content));
        self.render_node(m.child, surface, None);
        // Scope drop pops the content and coverage layers.
    }

    pub(crate) fn render_opacity_effect(
        &self,
        e: &OpacityEffectNode,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        if e.opacity <= 0.0 {
            return;
        }
        if e.opacity >= 1.0 {
            self.render_node(e.child, surface, ctx);
            return;
        }
        let mut scope = ScopedRenderContext::new(surface, ctx).modulate_opacity(e.opacity);
        let (surface, ctx) = scope.parts();
        self.render_node(e.child, surface, Some(ctx));
    }

    pub(crate) fn render_blend_mode_effect(
        &self,
        e: &BlendModeEffectNode,
        bounds: Rect,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let mut scope = ScopedRenderContext::new(surface, ctx).modulate_blend_mode(e.blend, bounds);
        let (surface, ctx) = scope.parts();
        self.render_node(e.child, surface, Some(ctx));
    }

    pub(crate) fn render_color_filter_effect(
        &self,
        e: &ColorFilterEffectNode,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let mut scope =
            ScopedRenderContext::new(surface, ctx).modulate_color_filter(e.filter.clone());
        let (surface, ctx) = scope.parts();
        self.render_node(e.child, surface, Some(ctx));
    }

    pub(crate) fn render_shader_effect(
        &self,
        e: &ShaderEffectNode,
        bounds: Rect,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let mut scope =
            ScopedRenderContext::new(surface, ctx).modulate_shader(e.brush.clone(), bounds);
        let (surface, ctx) = scope.parts();
        self.render_node(e.child, surface, Some(ctx));
    }

    pub(crate) fn render_filter_effect(
        &self,
        e: &FilterEffectNode,
        bounds: Rect,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let mut scope = ScopedRenderContext::new(surface, ctx).set_isolation(bounds, true);
        let (surface, _) = scope.parts();
        let layer = Paint {
            filter: Some(e.filter),
            ..Paint::default()
        };
        surface.save_layer(Some(bounds), Some(&layer));
        self.render_node(e.child, surface, None);
        // Scope drop pops the filter layer.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InvalidationController;
    use alloc::vec;
    use canopy_draw::record::{Command, RecordingSurface};
    use kurbo::Affine;
    use peniko::{Brush, Color};

    fn scene_draw(sg: &mut SceneGraph, r: Rect) -> NodeId {
        let geo = sg.add_rect(r);
        let paint = sg.add_color(Color::WHITE);
        sg.add_draw(geo, paint)
    }

    #[test]
    fn identity_transform_effect_elides_save() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let t = sg.add_transform(Transform::IDENTITY);
        let effect = sg.add_transform_effect(draw, t);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert!(
            !surface.commands().iter().any(|c| matches!(c, Command::Save)),
            "identity transform should not save"
        );
        assert_eq!(surface.depth(), 0);
    }

    #[test]
    fn transform_effect_scales_bounds_and_balances() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let t = sg.add_transform(Transform::from(Affine::scale(3.0)));
        let effect = sg.add_transform_effect(draw, t);
        sg.revalidate(effect, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(effect), Rect::new(0.0, 0.0, 30.0, 30.0));

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert!(matches!(surface.commands()[0], Command::Save));
        assert_eq!(surface.depth(), 0, "save stack balanced");
    }

    #[test]
    fn covering_clip_emits_no_clip_commands() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(10.0, 10.0, 20.0, 20.0));
        let clip = sg.add_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        let effect = sg.add_clip_effect(draw, clip, true);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert_eq!(surface.clip_count(), 0, "covering clip is a no-op");
        assert_eq!(
            surface.commands().iter().filter(|c| c.is_draw()).count(),
            1
        );
    }

    #[test]
    fn partial_clip_emits_clip_and_tightens_bounds() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(0.0, 0.0, 100.0, 100.0));
        let clip = sg.add_rect(Rect::new(0.0, 0.0, 50.0, 50.0));
        let effect = sg.add_clip_effect(draw, clip, true);
        sg.revalidate(effect, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(effect), Rect::new(0.0, 0.0, 50.0, 50.0));

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert_eq!(surface.clip_count(), 1);
        assert_eq!(surface.depth(), 0);
    }

    #[test]
    fn clip_noop_tracks_mutation() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(10.0, 10.0, 20.0, 20.0));
        let clip = sg.add_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        let effect = sg.add_clip_effect(draw, clip, true);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        sg.set_rect(clip, Rect::new(0.0, 0.0, 15.0, 15.0));
        sg.revalidate(effect, None, &Transform::IDENTITY);
        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert_eq!(surface.clip_count(), 1, "shrunk clip must be applied");
    }

    #[test]
    fn zero_opacity_renders_nothing() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let effect = sg.add_opacity_effect(draw, 0.0);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert!(surface.commands().is_empty());
    }

    #[test]
    fn opacity_defers_into_draw_paint() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let effect = sg.add_opacity_effect(draw, 0.5);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert_eq!(surface.layer_count(), 0, "single draw needs no layer");
        let Command::DrawRect { paint, .. } = &surface.commands()[0] else {
            panic!("expected a rect draw");
        };
        assert_eq!(
            paint.brush,
            Brush::Solid(Color::WHITE).multiply_alpha(0.5)
        );
    }

    #[test]
    fn opacity_isolates_overlapping_group() {
        let mut sg = SceneGraph::new();
        let a = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = scene_draw(&mut sg, Rect::new(5.0, 5.0, 15.0, 15.0));
        let group = sg.add_group(vec![a, b]);
        let effect = sg.add_opacity_effect(group, 0.5);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert_eq!(surface.layer_count(), 1, "overlap forces isolation");
        assert_eq!(surface.depth(), 0);

        // Disjoint children keep the cheap path.
        let c = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let d = scene_draw(&mut sg, Rect::new(20.0, 0.0, 30.0, 10.0));
        let group2 = sg.add_group(vec![c, d]);
        let effect2 = sg.add_opacity_effect(group2, 0.5);
        sg.revalidate(effect2, None, &Transform::IDENTITY);
        let mut surface2 = RecordingSurface::new();
        sg.render(effect2, &mut surface2);
        assert_eq!(surface2.layer_count(), 0);
    }

    #[test]
    fn stacked_blend_modes_flush_a_layer() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let inner = sg.add_blend_mode_effect(draw, BlendMode::new(Mix::Multiply, Compose::SrcOver));
        let outer = sg.add_blend_mode_effect(inner, BlendMode::new(Mix::Screen, Compose::SrcOver));
        sg.revalidate(outer, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(outer, &mut surface);
        assert_eq!(surface.layer_count(), 1, "outer blend flushed to a layer");
        // The inner blend reaches the draw itself.
        let Some(Command::DrawRect { paint, .. }) =
            surface.commands().iter().find(|c| c.is_draw())
        else {
            panic!("expected a rect draw");
        };
        assert_eq!(paint.blend, BlendMode::new(Mix::Multiply, Compose::SrcOver));
        assert_eq!(surface.depth(), 0);
    }

    #[test]
    fn mask_effect_builds_coverage_and_content_layers() {
        let mut sg = SceneGraph::new();
        let child = scene_draw(&mut sg, Rect::new(0.0, 0.0, 20.0, 20.0));
        let mask = scene_draw(&mut sg, Rect::new(10.0, 10.0, 30.0, 30.0));
        let effect = sg.add_mask_effect(child, mask, MaskMode::Alpha);
        sg.revalidate(effect, None, &Transform::IDENTITY);
        // Non-inverted masks bound the output by the intersection.
        assert_eq!(sg.bounds(effect), Rect::new(10.0, 10.0, 20.0, 20.0));

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert_eq!(surface.layer_count(), 2, "coverage + content layers");
        assert_eq!(surface.depth(), 0);
    }

    #[test]
    fn inverted_mask_keeps_child_bounds() {
        let mut sg = SceneGraph::new();
        let child = scene_draw(&mut sg, Rect::new(0.0, 0.0, 20.0, 20.0));
        let mask = scene_draw(&mut sg, Rect::new(100.0, 100.0, 110.0, 110.0));
        let effect = sg.add_mask_effect(child, mask, MaskMode::InverseAlpha);
        sg.revalidate(effect, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(effect), Rect::new(0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn luma_mask_adds_a_conversion_layer() {
        let mut sg = SceneGraph::new();
        let child = scene_draw(&mut sg, Rect::new(0.0, 0.0, 20.0, 20.0));
        let mask = scene_draw(&mut sg, Rect::new(0.0, 0.0, 20.0, 20.0));
        let effect = sg.add_mask_effect(child, mask, MaskMode::Luma);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        assert_eq!(surface.layer_count(), 3);
        let has_luma = surface.commands().iter().any(|c| {
            matches!(
                c,
                Command::SaveLayer { paint: Some(p), .. }
                    if p.color_filter == Some(ColorFilter::LumaToAlpha)
            )
        });
        assert!(has_luma, "luma conversion layer present");
    }

    #[test]
    fn filter_effect_inflates_bounds_and_overrides_damage() {
        let mut sg = SceneGraph::new();
        let geo = sg.add_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
        let paint = sg.add_color(Color::WHITE);
        let draw = sg.add_draw(geo, paint);
        let effect = sg.add_filter_effect(draw, Filter::blur(2.0));
        sg.revalidate(effect, None, &Transform::IDENTITY);
        assert_eq!(sg.bounds(effect), Rect::new(4.0, 4.0, 26.0, 26.0));

        // A child-only change still reports the filtered extent.
        sg.set_rect(geo, Rect::new(10.0, 10.0, 22.0, 20.0));
        let mut ic = InvalidationController::new();
        sg.revalidate(effect, Some(&mut ic), &Transform::IDENTITY);
        assert_eq!(
            ic.bounds(),
            Rect::new(4.0, 4.0, 28.0, 26.0),
            "damage covers old and new filtered bounds"
        );
    }

    #[test]
    fn shared_transform_invalidates_both_effects() {
        let mut sg = SceneGraph::new();
        let a = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let matrix = sg.add_transform(Transform::IDENTITY);
        let ea = sg.add_transform_effect(a, matrix);
        let eb = sg.add_transform_effect(b, matrix);
        let root = sg.add_group(vec![ea, eb]);
        sg.revalidate(root, None, &Transform::IDENTITY);

        sg.set_transform(matrix, Transform::from(Affine::translate((5.0, 0.0))));
        assert!(sg.needs_revalidation(ea));
        assert!(sg.needs_revalidation(eb));

        let mut ic = InvalidationController::new();
        sg.revalidate(root, Some(&mut ic), &Transform::IDENTITY);
        // Each effect absorbs its own before/after damage.
        assert_eq!(ic.damage().len(), 4);
        assert_eq!(ic.bounds(), Rect::new(0.0, 0.0, 15.0, 10.0));
    }

    #[test]
    fn damage_under_a_clip_stays_tight() {
        let mut sg = SceneGraph::new();
        let geo = sg.add_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
        let paint = sg.add_color(Color::WHITE);
        let draw = sg.add_draw(geo, paint);
        let clip = sg.add_rect(Rect::new(0.0, 0.0, 1000.0, 1000.0));
        let effect = sg.add_clip_effect(draw, clip, true);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        sg.set_rect(geo, Rect::new(30.0, 10.0, 40.0, 20.0));
        let mut ic = InvalidationController::new();
        sg.revalidate(effect, Some(&mut ic), &Transform::IDENTITY);
        assert_eq!(
            ic.damage(),
            &[
                Rect::new(10.0, 10.0, 20.0, 20.0),
                Rect::new(30.0, 10.0, 40.0, 20.0),
            ],
            "damage is the draw's before/after, not the clip extent"
        );
    }

    #[test]
    fn mask_hit_testing_flips_with_inversion() {
        let mut sg = SceneGraph::new();
        let child = scene_draw(&mut sg, Rect::new(0.0, 0.0, 20.0, 20.0));
        let mask = scene_draw(&mut sg, Rect::new(10.0, 0.0, 30.0, 20.0));
        let covered = kurbo::Point::new(15.0, 10.0);
        let uncovered = kurbo::Point::new(5.0, 10.0);

        let normal = sg.add_mask_effect(child, mask, MaskMode::Alpha);
        sg.revalidate(normal, None, &Transform::IDENTITY);
        assert_eq!(sg.node_at(normal, covered), Some(child));
        assert_eq!(sg.node_at(normal, uncovered), None);

        let inverted = sg.add_mask_effect(child, mask, MaskMode::InverseAlpha);
        sg.revalidate(inverted, None, &Transform::IDENTITY);
        assert_eq!(sg.node_at(inverted, covered), None);
        assert_eq!(sg.node_at(inverted, uncovered), Some(child));
    }

    #[test]
    fn opacity_modulates_shader_override() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let brush = Brush::Solid(Color::from_rgb8(10, 20, 30));
        let shader = sg.add_shader_effect(draw, brush.clone());
        let effect = sg.add_opacity_effect(shader, 0.5);
        sg.revalidate(effect, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        let Command::DrawRect { paint, .. } = &surface.commands()[0] else {
            panic!("expected a rect draw");
        };
        // The override replaces the brush and the opacity still applies.
        assert_eq!(paint.brush, brush.multiply_alpha(0.5));
    }

    #[test]
    fn shader_effect_overrides_draw_brush() {
        let mut sg = SceneGraph::new();
        let draw = scene_draw(&mut sg, Rect::new(0.0, 0.0, 10.0, 10.0));
        let brush = Brush::Solid(Color::from_rgb8(10, 20, 30));
        let effect = sg.add_shader_effect(draw, brush.clone());
        sg.revalidate(effect, None, &Transform::IDENTITY);

        let mut surface = RecordingSurface::new();
        sg.render(effect, &mut surface);
        let Command::DrawRect { paint, .. } = &surface.commands()[0] else {
            panic!("expected a rect draw");
        };
        assert_eq!(paint.brush, brush);
    }
}
