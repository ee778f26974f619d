// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rendering: deferred paint state and the render / hit-test traversals.
//!
//! Effects like opacity or a color filter prefer not to pay for a
//! compositing layer. Instead of pushing a layer eagerly, they fold their
//! contribution into a [`RenderContext`] that flows down the traversal and
//! is applied at the leaves, to each draw's paint. Only when deferral would
//! change the output (overlapping siblings under opacity, stacked blend
//! modes) does [`ScopedRenderContext`] flush the pending state into an
//! explicit isolation layer.

use canopy_draw::{ColorFilter, Paint, Surface, Transform};
use kurbo::{Point, Rect};
use peniko::{BlendMode, Brush, Color};

use crate::graph::SceneGraph;
use crate::node::{NodeId, NodeKind};
use crate::util;

/// A pending shader override together with the transform it was captured
/// under.
#[derive(Clone, Debug)]
struct ShaderOverride {
    brush: Brush,
    ctm: Transform,
}

/// Deferred paint state accumulated while descending through effects.
#[derive(Clone, Debug)]
pub struct RenderContext {
    opacity: f32,
    color_filter: Option<ColorFilter>,
    shader: Option<ShaderOverride>,
    blend: Option<BlendMode>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            color_filter: None,
            shader: None,
            blend: None,
        }
    }
}

impl RenderContext {
    /// Returns `true` if applying this context changes nothing.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.opacity >= 1.0
            && self.color_filter.is_none()
            && self.shader.is_none()
            && self.blend.is_none()
    }

    /// Returns `true` if correctness under overlap requires flushing this
    /// context into a layer rather than applying it per draw.
    fn requires_isolation(&self) -> bool {
        !self.is_passthrough()
    }

    /// The paint used when flushing this context into a layer.
    ///
    /// A pending shader override cannot be expressed as a layer paint and is
    /// dropped; shader overrides only ever apply per draw.
    fn layer_paint(&self) -> Paint {
        let mut paint = Paint::solid(Color::BLACK.with_alpha(self.opacity));
        paint.color_filter = self.color_filter.clone();
        if let Some(blend) = self.blend {
            paint.blend = blend;
        }
        paint
    }

    /// Folds the deferred state into a draw's paint.
    ///
    /// A pending shader override replaces the brush first, so pending
    /// opacity modulates the shader's output rather than being lost with
    /// the replaced brush.
    pub(crate) fn modulate_paint(&self, device_ctm: &Transform, paint: &mut Paint) {
        if let Some(shader) = &self.shader {
            paint.brush = shader.brush.clone();
            // Re-express the capture-time transform relative to the draw's
            // device transform, so the shader stays fixed in the space it
            // was installed in. Perspective and singular cases fall back to
            // sampling in local space.
            paint.brush_transform = match (device_ctm.invert(), shader.ctm) {
                (Some(Transform::Affine(inv)), Transform::Affine(capture)) => Some(inv * capture),
                _ => None,
            };
        }
        if self.opacity < 1.0 {
            paint.brush = paint.brush.clone().multiply_alpha(self.opacity);
        }
        if let Some(filter) = &self.color_filter {
            paint.color_filter = Some(match paint.color_filter.take() {
                Some(inner) => ColorFilter::compose(filter.clone(), inner),
                None => filter.clone(),
            });
        }
        if let Some(blend) = self.blend {
            paint.blend = blend;
        }
    }
}

/// RAII scope pairing a surface with a [`RenderContext`].
///
/// Construction snapshots the surface's save count; drop unwinds back to
/// it, so any layers flushed by the modulation methods are always popped,
/// even on early return.
pub struct ScopedRenderContext<'a> {
    surface: &'a mut dyn Surface,
    ctx: RenderContext,
    restore_count: usize,
}

impl<'a> ScopedRenderContext<'a> {
    /// Opens a scope, inheriting `ctx` (or starting clean).
    pub fn new(surface: &'a mut dyn Surface, ctx: Option<&RenderContext>) -> Self {
        let restore_count = surface.save_count();
        Self {
            surface,
            ctx: ctx.cloned().unwrap_or_default(),
            restore_count,
        }
    }

    /// The surface and the accumulated context, for rendering children.
    pub fn parts(&mut self) -> (&mut dyn Surface, &RenderContext) {
        (&mut *self.surface, &self.ctx)
    }

    /// Multiplies the deferred opacity.
    #[must_use]
    pub fn modulate_opacity(mut self, opacity: f32) -> Self {
        self.ctx.opacity *= opacity.clamp(0.0, 1.0);
        self
    }

    /// Composes a color filter under any already pending filter.
    ///
    /// The outer (earlier installed) filter applies last, matching filter
    /// nesting in the scene.
    #[must_use]
    pub fn modulate_color_filter(mut self, filter: ColorFilter) -> Self {
        self.ctx.color_filter = Some(match self.ctx.color_filter.take() {
            Some(outer) => ColorFilter::compose(outer, filter),
            None => filter,
        });
        self
    }

    /// Defers a blend mode to the next layer or draw.
    ///
    /// Blend modes do not compose; a second pending blend flushes the first
    /// into a layer over `bounds`.
    #[must_use]
    pub fn modulate_blend_mode(mut self, blend: BlendMode, bounds: Rect) -> Self {
        if self.ctx.blend.is_some() {
            self.flush(bounds);
        }
        self.ctx.blend = Some(blend);
        self
    }

    /// Defers a shader override, captured under the current transform.
    ///
    /// Shader overrides do not compose either; a second pending shader
    /// flushes the first.
    #[must_use]
    pub fn modulate_shader(mut self, brush: Brush, bounds: Rect) -> Self {
        if self.ctx.shader.is_some() {
            self.flush(bounds);
        }
        let ctm = self.surface.current_transform();
        self.ctx.shader = Some(ShaderOverride { brush, ctm });
        self
    }

    /// Flushes the pending context into an isolation layer over `bounds`
    /// when `isolate` is set and the context is not a passthrough.
    #[must_use]
    pub fn set_isolation(mut self, bounds: Rect, isolate: bool) -> Self {
        if isolate && self.ctx.requires_isolation() {
            self.flush(bounds);
        }
        self
    }

    fn flush(&mut self, bounds: Rect) {
        self.surface
            .save_layer(Some(bounds), Some(&self.ctx.layer_paint()));
        self.ctx = RenderContext::default();
    }
}

impl core::fmt::Debug for ScopedRenderContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopedRenderContext")
            .field("ctx", &self.ctx)
            .field("restore_count", &self.restore_count)
            .finish_non_exhaustive()
    }
}

impl Drop for ScopedRenderContext<'_> {
    fn drop(&mut self) {
        self.surface.restore_to_count(self.restore_count);
    }
}

impl SceneGraph {
    /// Renders the subtree rooted at a render node.
    ///
    /// The graph must be revalidated first; rendering never recomputes
    /// caches. The surface's save stack is left balanced.
    pub fn render(&self, root: NodeId, surface: &mut dyn Surface) {
        self.render_node(root, surface, None);
    }

    pub(crate) fn render_node(
        &self,
        id: NodeId,
        surface: &mut dyn Surface,
        ctx: Option<&RenderContext>,
    ) {
        let node = self.node(id);
        debug_assert!(node.kind.is_render(), "render of a non-render node");
        debug_assert!(!node.has_inval(), "render requires a revalidated graph");
        if util::is_empty(node.bounds) {
            return;
        }
        match &node.kind {
            NodeKind::Draw(d) => self.render_draw(d, surface, ctx),
            NodeKind::Image(i) => self.render_image(i, surface, ctx),
            NodeKind::Group(g) => self.render_group(g, node.bounds, surface, ctx),
            NodeKind::TransformEffect(t) => self.render_transform_effect(t, surface, ctx),
            NodeKind::ClipEffect(c) => self.render_clip_effect(c, surface, ctx),
            NodeKind::MaskEffect(m) => self.render_mask_effect(m, node.bounds, surface, ctx),
            NodeKind::OpacityEffect(e) => self.render_opacity_effect(e, surface, ctx),
            NodeKind::BlendModeEffect(e) => {
                self.render_blend_mode_effect(e, node.bounds, surface, ctx);
            }
            NodeKind::ColorFilterEffect(e) => self.render_color_filter_effect(e, surface, ctx),
            NodeKind::ShaderEffect(e) => self.render_shader_effect(e, node.bounds, surface, ctx),
            NodeKind::FilterEffect(e) => self.render_filter_effect(e, node.bounds, surface, ctx),
            _ => {}
        }
    }

    /// Finds the top-most render node whose painted content covers `point`
    /// (in the root's coordinate space).
    ///
    /// Requires a revalidated graph. Effects forward to their child after
    /// applying their own screening: transforms map the point, clips and
    /// masks reject points outside their coverage, and fully transparent
    /// opacity swallows hits.
    #[must_use]
    pub fn node_at(&self, id: NodeId, point: Point) -> Option<NodeId> {
        let node = self.node(id);
        debug_assert!(node.kind.is_render(), "hit test of a non-render node");
        debug_assert!(!node.has_inval(), "hit test requires a revalidated graph");
        if !node.bounds.contains(point) {
            return None;
        }
        match &node.kind {
            NodeKind::Draw(d) => self.geometry_contains(d.geometry, point).then_some(id),
            NodeKind::Image(_) => Some(id),
            // Children are drawn back to front, so hit-test front to back.
            NodeKind::Group(g) => g
                .children
                .iter()
                .rev()
                .find_map(|&child| self.node_at(child, point)),
            NodeKind::TransformEffect(t) => {
                let inv = self.transform_value(t.transform).invert()?;
                self.node_at(t.child, inv.map_point(point))
            }
            NodeKind::ClipEffect(c) => self
                .geometry_contains(c.clip, point)
                .then(|| self.node_at(c.child, point))
                .flatten(),
            NodeKind::MaskEffect(m) => {
                let covered = self.node_at(m.mask, point).is_some();
                if covered == m.mode.is_inverted() {
                    return None;
                }
                self.node_at(m.child, point)
            }
            NodeKind::OpacityEffect(e) => {
                if e.opacity <= 0.0 {
                    return None;
                }
                self.node_at(e.child, point)
            }
            NodeKind::BlendModeEffect(e) => self.node_at(e.child, point),
            NodeKind::ColorFilterEffect(e) => self.node_at(e.child, point),
            NodeKind::ShaderEffect(e) => self.node_at(e.child, point),
            NodeKind::FilterEffect(e) => self.node_at(e.child, point),
            _ => None,
        }
    }
}
