// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Draw: backend-agnostic drawing surface capability.
//!
//! This crate defines the drawing vocabulary consumed by the Canopy scene
//! graph (`canopy_scene`) and implemented by concrete renderers. It sits in
//! the same position as an imaging IR: retained scene structure above,
//! rasterizing backends below.
//!
//! # Core concepts
//!
//! - [`Surface`]: a stateful canvas capability with save/restore stack
//!   discipline, transform concatenation, clipping, explicit compositing
//!   layers, and draw operations. The scene graph never touches pixels; it
//!   only speaks to a `Surface`.
//! - [`Paint`]: plain-old-data paint state built on [`peniko::Brush`], with
//!   optional [`ColorFilter`] and layer [`Filter`] attachments.
//! - [`Transform`]: a 2D-affine / 4×4 transform duality with sticky-upward
//!   capability promotion, used for canvas state and damage mapping.
//! - [`RecordingSurface`](record::RecordingSurface): a recording
//!   implementation that logs [`Command`](record::Command)s instead of
//!   rasterizing, for tests and debugging that assert on emitted operations.
//!
//! # Example
//!
//! ```
//! use canopy_draw::{Paint, Surface, record::{Command, RecordingSurface}};
//! use kurbo::Rect;
//! use peniko::Color;
//!
//! let mut surface = RecordingSurface::new();
//! surface.save();
//! surface.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), &Paint::solid(Color::WHITE));
//! surface.restore();
//!
//! assert_eq!(surface.commands().len(), 3);
//! assert!(matches!(surface.commands()[1], Command::DrawRect { .. }));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod paint;
pub mod record;
mod transform;

pub use paint::{ColorFilter, Filter, ImageData, Paint, Style};
pub use transform::Transform;

use kurbo::{BezPath, Rect, RoundedRect};
use peniko::{Fill, ImageSampler};

/// How a clip shape combines with the existing clip region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClipOp {
    /// Restrict the clip to the intersection with the shape.
    Intersect,
    /// Remove the shape's interior from the clip.
    Difference,
}

/// A stateful drawing surface.
///
/// Implementations maintain a save stack of transform/clip/layer state.
/// Every [`save`](Surface::save) and [`save_layer`](Surface::save_layer)
/// must eventually be matched by a [`restore`](Surface::restore); callers
/// that cannot guarantee this structurally should use
/// [`save_count`](Surface::save_count) and
/// [`restore_to_count`](Surface::restore_to_count) to unwind.
///
/// Layers are the compositing mechanism: a layer's contents draw with plain
/// source-over compositing and are then composited into the parent using the
/// layer paint's alpha, blend mode, color filter, and image filter.
pub trait Surface {
    /// Saves the current transform and clip state.
    fn save(&mut self);

    /// Pushes an explicit compositing layer.
    ///
    /// `bounds` is a hint for the layer's extent in the current local
    /// coordinates; `paint` controls how the layer composites into its
    /// parent when the matching [`restore`](Surface::restore) pops it.
    fn save_layer(&mut self, bounds: Option<Rect>, paint: Option<&Paint>);

    /// Restores the most recent [`save`](Surface::save) or
    /// [`save_layer`](Surface::save_layer).
    fn restore(&mut self);

    /// The current save stack depth. A freshly created surface reports 1.
    fn save_count(&self) -> usize;

    /// Restores until [`save_count`](Surface::save_count) returns `count`.
    fn restore_to_count(&mut self, count: usize);

    /// Concatenates a transform onto the current transform.
    fn concat(&mut self, transform: &Transform);

    /// The current total transform (local space to device space).
    fn current_transform(&self) -> Transform;

    /// Intersects the clip with an axis-aligned rectangle.
    fn clip_rect(&mut self, rect: Rect, anti_alias: bool);

    /// Intersects the clip with a rounded rectangle.
    fn clip_rrect(&mut self, rrect: RoundedRect, anti_alias: bool);

    /// Combines the clip with a path interior under the given fill rule.
    fn clip_path(&mut self, path: &BezPath, fill_rule: Fill, op: ClipOp, anti_alias: bool);

    /// Fills or strokes an axis-aligned rectangle.
    fn draw_rect(&mut self, rect: Rect, paint: &Paint);

    /// Fills or strokes a rounded rectangle.
    fn draw_rrect(&mut self, rrect: RoundedRect, paint: &Paint);

    /// Fills or strokes a path.
    fn draw_path(&mut self, path: &BezPath, paint: &Paint);

    /// Draws an image into a destination rectangle.
    fn draw_image(&mut self, image: &ImageData, dst: Rect, sampler: ImageSampler, paint: &Paint);
}
