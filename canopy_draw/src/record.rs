// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording surface for tests and debugging.
//!
//! [`RecordingSurface`] implements [`Surface`] by logging [`Command`]s and
//! tracking save-stack state instead of rasterizing. It is intentionally
//! *not* a reference renderer: it produces no pixels and establishes no
//! golden rendering behavior. Its purpose is to let tests assert on the
//! operations a traversal emits (e.g. "this render issued no clip commands")
//! and on stack balance.

use alloc::vec::Vec;

use kurbo::{BezPath, Rect, RoundedRect};
use peniko::{Fill, ImageSampler};

use crate::{ClipOp, ImageData, Paint, Surface, Transform};

/// A single recorded surface operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// State save.
    Save,
    /// Layer push with optional bounds hint and layer paint.
    SaveLayer {
        /// Layer extent hint in local coordinates.
        bounds: Option<Rect>,
        /// Paint used when compositing the layer into its parent.
        paint: Option<Paint>,
    },
    /// State or layer restore.
    Restore,
    /// Transform concatenation.
    Concat(Transform),
    /// Rectangle clip.
    ClipRect {
        /// Clip rectangle.
        rect: Rect,
        /// Whether the clip edge is anti-aliased.
        anti_alias: bool,
    },
    /// Rounded-rectangle clip.
    ClipRRect {
        /// Clip shape.
        rrect: RoundedRect,
        /// Whether the clip edge is anti-aliased.
        anti_alias: bool,
    },
    /// Path clip.
    ClipPath {
        /// Clip path.
        path: BezPath,
        /// Fill rule defining the path interior.
        fill_rule: Fill,
        /// How the path combines with the existing clip.
        op: ClipOp,
        /// Whether the clip edge is anti-aliased.
        anti_alias: bool,
    },
    /// Rectangle draw.
    DrawRect {
        /// Drawn rectangle.
        rect: Rect,
        /// Paint used for the draw.
        paint: Paint,
    },
    /// Rounded-rectangle draw.
    DrawRRect {
        /// Drawn shape.
        rrect: RoundedRect,
        /// Paint used for the draw.
        paint: Paint,
    },
    /// Path draw.
    DrawPath {
        /// Drawn path.
        path: BezPath,
        /// Paint used for the draw.
        paint: Paint,
    },
    /// Image draw.
    DrawImage {
        /// Drawn image.
        image: ImageData,
        /// Destination rectangle in local coordinates.
        dst: Rect,
        /// Sampling parameters.
        sampler: ImageSampler,
        /// Paint used for the draw.
        paint: Paint,
    },
}

impl Command {
    /// Returns `true` for the clip command variants.
    #[must_use]
    pub const fn is_clip(&self) -> bool {
        matches!(
            self,
            Self::ClipRect { .. } | Self::ClipRRect { .. } | Self::ClipPath { .. }
        )
    }

    /// Returns `true` for the draw command variants.
    #[must_use]
    pub const fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::DrawRect { .. }
                | Self::DrawRRect { .. }
                | Self::DrawPath { .. }
                | Self::DrawImage { .. }
        )
    }
}

/// A [`Surface`] implementation that records commands.
///
/// Restores past the bottom of the stack are tolerated and ignored, so a
/// traversal bug surfaces as an unbalanced [`depth`](RecordingSurface::depth)
/// rather than a panic inside the recorder.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    commands: Vec<Command>,
    /// Transform stack; the last entry is the current total transform.
    stack: Vec<Transform>,
    current: Transform,
}

impl RecordingSurface {
    /// Creates an empty recording surface with an identity transform.
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            stack: Vec::new(),
            current: Transform::IDENTITY,
        }
    }

    /// The recorded commands, in emission order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of unmatched saves currently on the stack.
    ///
    /// A balanced traversal leaves this at zero.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of recorded clip commands.
    #[must_use]
    pub fn clip_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_clip()).count()
    }

    /// Number of recorded layer pushes.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::SaveLayer { .. }))
            .count()
    }

    /// Clears the command log but keeps the current state.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Surface for RecordingSurface {
    fn save(&mut self) {
        self.stack.push(self.current);
        self.commands.push(Command::Save);
    }

    fn save_layer(&mut self, bounds: Option<Rect>, paint: Option<&Paint>) {
        self.stack.push(self.current);
        self.commands.push(Command::SaveLayer {
            bounds,
            paint: paint.cloned(),
        });
    }

    fn restore(&mut self) {
        if let Some(prev) = self.stack.pop() {
            self.current = prev;
            self.commands.push(Command::Restore);
        }
    }

    fn save_count(&self) -> usize {
        self.stack.len() + 1
    }

    fn restore_to_count(&mut self, count: usize) {
        while self.save_count() > count.max(1) {
            self.restore();
        }
    }

    fn concat(&mut self, transform: &Transform) {
        self.current = self.current.concat(transform);
        self.commands.push(Command::Concat(*transform));
    }

    fn current_transform(&self) -> Transform {
        self.current
    }

    fn clip_rect(&mut self, rect: Rect, anti_alias: bool) {
        self.commands.push(Command::ClipRect { rect, anti_alias });
    }

    fn clip_rrect(&mut self, rrect: RoundedRect, anti_alias: bool) {
        self.commands.push(Command::ClipRRect { rrect, anti_alias });
    }

    fn clip_path(&mut self, path: &BezPath, fill_rule: Fill, op: ClipOp, anti_alias: bool) {
        self.commands.push(Command::ClipPath {
            path: path.clone(),
            fill_rule,
            op,
            anti_alias,
        });
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.commands.push(Command::DrawRect {
            rect,
            paint: paint.clone(),
        });
    }

    fn draw_rrect(&mut self, rrect: RoundedRect, paint: &Paint) {
        self.commands.push(Command::DrawRRect {
            rrect,
            paint: paint.clone(),
        });
    }

    fn draw_path(&mut self, path: &BezPath, paint: &Paint) {
        self.commands.push(Command::DrawPath {
            path: path.clone(),
            paint: paint.clone(),
        });
    }

    fn draw_image(&mut self, image: &ImageData, dst: Rect, sampler: ImageSampler, paint: &Paint) {
        self.commands.push(Command::DrawImage {
            image: image.clone(),
            dst,
            sampler,
            paint: paint.clone(),
        });
    }
}
