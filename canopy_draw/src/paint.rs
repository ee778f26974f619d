// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plain-old-data paint state consumed by [`Surface`](crate::Surface)
//! implementations.

use alloc::boxed::Box;
use kurbo::Rect;
use peniko::{BlendMode, Blob, Brush, Color, Fill, ImageAlphaType, ImageFormat};

/// Fill or stroke geometry coverage.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Style {
    /// Fill the interior of the geometry.
    Fill,
    /// Stroke the outline of the geometry with the given width.
    Stroke {
        /// Stroke width in local units.
        width: f64,
    },
}

impl Default for Style {
    fn default() -> Self {
        Self::Fill
    }
}

/// A color transformation applied per produced pixel.
///
/// Composition is explicit: [`ColorFilter::Compose`] applies `inner` first,
/// then `outer`, matching the outer-after-inner rule used when effect scopes
/// accumulate filters while descending a scene.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorFilter {
    /// Blend a constant color over the source using the given mode.
    Blend {
        /// The constant color.
        color: Color,
        /// How the constant color combines with the source.
        mode: BlendMode,
    },
    /// Replace alpha with the source luminance (used for luma mattes).
    LumaToAlpha,
    /// Apply `inner`, then `outer`.
    Compose {
        /// Filter applied second.
        outer: Box<ColorFilter>,
        /// Filter applied first.
        inner: Box<ColorFilter>,
    },
}

impl ColorFilter {
    /// Composes two filters so that `inner` applies before `outer`.
    #[must_use]
    pub fn compose(outer: Self, inner: Self) -> Self {
        Self::Compose {
            outer: Box::new(outer),
            inner: Box::new(inner),
        }
    }
}

/// A layer-compositing image filter.
///
/// Filters are applied when a layer is composited into its parent; backends
/// that rasterize should scale user-space deviations by the current
/// transform. [`Filter::map_bounds`] is the conservative bounds mapping used
/// for damage tracking.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Filter {
    /// Gaussian blur with separate X/Y standard deviations in user space.
    Blur {
        /// Standard deviation along the X axis.
        std_deviation_x: f64,
        /// Standard deviation along the Y axis.
        std_deviation_y: f64,
    },
    /// Drop shadow under the source content.
    DropShadow {
        /// Shadow offset along the X axis.
        dx: f64,
        /// Shadow offset along the Y axis.
        dy: f64,
        /// Blur standard deviation of the shadow.
        std_deviation: f64,
        /// Shadow color.
        color: Color,
    },
    /// Translate the layer output by a vector.
    Offset {
        /// Offset along the X axis.
        dx: f64,
        /// Offset along the Y axis.
        dy: f64,
    },
}

/// Blur kernels are treated as having a support of three standard deviations.
const BLUR_SIGMA_SUPPORT: f64 = 3.0;

impl Filter {
    /// Create a uniform Gaussian blur filter.
    #[must_use]
    pub const fn blur(sigma: f64) -> Self {
        Self::Blur {
            std_deviation_x: sigma,
            std_deviation_y: sigma,
        }
    }

    /// Conservative mapping of source bounds to filtered output bounds.
    #[must_use]
    pub fn map_bounds(&self, src: Rect) -> Rect {
        if src.width() <= 0.0 || src.height() <= 0.0 {
            return Rect::ZERO;
        }
        match *self {
            Self::Blur {
                std_deviation_x,
                std_deviation_y,
            } => src.inflate(
                std_deviation_x.abs() * BLUR_SIGMA_SUPPORT,
                std_deviation_y.abs() * BLUR_SIGMA_SUPPORT,
            ),
            Self::DropShadow {
                dx,
                dy,
                std_deviation,
                ..
            } => {
                let support = std_deviation.abs() * BLUR_SIGMA_SUPPORT;
                let shadow = src.with_origin((src.x0 + dx, src.y0 + dy)).inflate(support, support);
                // The source content still draws on top of its own shadow.
                src.union(shadow)
            }
            Self::Offset { dx, dy } => src.with_origin((src.x0 + dx, src.y0 + dy)),
        }
    }
}

/// An immutable image resource.
///
/// Pixels are stored behind a shared [`Blob`]; equality compares the blob
/// identity rather than pixel contents, which is what change detection wants
/// (swapping in a new blob of identical pixels still counts as a change).
#[derive(Clone, Debug)]
pub struct ImageData {
    /// Tightly packed, row-major pixel data.
    pub data: Blob<u8>,
    /// Pixel format of the buffer.
    pub format: ImageFormat,
    /// Alpha encoding of the pixels.
    pub alpha_type: ImageAlphaType,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageData {
    /// Creates an RGBA8 image with straight alpha from raw pixels.
    pub fn new_rgba8(data: impl Into<Blob<u8>>, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            format: ImageFormat::Rgba8,
            alpha_type: ImageAlphaType::Alpha,
            width,
            height,
        }
    }

    /// The natural bounds of the image, anchored at the origin.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

impl PartialEq for ImageData {
    fn eq(&self, other: &Self) -> bool {
        self.data.id() == other.data.id()
            && self.format == other.format
            && self.alpha_type == other.alpha_type
            && self.width == other.width
            && self.height == other.height
    }
}

/// Paint state for a draw operation or an explicit layer.
///
/// For draws, `brush`/`style`/`fill_rule`/`anti_alias` select coverage and
/// color; for layers (see [`Surface::save_layer`](crate::Surface::save_layer))
/// the brush alpha, `blend`, `color_filter`, and `filter` describe how the
/// layer composites into its parent, mirroring the layer model of imaging
/// backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Paint {
    /// Brush used to produce color (solid, gradient, image).
    pub brush: Brush,
    /// Optional brush-space transform (e.g. a gradient captured under a
    /// different transform than the geometry it now paints).
    pub brush_transform: Option<kurbo::Affine>,
    /// Fill or stroke.
    pub style: Style,
    /// Fill rule for path interiors.
    pub fill_rule: Fill,
    /// Blend mode against the destination.
    pub blend: BlendMode,
    /// Whether edges are anti-aliased.
    pub anti_alias: bool,
    /// Optional per-pixel color transformation.
    pub color_filter: Option<ColorFilter>,
    /// Optional layer-compositing image filter (layers only).
    pub filter: Option<Filter>,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            brush: Brush::Solid(Color::BLACK),
            brush_transform: None,
            style: Style::Fill,
            fill_rule: Fill::NonZero,
            blend: BlendMode::default(),
            anti_alias: true,
            color_filter: None,
            filter: None,
        }
    }
}

impl Paint {
    /// A default fill paint with the given solid color.
    #[must_use]
    pub fn solid(color: Color) -> Self {
        Self {
            brush: Brush::Solid(color),
            ..Self::default()
        }
    }

    /// Returns `true` if the blend mode is the default source-over.
    #[must_use]
    pub fn has_default_blend(&self) -> bool {
        self.blend == BlendMode::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn blur_outsets_by_three_sigma() {
        let f = Filter::blur(2.0);
        let r = f.map_bounds(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(r, Rect::new(-6.0, -6.0, 16.0, 16.0));
    }

    #[test]
    fn drop_shadow_bounds_cover_source_and_shadow() {
        let f = Filter::DropShadow {
            dx: 5.0,
            dy: 5.0,
            std_deviation: 1.0,
            color: Color::BLACK,
        };
        let r = f.map_bounds(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(r, Rect::new(0.0, 0.0, 18.0, 18.0));
    }

    #[test]
    fn filter_of_empty_bounds_is_empty() {
        assert_eq!(Filter::blur(4.0).map_bounds(Rect::ZERO), Rect::ZERO);
    }

    #[test]
    fn image_equality_is_blob_identity() {
        let a = ImageData::new_rgba8(vec![0_u8; 4], 1, 1);
        let b = ImageData::new_rgba8(vec![0_u8; 4], 1, 1);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
