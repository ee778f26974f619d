// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transform values with an affine / 4×4 capability duality.

use glam::{DMat4, DVec3, DVec4};
use kurbo::{Affine, Point, Rect};

/// Determinants smaller than this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// A transform value used for geometry, canvas state, and damage mapping.
///
/// Most scene content only ever needs a 2D affine transform, but camera-style
/// content (3D layer rotations, perspective) needs a full 4×4 matrix. The two
/// representations are kept distinct so that the common affine case stays
/// cheap, with [`Transform::is_44`] as the capability query.
///
/// Capability is sticky upward: combining an affine transform with a 4×4 one
/// always yields a 4×4 result (see [`Transform::concat`]).
///
/// # Example
///
/// ```
/// use canopy_draw::Transform;
/// use kurbo::Affine;
///
/// let a = Transform::from(Affine::scale(2.0));
/// let b = Transform::perspective_identity();
/// assert!(!a.is_44());
/// assert!(a.concat(&b).is_44());
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Transform {
    /// A 2D affine transform.
    Affine(Affine),
    /// A full 4×4 matrix, possibly carrying perspective.
    Matrix4(DMat4),
}

impl Transform {
    /// The identity transform, in the affine representation.
    pub const IDENTITY: Self = Self::Affine(Affine::IDENTITY);

    /// The identity transform, in the 4×4 representation.
    ///
    /// Useful to force a composition chain into the higher-capability
    /// representation.
    #[must_use]
    pub const fn perspective_identity() -> Self {
        Self::Matrix4(DMat4::IDENTITY)
    }

    /// Returns `true` for the 4×4 representation.
    #[must_use]
    pub const fn is_44(&self) -> bool {
        matches!(self, Self::Matrix4(_))
    }

    /// Returns `true` if this transform is exactly the identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        match self {
            Self::Affine(m) => *m == Affine::IDENTITY,
            Self::Matrix4(m) => *m == DMat4::IDENTITY,
        }
    }

    /// Returns the 4×4 form of this transform.
    #[must_use]
    pub fn to_mat4(&self) -> DMat4 {
        match self {
            Self::Affine(m) => {
                let [a, b, c, d, e, f] = m.as_coeffs();
                // Column-major embedding of the 2D affine map.
                DMat4::from_cols(
                    DVec4::new(a, b, 0.0, 0.0),
                    DVec4::new(c, d, 0.0, 0.0),
                    DVec4::new(0.0, 0.0, 1.0, 0.0),
                    DVec4::new(e, f, 0.0, 1.0),
                )
            }
            Self::Matrix4(m) => *m,
        }
    }

    /// Composes two transforms: the result applies `other` first, then `self`.
    ///
    /// If either side is a 4×4 matrix, so is the result.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Affine(a), Self::Affine(b)) => Self::Affine(*a * *b),
            _ => Self::Matrix4(self.to_mat4() * other.to_mat4()),
        }
    }

    /// Returns the inverse transform, or `None` if this transform is singular
    /// (or not finite).
    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        match self {
            Self::Affine(m) => {
                let det = m.determinant();
                if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
                    return None;
                }
                Some(Self::Affine(m.inverse()))
            }
            Self::Matrix4(m) => {
                let det = m.determinant();
                if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
                    return None;
                }
                Some(Self::Matrix4(m.inverse()))
            }
        }
    }

    /// Maps a point through this transform.
    ///
    /// The 4×4 form performs the perspective divide; points on or behind the
    /// w = 0 plane are clamped rather than allowed to blow up.
    #[must_use]
    pub fn map_point(&self, p: Point) -> Point {
        match self {
            Self::Affine(m) => *m * p,
            Self::Matrix4(m) => {
                let v = project(m, p.x, p.y);
                Point::new(v.x, v.y)
            }
        }
    }

    /// Maps a rectangle through this transform, returning the bounding box of
    /// the mapped corners.
    ///
    /// Degenerate results (non-finite coordinates from a near-singular
    /// perspective) collapse to the empty rectangle instead of poisoning
    /// downstream bounds with NaN/Inf.
    #[must_use]
    pub fn map_rect(&self, r: Rect) -> Rect {
        if r.width() <= 0.0 || r.height() <= 0.0 {
            return Rect::ZERO;
        }
        match self {
            Self::Affine(m) => {
                let mapped = m.transform_rect_bbox(r);
                if mapped.x0.is_finite()
                    && mapped.y0.is_finite()
                    && mapped.x1.is_finite()
                    && mapped.y1.is_finite()
                {
                    mapped
                } else {
                    Rect::ZERO
                }
            }
            Self::Matrix4(m) => {
                let corners = [
                    project(m, r.x0, r.y0),
                    project(m, r.x1, r.y0),
                    project(m, r.x1, r.y1),
                    project(m, r.x0, r.y1),
                ];
                let mut x0 = f64::INFINITY;
                let mut y0 = f64::INFINITY;
                let mut x1 = f64::NEG_INFINITY;
                let mut y1 = f64::NEG_INFINITY;
                for c in corners {
                    if !c.x.is_finite() || !c.y.is_finite() {
                        return Rect::ZERO;
                    }
                    x0 = x0.min(c.x);
                    y0 = y0.min(c.y);
                    x1 = x1.max(c.x);
                    y1 = y1.max(c.y);
                }
                Rect::new(x0, y0, x1, y1)
            }
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Affine> for Transform {
    fn from(m: Affine) -> Self {
        Self::Affine(m)
    }
}

impl From<DMat4> for Transform {
    fn from(m: DMat4) -> Self {
        Self::Matrix4(m)
    }
}

/// Projects a 2D point through a 4×4 matrix with perspective divide.
fn project(m: &DMat4, x: f64, y: f64) -> DVec3 {
    let v = *m * DVec4::new(x, y, 0.0, 1.0);
    let w = if v.w.abs() >= SINGULAR_EPSILON {
        v.w
    } else if v.w < 0.0 {
        -SINGULAR_EPSILON
    } else {
        SINGULAR_EPSILON
    };
    DVec3::new(v.x / w, v.y / w, v.z / w)
}
