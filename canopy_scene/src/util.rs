// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle helpers with explicit empty-rectangle semantics.
//!
//! [`kurbo::Rect`] set operations assume well-formed rectangles; bounds
//! aggregation here needs "empty means contributes nothing", so the helpers
//! in this module check emptiness first.

use kurbo::Rect;

/// A rectangle large enough to stand in for "the whole canvas".
///
/// Kept finite so that transform mapping and unions stay well-defined.
pub(crate) const EVERYTHING: Rect = Rect::new(-1.0e9, -1.0e9, 1.0e9, 1.0e9);

/// Returns `true` if `r` has no area.
pub(crate) fn is_empty(r: Rect) -> bool {
    r.width() <= 0.0 || r.height() <= 0.0
}

/// Intersection, collapsing to [`Rect::ZERO`] when disjoint or either input
/// is empty.
pub(crate) fn intersect_or_empty(a: Rect, b: Rect) -> Rect {
    if is_empty(a) || is_empty(b) {
        return Rect::ZERO;
    }
    let r = a.intersect(b);
    if is_empty(r) { Rect::ZERO } else { r }
}

/// Union where an empty rectangle is the identity element.
pub(crate) fn union_nonempty(a: Rect, b: Rect) -> Rect {
    if is_empty(a) {
        b
    } else if is_empty(b) {
        a
    } else {
        a.union(b)
    }
}

/// Returns `true` if two non-empty rectangles overlap.
pub(crate) fn overlaps(a: Rect, b: Rect) -> bool {
    !is_empty(a) && !is_empty(b) && a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Returns `true` if `outer` contains all of `inner`.
///
/// An empty `inner` is contained in anything.
pub(crate) fn contains_rect(outer: Rect, inner: Rect) -> bool {
    is_empty(inner)
        || (outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1)
}
