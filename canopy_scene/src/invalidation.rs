// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Damage collection during revalidation.

use alloc::vec::Vec;

use canopy_draw::Transform;
use kurbo::Rect;

use crate::util;

/// Collects device-space damage rectangles produced by a revalidation pass.
///
/// Pass a controller to [`SceneGraph::revalidate`](crate::SceneGraph::revalidate)
/// to find out which parts of the output changed; a renderer then redraws the
/// union (or each rectangle) of the reported damage.
///
/// The controller is deliberately dumb: it stores what it is told, in order,
/// without merging. Callers that want a single dirty region use
/// [`bounds`](InvalidationController::bounds).
#[derive(Clone, Debug, Default)]
pub struct InvalidationController {
    damage: Vec<Rect>,
}

impl InvalidationController {
    /// Creates an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a damaged rectangle, mapped through `ctm` into device space.
    ///
    /// Empty and non-finite rectangles are dropped; they carry no damage and
    /// would otherwise poison the aggregate bounds.
    pub fn inval(&mut self, rect: Rect, ctm: &Transform) {
        let device = ctm.map_rect(rect);
        if util::is_empty(device) {
            return;
        }
        self.damage.push(device);
    }

    /// The recorded damage rectangles, in report order.
    #[must_use]
    pub fn damage(&self) -> &[Rect] {
        &self.damage
    }

    /// The union of all recorded damage, or [`Rect::ZERO`] if none.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.damage
            .iter()
            .fold(Rect::ZERO, |acc, &r| util::union_nonempty(acc, r))
    }

    /// Discards all recorded damage, keeping the allocation.
    pub fn reset(&mut self) {
        self.damage.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Affine;

    #[test]
    fn inval_maps_through_ctm() {
        let mut ic = InvalidationController::new();
        ic.inval(
            Rect::new(1.0, 1.0, 2.0, 2.0),
            &Transform::from(Affine::scale(10.0)),
        );
        assert_eq!(ic.damage(), &[Rect::new(10.0, 10.0, 20.0, 20.0)]);
    }

    #[test]
    fn empty_rects_are_dropped() {
        let mut ic = InvalidationController::new();
        ic.inval(Rect::ZERO, &Transform::IDENTITY);
        ic.inval(Rect::new(5.0, 5.0, 5.0, 9.0), &Transform::IDENTITY);
        assert!(ic.damage().is_empty());
        assert_eq!(ic.bounds(), Rect::ZERO);
    }

    #[test]
    fn bounds_unions_all_damage() {
        let mut ic = InvalidationController::new();
        ic.inval(Rect::new(0.0, 0.0, 1.0, 1.0), &Transform::IDENTITY);
        ic.inval(Rect::new(4.0, 4.0, 5.0, 5.0), &Transform::IDENTITY);
        assert_eq!(ic.bounds(), Rect::new(0.0, 0.0, 5.0, 5.0));
        ic.reset();
        assert!(ic.damage().is_empty());
    }
}
