// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry nodes: shape producers that never paint.
//!
//! A geometry node answers four questions: how to clip a surface to the
//! shape, how to draw the shape with a paint, whether a point is inside it,
//! and what it looks like as a path. Composite geometry ([`MergeMode`]
//! combinations, transformed geometry) caches its derived path during
//! revalidation.

use alloc::vec::Vec;

use canopy_draw::{ClipOp, Paint, Surface, Transform};
use kurbo::{
    BezPath, ParamCurve, ParamCurveArclen, PathEl, PathSeg, Point, Rect, RoundedRect, Shape,
};
use peniko::Fill;

use crate::InvalidationController;
use crate::graph::SceneGraph;
use crate::node::{InvalTraits, NodeId, NodeKind};
use crate::util;

/// Flattening tolerance for converting analytic shapes to paths.
pub(crate) const PATH_TOLERANCE: f64 = 0.1;

/// Arc-length accuracy for trim parameterization.
const TRIM_ACCURACY: f64 = 1.0e-4;

/// How a [`Merge`](SceneGraph::add_merge) combines its children.
///
/// Children combine left to right. The subtractive modes are defined over
/// the whole child list: [`MergeMode::Difference`] is the first child minus
/// the union of the rest, and [`MergeMode::ReverseDifference`] is the union
/// of the rest minus the first child.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MergeMode {
    /// Children are concatenated into one path (equivalent to union for
    /// non-overlapping content).
    Merge,
    /// The union of all children.
    Union,
    /// The intersection of all children.
    Intersect,
    /// The first child minus the union of the rest.
    Difference,
    /// The union of the rest minus the first child.
    ReverseDifference,
    /// Points covered by an odd number of children.
    Xor,
}

#[derive(Debug)]
pub(crate) struct RectNode {
    pub(crate) rect: Rect,
}

#[derive(Debug)]
pub(crate) struct RRectNode {
    pub(crate) rrect: RoundedRect,
}

#[derive(Debug)]
pub(crate) struct PathNode {
    pub(crate) path: BezPath,
    pub(crate) fill_rule: Fill,
}

#[derive(Debug)]
pub(crate) struct MergeNode {
    pub(crate) children: Vec<NodeId>,
    pub(crate) mode: MergeMode,
    /// Concatenation of all child paths, rebuilt on revalidation.
    pub(crate) merged: BezPath,
}

#[derive(Debug)]
pub(crate) struct GeometryTransformNode {
    pub(crate) child: NodeId,
    pub(crate) transform: NodeId,
    /// The child's path mapped through the transform, rebuilt on
    /// revalidation.
    pub(crate) path: BezPath,
}

#[derive(Debug)]
pub(crate) struct TrimNode {
    pub(crate) child: NodeId,
    pub(crate) start: f64,
    pub(crate) end: f64,
    pub(crate) offset: f64,
    /// The child's outline restricted to the trimmed span, rebuilt on
    /// revalidation.
    pub(crate) trimmed: BezPath,
}

#[derive(Debug)]
pub(crate) struct RoundNode {
    pub(crate) child: NodeId,
    pub(crate) radius: f64,
    /// The child's path with straight-edge corners rounded, rebuilt on
    /// revalidation.
    pub(crate) rounded: BezPath,
}

impl SceneGraph {
    /// Adds an axis-aligned rectangle geometry.
    pub fn add_rect(&mut self, rect: Rect) -> NodeId {
        self.insert(NodeKind::Rect(RectNode { rect }), InvalTraits::BUBBLE_DAMAGE)
    }

    /// Adds a rounded-rectangle geometry.
    pub fn add_rrect(&mut self, rrect: RoundedRect) -> NodeId {
        self.insert(
            NodeKind::RRect(RRectNode { rrect }),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    /// Adds a path geometry with the non-zero fill rule.
    pub fn add_path(&mut self, path: BezPath) -> NodeId {
        self.insert(
            NodeKind::Path(PathNode {
                path,
                fill_rule: Fill::NonZero,
            }),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    /// Adds an unbounded geometry covering the whole canvas.
    pub fn add_plane(&mut self) -> NodeId {
        self.insert(NodeKind::Plane, InvalTraits::BUBBLE_DAMAGE)
    }

    /// Adds a combination of child geometries.
    ///
    /// Panics if `children` is empty; the subtractive modes have no meaning
    /// without a first child.
    pub fn add_merge(&mut self, children: Vec<NodeId>, mode: MergeMode) -> NodeId {
        assert!(!children.is_empty(), "merge of no children");
        debug_assert!(
            children.iter().all(|&c| self.node(c).kind.is_geometry()),
            "merge child is not a geometry node"
        );
        self.insert(
            NodeKind::Merge(MergeNode {
                children,
                mode,
                merged: BezPath::new(),
            }),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    /// Adds a geometry that is `child` mapped through a transform node.
    pub fn add_geometry_transform(&mut self, child: NodeId, transform: NodeId) -> NodeId {
        debug_assert!(
            self.node(child).kind.is_geometry(),
            "geometry transform child is not a geometry node"
        );
        debug_assert!(
            matches!(self.node(transform).kind, NodeKind::Transform(_)),
            "geometry transform source is not a transform node"
        );
        self.insert(
            NodeKind::GeometryTransform(GeometryTransformNode {
                child,
                transform,
                path: BezPath::new(),
            }),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    /// Adds a geometry exposing the span of `child`'s outline from `start`
    /// to `end`, both fractions of the total arc length.
    ///
    /// `offset` shifts the span along the outline and may wrap past the end;
    /// a wrapped span continues from the outline's beginning.
    pub fn add_trim(&mut self, child: NodeId, start: f64, end: f64, offset: f64) -> NodeId {
        debug_assert!(
            self.node(child).kind.is_geometry(),
            "trim child is not a geometry node"
        );
        self.insert(
            NodeKind::Trim(TrimNode {
                child,
                start: start.clamp(0.0, 1.0),
                end: end.clamp(0.0, 1.0),
                offset,
                trimmed: BezPath::new(),
            }),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    /// Adds a geometry rounding the straight-edge corners of `child`.
    ///
    /// Corners where two line segments meet are replaced by a curve of the
    /// given radius (capped at half of each adjacent edge); curved joins
    /// pass through unchanged.
    pub fn add_round(&mut self, child: NodeId, radius: f64) -> NodeId {
        debug_assert!(
            self.node(child).kind.is_geometry(),
            "round child is not a geometry node"
        );
        self.insert(
            NodeKind::Round(RoundNode {
                child,
                radius: radius.max(0.0),
                rounded: BezPath::new(),
            }),
            InvalTraits::BUBBLE_DAMAGE,
        )
    }

    /// The rectangle of a rect geometry.
    #[must_use]
    pub fn rect(&self, id: NodeId) -> Rect {
        let NodeKind::Rect(g) = &self.node(id).kind else {
            panic!("rect on a non-rect node");
        };
        g.rect
    }

    /// Replaces the rectangle of a rect geometry.
    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        let NodeKind::Rect(g) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_rect on a non-rect node");
            return;
        };
        if g.rect == rect {
            return;
        }
        g.rect = rect;
        self.invalidate_node(id, true);
    }

    /// Replaces the shape of a rounded-rectangle geometry.
    pub fn set_rrect(&mut self, id: NodeId, rrect: RoundedRect) {
        let NodeKind::RRect(g) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_rrect on a non-rrect node");
            return;
        };
        if g.rrect.rect() == rrect.rect() && g.rrect.radii() == rrect.radii() {
            return;
        }
        g.rrect = rrect;
        self.invalidate_node(id, true);
    }

    /// Replaces the contents of a path geometry.
    pub fn set_path(&mut self, id: NodeId, path: BezPath) {
        let NodeKind::Path(g) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_path on a non-path node");
            return;
        };
        if g.path == path {
            return;
        }
        g.path = path;
        self.invalidate_node(id, true);
    }

    /// Changes the fill rule of a path geometry.
    pub fn set_path_fill_rule(&mut self, id: NodeId, fill_rule: Fill) {
        let NodeKind::Path(g) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_path_fill_rule on a non-path node");
            return;
        };
        if g.fill_rule == fill_rule {
            return;
        }
        g.fill_rule = fill_rule;
        self.invalidate_node(id, true);
    }

    /// Replaces the span of a trim geometry.
    pub fn set_trim(&mut self, id: NodeId, start: f64, end: f64, offset: f64) {
        let start = start.clamp(0.0, 1.0);
        let end = end.clamp(0.0, 1.0);
        let NodeKind::Trim(g) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_trim on a non-trim node");
            return;
        };
        if g.start == start && g.end == end && g.offset == offset {
            return;
        }
        g.start = start;
        g.end = end;
        g.offset = offset;
        self.invalidate_node(id, true);
    }

    /// Replaces the corner radius of a round geometry.
    pub fn set_round_radius(&mut self, id: NodeId, radius: f64) {
        let radius = radius.max(0.0);
        let NodeKind::Round(g) = &mut self.node_mut(id).kind else {
            debug_assert!(false, "set_round_radius on a non-round node");
            return;
        };
        if g.radius == radius {
            return;
        }
        g.radius = radius;
        self.invalidate_node(id, true);
    }

    pub(crate) fn revalidate_merge(
        &mut self,
        m: &mut MergeNode,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        for &child in &m.children {
            self.revalidate(child, ic.as_deref_mut(), ctm);
        }
        let mut merged = BezPath::new();
        for &child in &m.children {
            merged.extend(self.geometry_as_path(child));
        }
        m.merged = merged;

        match m.mode {
            MergeMode::Merge | MergeMode::Union | MergeMode::Xor => m
                .children
                .iter()
                .fold(Rect::ZERO, |acc, &c| util::union_nonempty(acc, self.bounds(c))),
            MergeMode::Intersect => {
                let mut iter = m.children.iter();
                let first = iter.next().map_or(Rect::ZERO, |&c| self.bounds(c));
                iter.fold(first, |acc, &c| util::intersect_or_empty(acc, self.bounds(c)))
            }
            MergeMode::Difference => m.children.first().map_or(Rect::ZERO, |&c| self.bounds(c)),
            MergeMode::ReverseDifference => m.children[1..]
                .iter()
                .fold(Rect::ZERO, |acc, &c| util::union_nonempty(acc, self.bounds(c))),
        }
    }

    pub(crate) fn revalidate_geometry_transform(
        &mut self,
        g: &mut GeometryTransformNode,
        mut ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        self.revalidate(g.transform, ic.as_deref_mut(), ctm);
        let ts = self.transform_value(g.transform);
        self.revalidate(g.child, ic, &ctm.concat(&ts));
        g.path = transform_path(&self.geometry_as_path(g.child), &ts);
        g.path.bounding_box()
    }

    pub(crate) fn revalidate_trim(
        &mut self,
        g: &mut TrimNode,
        ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        self.revalidate(g.child, ic, ctm);
        g.trimmed = trim_path(&self.geometry_as_path(g.child), g.start, g.end, g.offset);
        g.trimmed.bounding_box()
    }

    pub(crate) fn revalidate_round(
        &mut self,
        g: &mut RoundNode,
        ic: Option<&mut InvalidationController>,
        ctm: &Transform,
    ) -> Rect {
        self.revalidate(g.child, ic, ctm);
        g.rounded = round_path(&self.geometry_as_path(g.child), g.radius);
        g.rounded.bounding_box()
    }

    /// Intersects the surface clip with this geometry.
    ///
    /// Panics if `id` is not a geometry node.
    pub fn clip_geometry(&self, id: NodeId, surface: &mut dyn Surface, anti_alias: bool) {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "clip with stale geometry");
        match &node.kind {
            NodeKind::Rect(g) => surface.clip_rect(g.rect, anti_alias),
            NodeKind::RRect(g) => surface.clip_rrect(g.rrect, anti_alias),
            NodeKind::Path(g) => {
                surface.clip_path(&g.path, g.fill_rule, ClipOp::Intersect, anti_alias);
            }
            NodeKind::Plane => surface.clip_rect(util::EVERYTHING, anti_alias),
            NodeKind::Merge(m) => self.clip_merge(m, surface, anti_alias),
            NodeKind::GeometryTransform(g) => surface.clip_path(
                &g.path,
                self.geometry_fill_rule(g.child),
                ClipOp::Intersect,
                anti_alias,
            ),
            NodeKind::Trim(g) => surface.clip_path(
                &g.trimmed,
                self.geometry_fill_rule(g.child),
                ClipOp::Intersect,
                anti_alias,
            ),
            NodeKind::Round(g) => surface.clip_path(
                &g.rounded,
                self.geometry_fill_rule(g.child),
                ClipOp::Intersect,
                anti_alias,
            ),
            _ => panic!("clip_geometry on a non-geometry node"),
        }
    }

    fn clip_merge(&self, m: &MergeNode, surface: &mut dyn Surface, anti_alias: bool) {
        match m.mode {
            MergeMode::Merge | MergeMode::Union => {
                surface.clip_path(&m.merged, Fill::NonZero, ClipOp::Intersect, anti_alias);
            }
            MergeMode::Xor => {
                surface.clip_path(&m.merged, Fill::EvenOdd, ClipOp::Intersect, anti_alias);
            }
            MergeMode::Intersect => {
                for &child in &m.children {
                    self.clip_geometry(child, surface, anti_alias);
                }
            }
            MergeMode::Difference => {
                let (&first, rest) = m.children.split_first().expect("merge of no children");
                self.clip_geometry(first, surface, anti_alias);
                let mut subtract = BezPath::new();
                for &child in rest {
                    subtract.extend(self.geometry_as_path(child));
                }
                surface.clip_path(&subtract, Fill::NonZero, ClipOp::Difference, anti_alias);
            }
            MergeMode::ReverseDifference => {
                let (&first, rest) = m.children.split_first().expect("merge of no children");
                let mut keep = BezPath::new();
                for &child in rest {
                    keep.extend(self.geometry_as_path(child));
                }
                surface.clip_path(&keep, Fill::NonZero, ClipOp::Intersect, anti_alias);
                surface.clip_path(
                    &self.geometry_as_path(first),
                    self.geometry_fill_rule(first),
                    ClipOp::Difference,
                    anti_alias,
                );
            }
        }
    }

    /// Draws this geometry with the given paint.
    ///
    /// Path draws use the geometry's own fill rule. The subtractive merge
    /// modes render as clipped region fills; stroking them is not supported.
    ///
    /// Panics if `id` is not a geometry node.
    pub fn draw_geometry(&self, id: NodeId, surface: &mut dyn Surface, paint: &Paint) {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "draw with stale geometry");
        match &node.kind {
            NodeKind::Rect(g) => surface.draw_rect(g.rect, paint),
            NodeKind::RRect(g) => surface.draw_rrect(g.rrect, paint),
            NodeKind::Path(g) => {
                let mut paint = paint.clone();
                paint.fill_rule = g.fill_rule;
                surface.draw_path(&g.path, &paint);
            }
            NodeKind::Plane => surface.draw_rect(util::EVERYTHING, paint),
            NodeKind::Merge(m) => match m.mode {
                MergeMode::Merge | MergeMode::Union | MergeMode::Xor => {
                    let mut paint = paint.clone();
                    paint.fill_rule = if m.mode == MergeMode::Xor {
                        Fill::EvenOdd
                    } else {
                        Fill::NonZero
                    };
                    surface.draw_path(&m.merged, &paint);
                }
                MergeMode::Intersect | MergeMode::Difference | MergeMode::ReverseDifference => {
                    surface.save();
                    self.clip_merge(m, surface, paint.anti_alias);
                    surface.draw_rect(node.bounds, paint);
                    surface.restore();
                }
            },
            NodeKind::GeometryTransform(g) => {
                let mut paint = paint.clone();
                paint.fill_rule = self.geometry_fill_rule(g.child);
                surface.draw_path(&g.path, &paint);
            }
            NodeKind::Trim(g) => {
                let mut paint = paint.clone();
                paint.fill_rule = self.geometry_fill_rule(g.child);
                surface.draw_path(&g.trimmed, &paint);
            }
            NodeKind::Round(g) => {
                let mut paint = paint.clone();
                paint.fill_rule = self.geometry_fill_rule(g.child);
                surface.draw_path(&g.rounded, &paint);
            }
            _ => panic!("draw_geometry on a non-geometry node"),
        }
    }

    /// Returns `true` if the point is inside the geometry.
    ///
    /// Requires a revalidated node; the cached bounds serve as a cheap
    /// reject before the exact test.
    #[must_use]
    pub fn geometry_contains(&self, id: NodeId, point: Point) -> bool {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "hit test with stale geometry");
        if !node.bounds.contains(point) {
            return false;
        }
        match &node.kind {
            NodeKind::Rect(_) => true,
            NodeKind::RRect(g) => g.rrect.winding(point) != 0,
            NodeKind::Path(g) => winding_hit(g.path.winding(point), g.fill_rule),
            NodeKind::Plane => true,
            NodeKind::Merge(m) => {
                let hit = |&c: &NodeId| self.geometry_contains(c, point);
                match m.mode {
                    MergeMode::Merge | MergeMode::Union => m.children.iter().any(hit),
                    MergeMode::Intersect => m.children.iter().all(hit),
                    MergeMode::Difference => {
                        hit(&m.children[0]) && !m.children[1..].iter().any(hit)
                    }
                    MergeMode::ReverseDifference => {
                        !hit(&m.children[0]) && m.children[1..].iter().any(hit)
                    }
                    MergeMode::Xor => m.children.iter().filter(|c| hit(c)).count() % 2 == 1,
                }
            }
            NodeKind::GeometryTransform(g) => {
                match self.transform_value(g.transform).invert() {
                    Some(inv) => self.geometry_contains(g.child, inv.map_point(point)),
                    // Singular transforms collapse the geometry to nothing.
                    None => false,
                }
            }
            NodeKind::Trim(g) => {
                winding_hit(g.trimmed.winding(point), self.geometry_fill_rule(g.child))
            }
            NodeKind::Round(g) => {
                winding_hit(g.rounded.winding(point), self.geometry_fill_rule(g.child))
            }
            _ => panic!("geometry_contains on a non-geometry node"),
        }
    }

    /// The geometry as a path.
    ///
    /// For merges this is the concatenation of the children; the subtractive
    /// modes are not representable as a single path and callers needing
    /// exact coverage should use [`clip_geometry`](SceneGraph::clip_geometry).
    #[must_use]
    pub fn geometry_as_path(&self, id: NodeId) -> BezPath {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "as_path with stale geometry");
        match &node.kind {
            NodeKind::Rect(g) => g.rect.to_path(PATH_TOLERANCE),
            NodeKind::RRect(g) => g.rrect.to_path(PATH_TOLERANCE),
            NodeKind::Path(g) => g.path.clone(),
            NodeKind::Plane => util::EVERYTHING.to_path(PATH_TOLERANCE),
            NodeKind::Merge(m) => m.merged.clone(),
            NodeKind::GeometryTransform(g) => g.path.clone(),
            NodeKind::Trim(g) => g.trimmed.clone(),
            NodeKind::Round(g) => g.rounded.clone(),
            _ => panic!("geometry_as_path on a non-geometry node"),
        }
    }

    /// The fill rule that defines this geometry's interior when drawn or
    /// clipped as a path.
    pub(crate) fn geometry_fill_rule(&self, id: NodeId) -> Fill {
        match &self.node(id).kind {
            NodeKind::Path(g) => g.fill_rule,
            NodeKind::Merge(m) if m.mode == MergeMode::Xor => Fill::EvenOdd,
            NodeKind::GeometryTransform(g) => self.geometry_fill_rule(g.child),
            NodeKind::Trim(g) => self.geometry_fill_rule(g.child),
            NodeKind::Round(g) => self.geometry_fill_rule(g.child),
            _ => Fill::NonZero,
        }
    }

    /// Conservative containment of a whole rectangle.
    ///
    /// A `true` answer guarantees every point of `rect` is inside the
    /// geometry; `false` makes no claim. Exact for rects, rounded rects
    /// (which are convex), the plane, and unions/intersections thereof.
    pub(crate) fn geometry_contains_rect(&self, id: NodeId, rect: Rect) -> bool {
        let node = self.node(id);
        debug_assert!(!node.has_inval(), "containment query with stale geometry");
        if !util::contains_rect(node.bounds, rect) {
            return false;
        }
        match &node.kind {
            NodeKind::Rect(g) => util::contains_rect(g.rect, rect),
            NodeKind::RRect(g) => {
                // A rounded rect is convex, so corner containment suffices.
                rect_corners(rect).iter().all(|&p| g.rrect.winding(p) != 0)
            }
            NodeKind::Plane => true,
            NodeKind::Merge(m) => match m.mode {
                MergeMode::Merge | MergeMode::Union => m
                    .children
                    .iter()
                    .any(|&c| self.geometry_contains_rect(c, rect)),
                MergeMode::Intersect => m
                    .children
                    .iter()
                    .all(|&c| self.geometry_contains_rect(c, rect)),
                _ => false,
            },
            // Paths and transformed geometry give up rather than risk a
            // wrong `true`.
            _ => false,
        }
    }
}

fn rect_corners(r: Rect) -> [Point; 4] {
    [
        Point::new(r.x0, r.y0),
        Point::new(r.x1, r.y0),
        Point::new(r.x1, r.y1),
        Point::new(r.x0, r.y1),
    ]
}

fn winding_hit(winding: i32, fill_rule: Fill) -> bool {
    match fill_rule {
        Fill::NonZero => winding != 0,
        Fill::EvenOdd => winding % 2 != 0,
    }
}

/// Maps a path through a transform, element by element for the 4×4 case.
fn transform_path(path: &BezPath, ts: &Transform) -> BezPath {
    match ts {
        Transform::Affine(m) => {
            let mut mapped = path.clone();
            mapped.apply_affine(*m);
            mapped
        }
        Transform::Matrix4(_) => path
            .elements()
            .iter()
            .map(|el| match *el {
                PathEl::MoveTo(p) => PathEl::MoveTo(ts.map_point(p)),
                PathEl::LineTo(p) => PathEl::LineTo(ts.map_point(p)),
                PathEl::QuadTo(a, b) => PathEl::QuadTo(ts.map_point(a), ts.map_point(b)),
                PathEl::CurveTo(a, b, c) => {
                    PathEl::CurveTo(ts.map_point(a), ts.map_point(b), ts.map_point(c))
                }
                PathEl::ClosePath => PathEl::ClosePath,
            })
            .collect(),
    }
}

/// Restricts a path to the span `[start, end]` of its total arc length,
/// shifted by `offset`. A span that wraps past the end of the outline
/// continues from its beginning as a separate run.
fn trim_path(path: &BezPath, start: f64, end: f64, offset: f64) -> BezPath {
    let span = (end - start).clamp(0.0, 1.0);
    if span <= 0.0 {
        return BezPath::new();
    }
    if span >= 1.0 {
        return path.clone();
    }
    let segs: Vec<PathSeg> = path.segments().collect();
    let lens: Vec<f64> = segs.iter().map(|s| s.arclen(TRIM_ACCURACY)).collect();
    let total: f64 = lens.iter().sum();
    if total <= 0.0 {
        return BezPath::new();
    }
    let from = (start + offset).rem_euclid(1.0) * total;
    let to = from + span * total;
    let mut trimmed = BezPath::new();
    extract_span(&segs, &lens, from, to.min(total), &mut trimmed);
    if to > total {
        extract_span(&segs, &lens, 0.0, to - total, &mut trimmed);
    }
    trimmed
}

/// Appends the subcurves covering the arc-length interval `[from, to]`.
fn extract_span(segs: &[PathSeg], lens: &[f64], from: f64, to: f64, out: &mut BezPath) {
    let mut acc = 0.0;
    let mut last: Option<Point> = None;
    for (seg, &len) in segs.iter().zip(lens) {
        let (a, b) = (acc, acc + len);
        acc = b;
        if len <= 0.0 || b <= from || a >= to {
            continue;
        }
        let t0 = if from <= a {
            0.0
        } else {
            seg.inv_arclen(from - a, TRIM_ACCURACY)
        };
        let t1 = if to >= b {
            1.0
        } else {
            seg.inv_arclen(to - a, TRIM_ACCURACY)
        };
        let sub = seg.subsegment(t0..t1);
        let first = sub.eval(0.0);
        // A gap means the span crossed a subpath boundary.
        if last.is_none_or(|p| (p - first).hypot() > TRIM_ACCURACY) {
            out.move_to(first);
        }
        match sub {
            PathSeg::Line(l) => out.line_to(l.p1),
            PathSeg::Quad(q) => out.quad_to(q.p1, q.p2),
            PathSeg::Cubic(c) => out.curve_to(c.p1, c.p2, c.p3),
        }
        last = Some(sub.eval(1.0));
    }
}

/// Rounds the corners where two straight edges meet. Subpaths containing
/// curves pass through unchanged.
fn round_path(path: &BezPath, radius: f64) -> BezPath {
    if radius <= 0.0 {
        return path.clone();
    }
    let mut out = BezPath::new();
    let mut sub: Vec<PathEl> = Vec::new();
    for &el in path.elements() {
        if matches!(el, PathEl::MoveTo(_)) && !sub.is_empty() {
            round_subpath(&sub, radius, &mut out);
            sub.clear();
        }
        sub.push(el);
    }
    if !sub.is_empty() {
        round_subpath(&sub, radius, &mut out);
    }
    out
}

fn round_subpath(sub: &[PathEl], radius: f64, out: &mut BezPath) {
    let mut pts: Vec<Point> = Vec::with_capacity(sub.len());
    let mut closed = false;
    for &el in sub {
        match el {
            PathEl::MoveTo(p) | PathEl::LineTo(p) => pts.push(p),
            PathEl::ClosePath => closed = true,
            _ => {
                out.extend(sub.iter().copied());
                return;
            }
        }
    }
    // A closed polyline may spell out its starting point again.
    if closed && pts.len() > 1 && (pts[0] - pts[pts.len() - 1]).hypot() <= TRIM_ACCURACY {
        pts.pop();
    }
    let n = pts.len();
    if n < 3 {
        out.extend(sub.iter().copied());
        return;
    }
    if closed {
        for i in 0..n {
            let (entry, exit) = fillet(pts[(i + n - 1) % n], pts[i], pts[(i + 1) % n], radius);
            if i == 0 {
                out.move_to(entry);
            } else {
                out.line_to(entry);
            }
            out.quad_to(pts[i], exit);
        }
        out.close_path();
    } else {
        out.move_to(pts[0]);
        for i in 1..n - 1 {
            let (entry, exit) = fillet(pts[i - 1], pts[i], pts[i + 1], radius);
            out.line_to(entry);
            out.quad_to(pts[i], exit);
        }
        out.line_to(pts[n - 1]);
    }
}

/// The points where a rounded corner leaves its adjacent edges, each pulled
/// back from the corner by the radius capped at half the edge length.
fn fillet(prev: Point, cur: Point, next: Point, radius: f64) -> (Point, Point) {
    let lp = (prev - cur).hypot();
    let ln = (next - cur).hypot();
    if lp <= 0.0 || ln <= 0.0 {
        return (cur, cur);
    }
    let d_in = radius.min(lp / 2.0);
    let d_out = radius.min(ln / 2.0);
    (
        cur + (prev - cur) * (d_in / lp),
        cur + (next - cur) * (d_out / ln),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SceneGraph;
    use alloc::vec;
    use kurbo::Affine;

    fn revalidated(sg: &mut SceneGraph, id: NodeId) {
        sg.revalidate(id, None, &Transform::IDENTITY);
    }

    #[test]
    fn rect_contains_its_interior_only() {
        let mut sg = SceneGraph::new();
        let g = sg.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        revalidated(&mut sg, g);
        assert!(sg.geometry_contains(g, Point::new(5.0, 5.0)));
        assert!(!sg.geometry_contains(g, Point::new(15.0, 5.0)));
    }

    #[test]
    fn plane_contains_everything() {
        let mut sg = SceneGraph::new();
        let g = sg.add_plane();
        revalidated(&mut sg, g);
        assert!(sg.geometry_contains(g, Point::new(1.0e6, -1.0e6)));
        assert!(sg.geometry_contains_rect(g, Rect::new(-500.0, -500.0, 500.0, 500.0)));
    }

    #[test]
    fn merge_modes_combine_containment() {
        let mut sg = SceneGraph::new();
        let a = sg.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = sg.add_rect(Rect::new(5.0, 0.0, 15.0, 10.0));

        let in_a_only = Point::new(2.0, 5.0);
        let in_both = Point::new(7.0, 5.0);
        let in_b_only = Point::new(12.0, 5.0);

        let union = sg.add_merge(vec![a, b], MergeMode::Union);
        revalidated(&mut sg, union);
        assert!(sg.geometry_contains(union, in_a_only));
        assert!(sg.geometry_contains(union, in_both));
        assert_eq!(sg.bounds(union), Rect::new(0.0, 0.0, 15.0, 10.0));

        let isect = sg.add_merge(vec![a, b], MergeMode::Intersect);
        revalidated(&mut sg, isect);
        assert!(!sg.geometry_contains(isect, in_a_only));
        assert!(sg.geometry_contains(isect, in_both));
        assert_eq!(sg.bounds(isect), Rect::new(5.0, 0.0, 10.0, 10.0));

        let diff = sg.add_merge(vec![a, b], MergeMode::Difference);
        revalidated(&mut sg, diff);
        assert!(sg.geometry_contains(diff, in_a_only));
        assert!(!sg.geometry_contains(diff, in_both));
        assert!(!sg.geometry_contains(diff, in_b_only));

        let rdiff = sg.add_merge(vec![a, b], MergeMode::ReverseDifference);
        revalidated(&mut sg, rdiff);
        assert!(!sg.geometry_contains(rdiff, in_a_only));
        assert!(sg.geometry_contains(rdiff, in_b_only));

        let xor = sg.add_merge(vec![a, b], MergeMode::Xor);
        revalidated(&mut sg, xor);
        assert!(sg.geometry_contains(xor, in_a_only));
        assert!(!sg.geometry_contains(xor, in_both));
        assert!(sg.geometry_contains(xor, in_b_only));
    }

    #[test]
    #[should_panic(expected = "merge of no children")]
    fn empty_merge_is_rejected() {
        let mut sg = SceneGraph::new();
        sg.add_merge(vec![], MergeMode::Union);
    }

    #[test]
    fn merge_tracks_child_mutation() {
        let mut sg = SceneGraph::new();
        let a = sg.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = sg.add_rect(Rect::new(20.0, 0.0, 30.0, 10.0));
        let union = sg.add_merge(vec![a, b], MergeMode::Union);
        revalidated(&mut sg, union);

        sg.set_rect(b, Rect::new(20.0, 0.0, 50.0, 10.0));
        assert!(sg.needs_revalidation(union));
        revalidated(&mut sg, union);
        assert_eq!(sg.bounds(union), Rect::new(0.0, 0.0, 50.0, 10.0));
    }

    #[test]
    fn geometry_transform_maps_path_and_bounds() {
        let mut sg = SceneGraph::new();
        let g = sg.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let t = sg.add_transform(Transform::from(Affine::translate((100.0, 0.0))));
        let gt = sg.add_geometry_transform(g, t);
        revalidated(&mut sg, gt);
        assert_eq!(sg.bounds(gt), Rect::new(100.0, 0.0, 110.0, 10.0));
        assert!(sg.geometry_contains(gt, Point::new(105.0, 5.0)));
        assert!(!sg.geometry_contains(gt, Point::new(5.0, 5.0)));
    }

    #[test]
    fn rrect_rect_containment_respects_corners() {
        let mut sg = SceneGraph::new();
        let g = sg.add_rrect(RoundedRect::new(0.0, 0.0, 100.0, 100.0, 20.0));
        revalidated(&mut sg, g);
        // Well inside, clear of the corner radii.
        assert!(sg.geometry_contains_rect(g, Rect::new(20.0, 20.0, 80.0, 80.0)));
        // Touches the cut corner.
        assert!(!sg.geometry_contains_rect(g, Rect::new(0.0, 0.0, 50.0, 50.0)));
    }

    #[test]
    fn trim_restricts_to_a_span() {
        let mut sg = SceneGraph::new();
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((40.0, 0.0));
        let g = sg.add_path(path);
        let trim = sg.add_trim(g, 0.25, 0.75, 0.0);
        revalidated(&mut sg, trim);
        // Endpoints come out of arc-length root finding, so compare within
        // the trim accuracy.
        let b = sg.bounds(trim);
        assert!((b.x0 - 10.0).abs() < 1.0e-3, "span start: {b:?}");
        assert!((b.x1 - 30.0).abs() < 1.0e-3, "span end: {b:?}");
    }

    #[test]
    fn trim_offset_shifts_and_wraps() {
        let mut sg = SceneGraph::new();
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((40.0, 0.0));
        let g = sg.add_path(path);
        let trim = sg.add_trim(g, 0.9, 1.0, 0.2);
        revalidated(&mut sg, trim);
        // 0.9 + 0.2 wraps to 0.1 of the way along the line.
        let b = sg.bounds(trim);
        assert!((b.x0 - 4.0).abs() < 1.0e-3, "span start: {b:?}");
        assert!((b.x1 - 8.0).abs() < 1.0e-3, "span end: {b:?}");
    }

    #[test]
    fn trim_tracks_span_mutation() {
        let mut sg = SceneGraph::new();
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((40.0, 0.0));
        let g = sg.add_path(path);
        let trim = sg.add_trim(g, 0.0, 1.0, 0.0);
        revalidated(&mut sg, trim);
        assert_eq!(sg.bounds(trim), Rect::new(0.0, 0.0, 40.0, 0.0));

        sg.set_trim(trim, 0.0, 0.5, 0.0);
        assert!(sg.needs_revalidation(trim));
        revalidated(&mut sg, trim);
        let b = sg.bounds(trim);
        assert_eq!(b.x0, 0.0);
        assert!((b.x1 - 20.0).abs() < 1.0e-3, "span end: {b:?}");

        sg.set_trim(trim, 0.5, 0.5, 0.0);
        revalidated(&mut sg, trim);
        assert!(sg.geometry_as_path(trim).elements().is_empty());
    }

    #[test]
    fn round_cuts_polygon_corners() {
        let mut sg = SceneGraph::new();
        let g = sg.add_path(Rect::new(0.0, 0.0, 100.0, 100.0).to_path(PATH_TOLERANCE));
        let round = sg.add_round(g, 10.0);
        revalidated(&mut sg, round);
        assert_eq!(sg.bounds(round), Rect::new(0.0, 0.0, 100.0, 100.0));
        // The corner itself is cut away; edge midpoints and the interior
        // stay covered.
        assert!(!sg.geometry_contains(round, Point::new(1.0, 1.0)));
        assert!(sg.geometry_contains(round, Point::new(50.0, 1.0)));
        assert!(sg.geometry_contains(round, Point::new(50.0, 50.0)));

        sg.set_round_radius(round, 0.0);
        revalidated(&mut sg, round);
        assert!(sg.geometry_contains(round, Point::new(1.0, 1.0)));
    }

    #[test]
    fn path_fill_rule_affects_containment() {
        let mut sg = SceneGraph::new();
        // Two concentric same-direction squares: non-zero fills the whole
        // outer square, even-odd leaves a hole.
        let mut path = BezPath::new();
        path.extend(Rect::new(0.0, 0.0, 100.0, 100.0).to_path(PATH_TOLERANCE));
        path.extend(Rect::new(25.0, 25.0, 75.0, 75.0).to_path(PATH_TOLERANCE));
        let g = sg.add_path(path);
        revalidated(&mut sg, g);
        let center = Point::new(50.0, 50.0);
        assert!(sg.geometry_contains(g, center));

        sg.set_path_fill_rule(g, Fill::EvenOdd);
        revalidated(&mut sg, g);
        assert!(!sg.geometry_contains(g, center));
        assert!(sg.geometry_contains(g, Point::new(10.0, 50.0)));
    }
}
