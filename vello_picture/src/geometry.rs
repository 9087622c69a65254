// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paths with fill rules and a few rectangle helpers shared by the draw contexts.

use crate::kurbo::{
    Affine, BezPath, PathEl, Point, Rect, RoundedRect, Shape as _, Stroke, StrokeOpts,
};
use crate::peniko::Fill;

/// Tolerance used when flattening primitives into outlines.
pub const PATH_TOLERANCE: f64 = 0.1;

/// The bounds of an unbounded region, such as an inverse-filled path.
pub const INFINITE_RECT: Rect = Rect {
    x0: f64::NEG_INFINITY,
    y0: f64::NEG_INFINITY,
    x1: f64::INFINITY,
    y1: f64::INFINITY,
};

/// Returns `true` if the rectangle covers no area.
#[inline]
pub fn rect_is_empty(rect: &Rect) -> bool {
    !(rect.x0 < rect.x1 && rect.y0 < rect.y1)
}

/// Returns `true` if all edges of the rectangle are finite.
#[inline]
pub fn rect_is_finite(rect: &Rect) -> bool {
    rect.x0.is_finite() && rect.y0.is_finite() && rect.x1.is_finite() && rect.y1.is_finite()
}

/// Returns `true` if `outer` fully contains `inner`.
#[inline]
pub fn rect_contains_rect(outer: &Rect, inner: &Rect) -> bool {
    !rect_is_empty(inner)
        && outer.x0 <= inner.x0
        && outer.y0 <= inner.y0
        && outer.x1 >= inner.x1
        && outer.y1 >= inner.y1
}

/// Returns `true` if every edge of the rectangle lies on an integer coordinate.
#[inline]
pub fn rect_is_integral(rect: &Rect) -> bool {
    [rect.x0, rect.y0, rect.x1, rect.y1]
        .iter()
        .all(|v| v.fract() == 0.0)
}

/// Half-open point containment that also accepts unbounded rectangles.
#[inline]
pub fn rect_contains_point(rect: &Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x < rect.x1 && point.y >= rect.y0 && point.y < rect.y1
}

/// Returns `true` if the transform maps axis-aligned rectangles to axis-aligned rectangles.
pub fn preserves_axis_alignment(matrix: &Affine) -> bool {
    let [a, b, c, d, _, _] = matrix.as_coeffs();
    (b == 0.0 && c == 0.0) || (a == 0.0 && d == 0.0)
}

/// Returns the translation if the transform is a pure translation.
pub fn translate_only(matrix: &Affine) -> Option<Point> {
    let [a, b, c, d, e, f] = matrix.as_coeffs();
    (a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0).then_some(Point::new(e, f))
}

/// Maps a rectangle through a transform, keeping unbounded rectangles unbounded.
pub fn map_rect(matrix: &Affine, rect: &Rect) -> Rect {
    if !rect_is_finite(rect) {
        return INFINITE_RECT;
    }
    matrix.transform_rect_bbox(*rect)
}

/// The distance a stroke extends beyond the outline it strokes.
pub fn stroke_outset(stroke: &Stroke) -> f64 {
    let half = stroke.width * 0.5;
    match stroke.join {
        crate::kurbo::Join::Miter => half * stroke.miter_limit.max(1.0),
        _ => half,
    }
}

/// Outsets local bounds by the area covered by a stroke.
pub fn stroke_bounds(bounds: &Rect, stroke: &Stroke) -> Rect {
    let outset = stroke_outset(stroke);
    bounds.inflate(outset, outset)
}

/// A vector path with a fill rule and an optional inverse fill.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    outline: BezPath,
    fill: Fill,
    inverse: bool,
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

impl Path {
    /// Create an empty, non-zero filled path.
    pub fn new() -> Self {
        Self {
            outline: BezPath::new(),
            fill: Fill::NonZero,
            inverse: false,
        }
    }

    /// Create a non-zero filled path from an outline.
    pub fn from_bez(outline: BezPath) -> Self {
        Self {
            outline,
            fill: Fill::NonZero,
            inverse: false,
        }
    }

    /// Create a path tracing the rectangle clockwise.
    pub fn from_rect(rect: &Rect) -> Self {
        let mut outline = BezPath::new();
        outline.move_to((rect.x0, rect.y0));
        outline.line_to((rect.x1, rect.y0));
        outline.line_to((rect.x1, rect.y1));
        outline.line_to((rect.x0, rect.y1));
        outline.close_path();
        Self::from_bez(outline)
    }

    /// Create a path from a rounded rectangle.
    pub fn from_rrect(rrect: &RoundedRect) -> Self {
        Self::from_bez(rrect.to_path(PATH_TOLERANCE))
    }

    /// The underlying outline.
    pub fn outline(&self) -> &BezPath {
        &self.outline
    }

    /// Mutable access to the underlying outline.
    pub fn outline_mut(&mut self) -> &mut BezPath {
        &mut self.outline
    }

    /// The fill rule.
    pub fn fill_rule(&self) -> Fill {
        self.fill
    }

    /// Set the fill rule.
    pub fn set_fill_rule(&mut self, fill: Fill) {
        self.fill = fill;
    }

    /// Returns `true` if the path fills everything outside its outline.
    pub fn is_inverse_fill(&self) -> bool {
        self.inverse
    }

    /// Set whether the path fills everything outside its outline.
    pub fn set_inverse_fill(&mut self, inverse: bool) {
        self.inverse = inverse;
    }

    /// Flip between normal and inverse fill.
    pub fn toggle_inverse_fill(&mut self) {
        self.inverse = !self.inverse;
    }

    /// Returns `true` if the outline has no segments.
    pub fn is_empty(&self) -> bool {
        self.outline.elements().is_empty()
    }

    /// Append a rectangle contour.
    pub fn add_rect(&mut self, rect: &Rect) {
        self.outline.extend(Self::from_rect(rect).outline);
    }

    /// Append another outline.
    pub fn add_path(&mut self, other: &BezPath) {
        self.outline.extend(other.iter());
    }

    /// Bounds of the filled area. Inverse-filled paths are unbounded.
    pub fn bounds(&self) -> Rect {
        if self.inverse {
            return INFINITE_RECT;
        }
        self.outline_bounds()
    }

    /// Bounds of the outline, ignoring inverse fill.
    pub fn outline_bounds(&self) -> Rect {
        if self.is_empty() {
            return Rect::ZERO;
        }
        self.outline.bounding_box()
    }

    /// Returns `true` if the point lies in the filled area.
    pub fn contains(&self, point: Point) -> bool {
        let winding = if self.is_empty() {
            0
        } else {
            self.outline.winding(point)
        };
        let inside = match self.fill {
            Fill::NonZero => winding != 0,
            Fill::EvenOdd => winding % 2 != 0,
        };
        inside != self.inverse
    }

    /// Returns a copy of the path mapped through `matrix`.
    pub fn transformed(&self, matrix: &Affine) -> Self {
        let mut result = self.clone();
        result.transform(matrix);
        result
    }

    /// Map the path through `matrix` in place.
    pub fn transform(&mut self, matrix: &Affine) {
        if *matrix != Affine::IDENTITY {
            self.outline.apply_affine(*matrix);
        }
    }

    /// Signed area of the outline. Positive for clockwise contours in a y-down space.
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.outline.area()
    }

    /// Returns the rectangle if the path is a single closed axis-aligned rectangle.
    pub fn as_rect(&self) -> Option<Rect> {
        if self.inverse {
            return None;
        }
        let elements = self.outline.elements();
        let mut points: smallvec::SmallVec<[Point; 5]> = smallvec::SmallVec::new();
        for (i, el) in elements.iter().enumerate() {
            match (i, el) {
                (0, PathEl::MoveTo(p)) => points.push(*p),
                (_, PathEl::LineTo(p)) if i > 0 => points.push(*p),
                (_, PathEl::ClosePath) if i == elements.len() - 1 => {}
                _ => return None,
            }
        }
        if points.len() == 5 && points[4] == points[0] {
            points.pop();
        }
        if points.len() != 4 {
            return None;
        }
        let bounds = Rect::from_points(points[0], points[2]);
        let alternating = |horizontal_first: bool| {
            (0..4).all(|i| {
                let a = points[i];
                let b = points[(i + 1) % 4];
                if (i % 2 == 0) == horizontal_first {
                    a.y == b.y && a.x != b.x
                } else {
                    a.x == b.x && a.y != b.y
                }
            })
        };
        (alternating(true) || alternating(false)).then_some(bounds)
    }

    /// Returns the path traced in the opposite direction, keeping contours and fill settings.
    pub fn reverse_direction(&self) -> Self {
        let mut reversed = BezPath::new();
        let elements = self.outline.elements();
        let mut start = 0;
        while start < elements.len() {
            let mut end = start + 1;
            while end < elements.len() && !matches!(elements[end], PathEl::MoveTo(_)) {
                end += 1;
            }
            reverse_contour(&elements[start..end], &mut reversed);
            start = end;
        }
        Self {
            outline: reversed,
            fill: self.fill,
            inverse: self.inverse,
        }
    }

    /// The outline covered by stroking this path.
    pub fn stroked(&self, stroke: &Stroke) -> Self {
        let outline = crate::kurbo::stroke(
            self.outline.iter(),
            stroke,
            &StrokeOpts::default(),
            PATH_TOLERANCE,
        );
        Self::from_bez(outline)
    }
}

impl From<BezPath> for Path {
    fn from(outline: BezPath) -> Self {
        Self::from_bez(outline)
    }
}

fn end_point(el: &PathEl) -> Option<Point> {
    match el {
        PathEl::MoveTo(p) | PathEl::LineTo(p) => Some(*p),
        PathEl::QuadTo(_, p) => Some(*p),
        PathEl::CurveTo(_, _, p) => Some(*p),
        PathEl::ClosePath => None,
    }
}

fn reverse_contour(contour: &[PathEl], out: &mut BezPath) {
    let closed = matches!(contour.last(), Some(PathEl::ClosePath));
    let segments = if closed {
        &contour[..contour.len() - 1]
    } else {
        contour
    };
    let Some(last) = segments.iter().rev().find_map(end_point) else {
        return;
    };
    out.move_to(last);
    for i in (1..segments.len()).rev() {
        let Some(prev) = end_point(&segments[i - 1]) else {
            continue;
        };
        match segments[i] {
            PathEl::LineTo(_) => out.line_to(prev),
            PathEl::QuadTo(c, _) => out.quad_to(c, prev),
            PathEl::CurveTo(c1, c2, _) => out.curve_to(c2, c1, prev),
            PathEl::MoveTo(_) | PathEl::ClosePath => {}
        }
    }
    if closed {
        out.close_path();
    }
}
