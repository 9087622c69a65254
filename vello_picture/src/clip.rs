// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device space clip regions.

use smallvec::SmallVec;

use crate::geometry::{
    map_rect, preserves_axis_alignment, rect_contains_point, rect_contains_rect, rect_is_empty,
    rect_is_finite, Path, INFINITE_RECT,
};
use crate::kurbo::{Affine, Point, Rect};

/// One operand of a clip intersection.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipElement {
    /// An axis-aligned rectangle.
    Rect(Rect),
    /// An arbitrary path.
    Path(Path),
}

impl ClipElement {
    fn bounds(&self) -> Rect {
        match self {
            Self::Rect(rect) => *rect,
            Self::Path(path) => path.bounds(),
        }
    }

    fn contains(&self, point: Point) -> bool {
        match self {
            Self::Rect(rect) => rect_contains_point(rect, point),
            Self::Path(path) => path.contains(point),
        }
    }

    fn transformed(&self, matrix: &Affine) -> Self {
        match self {
            Self::Rect(rect) if preserves_axis_alignment(matrix) => {
                Self::Rect(map_rect(matrix, rect))
            }
            Self::Rect(rect) => Self::Path(Path::from_rect(rect).transformed(matrix)),
            Self::Path(path) => Self::Path(path.transformed(matrix)),
        }
    }
}

/// A clip region: the intersection of its elements.
///
/// A clip without elements is wide open and covers the whole plane, which is the same region as
/// an empty path with inverse fill.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Clip {
    elements: SmallVec<[ClipElement; 1]>,
}

impl Clip {
    /// The clip that covers everything.
    pub fn wide_open() -> Self {
        Self::default()
    }

    /// A rectangular clip.
    pub fn from_rect(rect: Rect) -> Self {
        let mut clip = Self::wide_open();
        clip.intersect_rect(rect);
        clip
    }

    /// A clip from a path. Rectangular paths collapse to rectangle elements.
    pub fn from_path(path: Path) -> Self {
        let mut clip = Self::wide_open();
        clip.intersect_path(path);
        clip
    }

    /// The elements being intersected.
    pub fn elements(&self) -> &[ClipElement] {
        &self.elements
    }

    /// Intersect with a rectangle.
    pub fn intersect_rect(&mut self, rect: Rect) {
        for element in &mut self.elements {
            if let ClipElement::Rect(existing) = element {
                *existing = existing.intersect(rect);
                return;
            }
        }
        self.elements.push(ClipElement::Rect(rect));
    }

    /// Intersect with a path.
    pub fn intersect_path(&mut self, path: Path) {
        if let Some(rect) = path.as_rect() {
            self.intersect_rect(rect);
        } else if path.is_inverse_fill() && path.is_empty() {
            // Intersecting with everything.
        } else {
            self.elements.push(ClipElement::Path(path));
        }
    }

    /// Intersect with another clip.
    pub fn intersect(&mut self, other: &Self) {
        for element in &other.elements {
            match element {
                ClipElement::Rect(rect) => self.intersect_rect(*rect),
                ClipElement::Path(path) => self.intersect_path(path.clone()),
            }
        }
    }

    /// Returns the clip mapped through `matrix`.
    pub fn transform(&self, matrix: &Affine) -> Self {
        if *matrix == Affine::IDENTITY {
            return self.clone();
        }
        let mut clip = Self::wide_open();
        for element in &self.elements {
            match element.transformed(matrix) {
                ClipElement::Rect(rect) => clip.intersect_rect(rect),
                ClipElement::Path(path) => clip.intersect_path(path),
            }
        }
        clip
    }

    /// Conservative bounds of the region. Unbounded clips return [`INFINITE_RECT`].
    pub fn bounds(&self) -> Rect {
        self.elements
            .iter()
            .fold(INFINITE_RECT, |acc, element| acc.intersect(element.bounds()))
    }

    /// Returns `true` if the clip has no elements.
    pub fn is_wide_open(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns `true` if the region is unbounded.
    pub fn is_inverse_fill(&self) -> bool {
        !rect_is_finite(&self.bounds())
    }

    /// Returns `true` if the region covers no area.
    pub fn is_empty(&self) -> bool {
        rect_is_empty(&self.bounds())
    }

    /// Returns the rectangle if the clip is a single rectangle.
    pub fn as_rect(&self) -> Option<Rect> {
        match self.elements.as_slice() {
            [ClipElement::Rect(rect)] => Some(*rect),
            _ => None,
        }
    }

    /// Returns `true` if the region contains the whole rectangle.
    pub fn contains_rect(&self, rect: &Rect) -> bool {
        self.elements.iter().all(|element| match element {
            ClipElement::Rect(clip) => rect_contains_rect(clip, rect),
            ClipElement::Path(_) => false,
        })
    }

    /// Returns `true` if the point lies inside every element.
    pub fn contains(&self, point: Point) -> bool {
        self.elements.iter().all(|element| element.contains(point))
    }

    /// The clip as a single path, or `None` if it is an intersection of several elements.
    pub fn to_path(&self) -> Option<Path> {
        match self.elements.as_slice() {
            [] => {
                let mut path = Path::new();
                path.set_inverse_fill(true);
                Some(path)
            }
            [ClipElement::Rect(rect)] => Some(Path::from_rect(rect)),
            [ClipElement::Path(path)] => Some(path.clone()),
            _ => None,
        }
    }
}
