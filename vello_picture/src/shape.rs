// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shapes: geometry whose outline is produced on demand.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::geometry::Path;
use crate::kurbo::{BezPath, Rect, Stroke};

/// Produces the outline of a shape.
pub trait ShapeProvider: Send + Sync {
    /// The filled outline.
    fn path(&self) -> Path;

    /// Conservative bounds of the outline. Defaults to the bounds of [`path`](Self::path).
    fn bounds(&self) -> Rect {
        self.path().bounds()
    }
}

struct PathProvider(Path);

impl ShapeProvider for PathProvider {
    fn path(&self) -> Path {
        self.0.clone()
    }
}

struct StrokedProvider {
    source: Path,
    stroke: Stroke,
    outline: OnceLock<Path>,
}

impl ShapeProvider for StrokedProvider {
    fn path(&self) -> Path {
        self.outline
            .get_or_init(|| self.source.stroked(&self.stroke))
            .clone()
    }

    fn bounds(&self) -> Rect {
        crate::geometry::stroke_bounds(&self.source.outline_bounds(), &self.stroke)
    }
}

/// A shared handle to a shape.
#[derive(Clone)]
pub struct Shape(Arc<dyn ShapeProvider>);

impl Shape {
    /// Wrap a provider.
    pub fn new(provider: Arc<dyn ShapeProvider>) -> Self {
        Self(provider)
    }

    /// A shape with a fixed outline.
    pub fn from_path(path: Path) -> Self {
        Self(Arc::new(PathProvider(path)))
    }

    /// The area covered by stroking `path`, produced when first needed.
    pub fn stroked(path: Path, stroke: Stroke) -> Self {
        Self(Arc::new(StrokedProvider {
            source: path,
            stroke,
            outline: OnceLock::new(),
        }))
    }

    /// The filled outline.
    pub fn path(&self) -> Path {
        self.0.path()
    }

    /// Conservative bounds. Inverse-filled shapes are unbounded.
    pub fn bounds(&self) -> Rect {
        self.0.bounds()
    }

    /// Returns `true` if the shape fills everything outside its outline.
    pub fn is_inverse_fill(&self) -> bool {
        self.0.path().is_inverse_fill()
    }

    /// Returns `true` if both handles share one provider.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Path> for Shape {
    fn from(path: Path) -> Self {
        Self::from_path(path)
    }
}

impl From<BezPath> for Shape {
    fn from(path: BezPath) -> Self {
        Self::from_path(path.into())
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shape").field(&self.bounds()).finish()
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
