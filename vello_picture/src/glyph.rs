// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Positioned glyph runs and the typeface interface they are rendered through.

use std::fmt;
use std::sync::Arc;

use crate::geometry::Path;
use crate::kurbo::{Point, Rect};

/// A glyph identifier within a typeface.
pub type GlyphId = u16;

/// Pixel layout of a rasterized glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlyphFormat {
    /// One coverage byte per pixel.
    Alpha8,
    /// Four bytes per pixel, red first.
    Rgba8,
    /// Four bytes per pixel, blue first.
    Bgra8,
}

impl GlyphFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Alpha8 => 1,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }
}

/// A rasterized glyph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Offset from the glyph origin to the left edge of the image.
    pub left: i32,
    /// Offset from the glyph origin to the top edge of the image.
    pub top: i32,
    /// Pixel layout.
    pub format: GlyphFormat,
    /// Tightly packed pixel rows.
    pub pixels: Vec<u8>,
}

impl GlyphImage {
    /// Bytes per row.
    pub fn row_bytes(&self) -> u32 {
        self.width * self.format.bytes_per_pixel()
    }
}

/// Rasterization parameters for a glyph, derived from the font and the draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphRasterParams {
    /// Size in device pixels.
    pub size: f32,
    /// Embolden the outline.
    pub faux_bold: bool,
    /// Slant the outline.
    pub faux_italic: bool,
    /// Stroke width when the glyph is stroked rather than filled.
    pub stroke_width: Option<f32>,
}

/// A source of glyph outlines and bitmaps.
pub trait Typeface: Send + Sync {
    /// A stable identifier for the typeface.
    fn unique_id(&self) -> u64;

    /// Returns `true` if glyphs carry their own colors.
    fn has_color(&self) -> bool {
        false
    }

    /// Bounds of the glyph relative to its origin at `size`.
    fn glyph_bounds(&self, glyph: GlyphId, size: f32) -> Rect;

    /// The outline of the glyph relative to its origin at `size`.
    fn glyph_path(&self, glyph: GlyphId, size: f32) -> Option<Path>;

    /// Rasterize a glyph. `None` if the glyph is empty or cannot be rendered.
    fn rasterize_glyph(&self, glyph: GlyphId, params: &GlyphRasterParams) -> Option<GlyphImage>;
}

/// A typeface at a size.
#[derive(Clone)]
pub struct Font {
    /// The typeface.
    pub typeface: Arc<dyn Typeface>,
    /// Size in pixels per em.
    pub size: f32,
    /// Embolden glyphs.
    pub faux_bold: bool,
    /// Slant glyphs.
    pub faux_italic: bool,
}

impl Font {
    /// A plain font.
    pub fn new(typeface: Arc<dyn Typeface>, size: f32) -> Self {
        Self {
            typeface,
            size,
            faux_bold: false,
            faux_italic: false,
        }
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("typeface", &self.typeface.unique_id())
            .field("size", &self.size)
            .field("faux_bold", &self.faux_bold)
            .field("faux_italic", &self.faux_italic)
            .finish()
    }
}

impl PartialEq for Font {
    fn eq(&self, other: &Self) -> bool {
        self.typeface.unique_id() == other.typeface.unique_id()
            && self.size == other.size
            && self.faux_bold == other.faux_bold
            && self.faux_italic == other.faux_italic
    }
}

/// Glyphs of one font with their origins.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphRun {
    /// The font of every glyph in the run.
    pub font: Font,
    /// Glyph identifiers.
    pub glyphs: Vec<GlyphId>,
    /// Glyph origins, parallel to `glyphs`.
    pub positions: Vec<Point>,
}

impl GlyphRun {
    /// Bounds of the run in its local space.
    pub fn bounds(&self) -> Rect {
        self.glyphs
            .iter()
            .zip(&self.positions)
            .map(|(glyph, origin)| {
                self.font.typeface.glyph_bounds(*glyph, self.font.size) + origin.to_vec2()
            })
            .reduce(|acc, rect| acc.union(rect))
            .unwrap_or(Rect::ZERO)
    }

    /// The combined outlines of the run, if the typeface has outlines for every glyph.
    pub fn path(&self) -> Option<Path> {
        let mut combined = Path::new();
        for (glyph, origin) in self.glyphs.iter().zip(&self.positions) {
            let outline = self.font.typeface.glyph_path(*glyph, self.font.size)?;
            let moved = outline.transformed(&crate::kurbo::Affine::translate(origin.to_vec2()));
            combined.add_path(moved.outline());
        }
        Some(combined)
    }
}

/// A list of glyph runs drawn together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphRunList {
    /// The runs, in drawing order.
    pub runs: Vec<GlyphRun>,
}

impl GlyphRunList {
    /// A list with a single run.
    pub fn from_run(run: GlyphRun) -> Self {
        Self { runs: vec![run] }
    }

    /// Bounds of all runs in local space.
    pub fn bounds(&self) -> Rect {
        self.runs
            .iter()
            .map(GlyphRun::bounds)
            .reduce(|acc, rect| acc.union(rect))
            .unwrap_or(Rect::ZERO)
    }

    /// Total number of glyphs.
    pub fn glyph_count(&self) -> usize {
        self.runs.iter().map(|run| run.glyphs.len()).sum()
    }

    /// Returns `true` if any run uses a color typeface.
    pub fn has_color(&self) -> bool {
        self.runs.iter().any(|run| run.font.typeface.has_color())
    }
}
