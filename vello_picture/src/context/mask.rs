// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collapsing simple pictures into one coverage path.

use std::sync::Arc;

use crate::context::{DrawContext, DrawError, DrawResult};
use crate::geometry::{preserves_axis_alignment, rect_is_empty, Path};
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Rect, RoundedRect, Stroke};
use crate::mc_state::McState;
use crate::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::peniko::Fill;
use crate::picture::Picture;
use crate::record::RecordType;
use crate::shape::Shape;

/// Builds the union of opaque fills as a single device space path.
///
/// Contributions are appended as separate contours, each oriented to a positive signed area,
/// so that a non-zero fill of the result covers their union.
#[derive(Debug, Default)]
pub struct MaskContext {
    path: Path,
    everything: bool,
    draws: usize,
    has_even_odd: bool,
}

impl MaskContext {
    /// Create an empty mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mask path. An empty inverse-filled path means the mask covers everything.
    pub fn finish(self) -> Option<Path> {
        if self.everything {
            let mut everything = Path::new();
            everything.set_inverse_fill(true);
            return Some(everything);
        }
        Some(self.path)
    }

    fn check_brush(op: RecordType, brush: &Brush) -> DrawResult {
        if brush.mask_filter.is_some() {
            return Err(DrawError::unsupported(op, "mask filters cannot be part of a mask"));
        }
        if brush.color_filter.is_some() {
            return Err(DrawError::unsupported(op, "color filters cannot be part of a mask"));
        }
        if !brush.is_opaque() {
            return Err(DrawError::unsupported(op, "only opaque draws can be part of a mask"));
        }
        Ok(())
    }

    /// Add a device space rectangle, clipped.
    fn add_rect(&mut self, op: RecordType, rect: Rect, state: &McState) -> DrawResult {
        let rect = if state.clip.is_wide_open() || state.clip.contains_rect(&rect) {
            rect
        } else if let Some(clip) = state.clip.as_rect() {
            rect.intersect(clip)
        } else {
            return Err(DrawError::unsupported(op, "only rectangular clips can be folded"));
        };
        if rect_is_empty(&rect) {
            self.draws += 1;
            return Ok(());
        }
        self.add_device_path(op, Path::from_rect(&rect))
    }

    /// Add a local space path, clipped.
    fn add_path(&mut self, op: RecordType, path: &Path, state: &McState) -> DrawResult {
        if path.is_inverse_fill() {
            return Err(DrawError::unsupported(op, "inverse fills cannot be part of a mask"));
        }
        if let Some(rect) = path.as_rect() {
            if preserves_axis_alignment(&state.matrix) {
                return self.add_rect(op, state.matrix.transform_rect_bbox(rect), state);
            }
        }
        let device = path.transformed(&state.matrix);
        let bounds = device.outline_bounds();
        if !(state.clip.is_wide_open() || state.clip.contains_rect(&bounds)) {
            return Err(DrawError::unsupported(op, "paths can only be folded when unclipped"));
        }
        self.add_device_path(op, device)
    }

    fn add_device_path(&mut self, op: RecordType, path: Path) -> DrawResult {
        let even_odd = path.fill_rule() == Fill::EvenOdd;
        if (self.draws > 0 || self.everything) && (even_odd || self.has_even_odd) {
            return Err(DrawError::unsupported(
                op,
                "several draws can only be merged with non-zero fills",
            ));
        }
        self.draws += 1;
        self.has_even_odd |= even_odd;
        if self.everything {
            return Ok(());
        }
        let oriented = if path.area() < 0.0 {
            path.reverse_direction()
        } else {
            path
        };
        self.path.set_fill_rule(oriented.fill_rule());
        self.path.add_path(oriented.outline());
        Ok(())
    }
}

const MASK_DRAWS_ONLY: &str = "only fills, rects, rounded rects and paths can be part of a mask";

impl DrawContext for MaskContext {
    fn draw_fill(&mut self, state: &McState, brush: &Brush) -> DrawResult {
        let op = RecordType::DrawFill;
        Self::check_brush(op, brush)?;
        if state.clip.is_wide_open() {
            if self.has_even_odd {
                return Err(DrawError::unsupported(
                    op,
                    "several draws can only be merged with non-zero fills",
                ));
            }
            self.everything = true;
            self.draws += 1;
            return Ok(());
        }
        let Some(clip) = state.clip.as_rect() else {
            return Err(DrawError::unsupported(op, "only rectangular clips can be folded"));
        };
        self.add_rect(op, clip, state)
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let op = RecordType::DrawRect;
        Self::check_brush(op, brush)?;
        if stroke.is_some() {
            return Err(DrawError::unsupported(op, "strokes cannot be part of a mask"));
        }
        self.add_path(op, &Path::from_rect(rect), state)
    }

    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let op = RecordType::DrawRRect;
        Self::check_brush(op, brush)?;
        if stroke.is_some() {
            return Err(DrawError::unsupported(op, "strokes cannot be part of a mask"));
        }
        self.add_path(op, &Path::from_rrect(rrect), state)
    }

    fn draw_path(&mut self, path: &Path, state: &McState, brush: &Brush) -> DrawResult {
        let op = RecordType::DrawPath;
        Self::check_brush(op, brush)?;
        self.add_path(op, path, state)
    }

    fn draw_shape(&mut self, _: &Shape, _: &McState, _: &Brush, _: Option<&Stroke>) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawShape, MASK_DRAWS_ONLY))
    }

    fn draw_image(
        &mut self,
        _: &Image,
        _: &SamplingOptions,
        _: &McState,
        _: &Brush,
    ) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawImage, MASK_DRAWS_ONLY))
    }

    fn draw_image_rect(
        &mut self,
        _: &Image,
        _: &Rect,
        _: &SamplingOptions,
        _: &McState,
        _: &Brush,
        _: SrcRectConstraint,
    ) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawImageRect, MASK_DRAWS_ONLY))
    }

    fn draw_image_rect_to_rect(
        &mut self,
        _: &Image,
        _: &Rect,
        _: &Rect,
        _: &SamplingOptions,
        _: &McState,
        _: &Brush,
        _: SrcRectConstraint,
    ) -> DrawResult {
        Err(DrawError::unsupported(
            RecordType::DrawImageRectToRect,
            MASK_DRAWS_ONLY,
        ))
    }

    fn draw_glyph_run_list(
        &mut self,
        _: &GlyphRunList,
        _: &McState,
        _: &Brush,
        _: Option<&Stroke>,
    ) -> DrawResult {
        Err(DrawError::unsupported(
            RecordType::DrawGlyphRunList,
            MASK_DRAWS_ONLY,
        ))
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult {
        picture.playback_into(self, state, None)
    }

    fn draw_layer(
        &mut self,
        _: &Arc<Picture>,
        _: Option<&ImageFilter>,
        _: &McState,
        _: &Brush,
    ) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawLayer, MASK_DRAWS_ONLY))
    }
}
