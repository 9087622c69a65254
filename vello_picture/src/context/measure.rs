// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Accumulating device space bounds.

use std::sync::Arc;

use crate::context::{image_draw_bounds, primitive_bounds, DrawContext, DrawResult};
use crate::geometry::{map_rect, preserves_axis_alignment, rect_is_empty, Path};
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Rect, RoundedRect, Stroke};
use crate::mc_state::McState;
use crate::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::picture::Picture;
use crate::shape::Shape;

/// Computes the union of the device space bounds of every draw, clipped.
///
/// In fast mode local bounds are mapped through the matrix. In tight mode outlines are
/// transformed first, which is exact for rotated or skewed geometry.
#[derive(Debug)]
pub struct MeasureContext {
    tight: bool,
    bounds: Option<Rect>,
}

impl MeasureContext {
    /// Create a context. `tight` selects outline based bounds.
    pub fn new(tight: bool) -> Self {
        Self {
            tight,
            bounds: None,
        }
    }

    /// The accumulated bounds, or [`Rect::ZERO`] if nothing visible was drawn.
    pub fn bounds(&self) -> Rect {
        self.bounds.unwrap_or(Rect::ZERO)
    }

    fn accumulate(&mut self, device: Rect, state: &McState) {
        let clipped = device.intersect(state.clip.bounds());
        if rect_is_empty(&clipped) {
            return;
        }
        self.bounds = Some(match self.bounds {
            Some(bounds) => bounds.union(clipped),
            None => clipped,
        });
    }

    fn add_local_rect(&mut self, rect: Rect, state: &McState, stroke: Option<&Stroke>) {
        if self.tight && !preserves_axis_alignment(&state.matrix) {
            self.add_outline(&Path::from_rect(&rect), state, stroke);
        } else {
            let local = primitive_bounds(rect, stroke);
            self.accumulate(map_rect(&state.matrix, &local), state);
        }
    }

    fn add_outline(&mut self, path: &Path, state: &McState, stroke: Option<&Stroke>) {
        if path.is_inverse_fill() {
            self.accumulate(state.clip.bounds(), state);
            return;
        }
        if !self.tight {
            let local = primitive_bounds(path.outline_bounds(), stroke);
            self.accumulate(map_rect(&state.matrix, &local), state);
            return;
        }
        let outline = match stroke {
            Some(stroke) => path.stroked(stroke),
            None => path.clone(),
        };
        if outline.is_empty() {
            return;
        }
        self.accumulate(outline.transformed(&state.matrix).outline_bounds(), state);
    }
}

impl DrawContext for MeasureContext {
    fn draw_fill(&mut self, state: &McState, _: &Brush) -> DrawResult {
        self.accumulate(state.clip.bounds(), state);
        Ok(())
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        _: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.add_local_rect(*rect, state, stroke);
        Ok(())
    }

    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        _: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        if self.tight {
            self.add_outline(&Path::from_rrect(rrect), state, stroke);
        } else {
            self.add_local_rect(rrect.rect(), state, stroke);
        }
        Ok(())
    }

    fn draw_path(&mut self, path: &Path, state: &McState, _: &Brush) -> DrawResult {
        self.add_outline(path, state, None);
        Ok(())
    }

    fn draw_shape(
        &mut self,
        shape: &Shape,
        state: &McState,
        _: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        if self.tight || shape.is_inverse_fill() {
            self.add_outline(&shape.path(), state, stroke);
        } else {
            let local = primitive_bounds(shape.bounds(), stroke);
            self.accumulate(map_rect(&state.matrix, &local), state);
        }
        Ok(())
    }

    fn draw_image(
        &mut self,
        image: &Image,
        _: &SamplingOptions,
        state: &McState,
        _: &Brush,
    ) -> DrawResult {
        self.add_local_rect(image_draw_bounds(image, None, None), state, None);
        Ok(())
    }

    fn draw_image_rect(
        &mut self,
        image: &Image,
        rect: &Rect,
        _: &SamplingOptions,
        state: &McState,
        _: &Brush,
        _: SrcRectConstraint,
    ) -> DrawResult {
        self.add_local_rect(image_draw_bounds(image, Some(rect), None), state, None);
        Ok(())
    }

    fn draw_image_rect_to_rect(
        &mut self,
        image: &Image,
        src: &Rect,
        dst: &Rect,
        _: &SamplingOptions,
        state: &McState,
        _: &Brush,
        _: SrcRectConstraint,
    ) -> DrawResult {
        self.add_local_rect(image_draw_bounds(image, Some(src), Some(dst)), state, None);
        Ok(())
    }

    fn draw_glyph_run_list(
        &mut self,
        list: &GlyphRunList,
        state: &McState,
        _: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let bounds = list.bounds();
        if !rect_is_empty(&bounds) {
            self.add_local_rect(bounds, state, stroke);
        }
        Ok(())
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult {
        picture.playback_into(self, state, None)
    }

    fn draw_layer(
        &mut self,
        picture: &Arc<Picture>,
        filter: Option<&ImageFilter>,
        state: &McState,
        _: &Brush,
    ) -> DrawResult {
        let mut content = Self::new(self.tight);
        picture.playback_into(&mut content, state, None)?;
        let Some(mut bounds) = content.bounds else {
            return Ok(());
        };
        if let Some(filter) = filter {
            bounds = filter.filter_bounds(bounds);
        }
        self.accumulate(bounds, state);
        Ok(())
    }
}
