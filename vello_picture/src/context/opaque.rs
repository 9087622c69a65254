// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Re-recording draws with opaque, alpha-thresholded brushes.
//!
//! This is the source for shadow and similar effects, which only care about the silhouette of
//! the content. Draws already covered by an earlier fully opaque rectangle are skipped.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::context::{
    image_draw_bounds, primitive_bounds, DrawContext, DrawError, DrawResult, RecordingContext,
};
use crate::geometry::{map_rect, preserves_axis_alignment, rect_contains_rect, rect_is_empty, Path};
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Rect, RoundedRect, Stroke};
use crate::mc_state::McState;
use crate::paint::{Brush, ColorFilter, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::picture::Picture;
use crate::record::RecordType;
use crate::shape::Shape;

const MAX_CONTOUR_BOUNDS: usize = 3;

/// Records draws with brushes forced to full opacity.
///
/// The first unsupported draw latches an error. Later draws are ignored, and
/// [`finish`](Self::finish) reports the error.
#[derive(Debug, Default)]
pub struct OpaqueContext {
    recording: RecordingContext,
    contour_bounds: SmallVec<[Rect; MAX_CONTOUR_BOUNDS]>,
    error: Option<DrawError>,
}

impl OpaqueContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if an unsupported draw was seen.
    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    /// Returns `true` if `bounds` lies inside an area already covered by an opaque draw.
    pub fn contain_contour_bound(&self, bounds: &Rect) -> bool {
        self.contour_bounds
            .iter()
            .any(|covered| rect_contains_rect(covered, bounds))
    }

    /// The opaque rendition of everything drawn, or the first unsupported draw.
    pub fn finish(mut self) -> Result<Option<Arc<Picture>>, DrawError> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self.recording.finish_recording_as_picture()),
        }
    }

    fn add_contour_bound(&mut self, bounds: Rect) {
        if rect_is_empty(&bounds) || self.contain_contour_bound(&bounds) {
            return;
        }
        self.contour_bounds
            .retain(|covered| !rect_contains_rect(&bounds, covered));
        if self.contour_bounds.len() < MAX_CONTOUR_BOUNDS {
            self.contour_bounds.push(bounds);
            return;
        }
        // Replace the smallest cached area if the new rectangle is larger.
        let smallest = self
            .contour_bounds
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.area().total_cmp(&b.area()))
            .map(|(i, rect)| (i, rect.area()));
        if let Some((index, area)) = smallest {
            if bounds.area() > area {
                self.contour_bounds[index] = bounds;
            }
        }
    }

    fn fail(&mut self, op: RecordType, reason: &'static str) -> DrawResult {
        let err = DrawError::unsupported(op, reason);
        log::debug!("opaque conversion aborted: {err}");
        self.error = Some(err.clone());
        Err(err)
    }

    /// Checks a draw before recording it. `Ok(None)` means the draw is skipped.
    fn admit(
        &mut self,
        op: RecordType,
        local_bounds: Option<Rect>,
        state: &McState,
        brush: &Brush,
    ) -> Result<Option<Brush>, DrawError> {
        if self.error.is_some() {
            return Ok(None);
        }
        if brush.mask_filter.is_some() {
            self.fail(op, "mask filters have no opaque rendition")?;
        }
        let device = match local_bounds {
            Some(local) => map_rect(&state.matrix, &local),
            None => state.clip.bounds(),
        };
        if self.contain_contour_bound(&device.intersect(state.clip.bounds())) {
            return Ok(None);
        }
        Ok(Some(opaque_brush(brush)))
    }

    /// Remember an opaque rectangle covering its device bounds.
    fn cover(&mut self, local: Option<Rect>, state: &McState) {
        if !preserves_axis_alignment(&state.matrix) {
            return;
        }
        let clip = if state.clip.is_wide_open() {
            None
        } else if let Some(rect) = state.clip.as_rect() {
            Some(rect)
        } else {
            return;
        };
        let device = match (local, clip) {
            (Some(local), Some(clip)) => map_rect(&state.matrix, &local).intersect(clip),
            (Some(local), None) => map_rect(&state.matrix, &local),
            (None, Some(clip)) => clip,
            (None, None) => return,
        };
        self.add_contour_bound(device);
    }
}

fn opaque_brush(brush: &Brush) -> Brush {
    Brush {
        color: brush.color.with_alpha(1.0),
        shader: brush.shader.clone(),
        blend_mode: Default::default(),
        anti_alias: brush.anti_alias,
        color_filter: ColorFilter::compose_optional(
            Some(ColorFilter::OPAQUE_THRESHOLD),
            brush.color_filter.clone(),
        ),
        mask_filter: None,
    }
}

/// Returns `true` if the brush paints every covered pixel after thresholding.
fn covers_fully(brush: &Brush) -> bool {
    brush.shader.is_none() && brush.color_filter.is_none()
}

impl DrawContext for OpaqueContext {
    fn draw_fill(&mut self, state: &McState, brush: &Brush) -> DrawResult {
        let Some(opaque) = self.admit(RecordType::DrawFill, None, state, brush)? else {
            return Ok(());
        };
        self.recording.draw_fill(state, &opaque)?;
        if covers_fully(brush) {
            self.cover(None, state);
        }
        Ok(())
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let local = primitive_bounds(*rect, stroke);
        let Some(opaque) = self.admit(RecordType::DrawRect, Some(local), state, brush)? else {
            return Ok(());
        };
        self.recording.draw_rect(rect, state, &opaque, stroke)?;
        if stroke.is_none() && covers_fully(brush) {
            self.cover(Some(*rect), state);
        }
        Ok(())
    }

    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let local = primitive_bounds(rrect.rect(), stroke);
        let Some(opaque) = self.admit(RecordType::DrawRRect, Some(local), state, brush)? else {
            return Ok(());
        };
        self.recording.draw_rrect(rrect, state, &opaque, stroke)
    }

    fn draw_path(&mut self, path: &Path, state: &McState, brush: &Brush) -> DrawResult {
        let local = (!path.is_inverse_fill()).then(|| path.outline_bounds());
        let Some(opaque) = self.admit(RecordType::DrawPath, local, state, brush)? else {
            return Ok(());
        };
        self.recording.draw_path(path, state, &opaque)?;
        if let Some(rect) = path.as_rect() {
            if covers_fully(brush) {
                self.cover(Some(rect), state);
            }
        }
        Ok(())
    }

    fn draw_shape(
        &mut self,
        shape: &Shape,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let local = (!shape.is_inverse_fill()).then(|| primitive_bounds(shape.bounds(), stroke));
        let Some(opaque) = self.admit(RecordType::DrawShape, local, state, brush)? else {
            return Ok(());
        };
        self.recording.draw_shape(shape, state, &opaque, stroke)
    }

    fn draw_image(
        &mut self,
        image: &Image,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        let local = image_draw_bounds(image, None, None);
        let Some(opaque) = self.admit(RecordType::DrawImage, Some(local), state, brush)? else {
            return Ok(());
        };
        self.recording.draw_image(image, sampling, state, &opaque)
    }

    fn draw_image_rect(
        &mut self,
        image: &Image,
        rect: &Rect,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        constraint: SrcRectConstraint,
    ) -> DrawResult {
        let local = image_draw_bounds(image, Some(rect), None);
        let Some(opaque) = self.admit(RecordType::DrawImageRect, Some(local), state, brush)?
        else {
            return Ok(());
        };
        self.recording
            .draw_image_rect(image, rect, sampling, state, &opaque, constraint)
    }

    fn draw_image_rect_to_rect(
        &mut self,
        image: &Image,
        src: &Rect,
        dst: &Rect,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        constraint: SrcRectConstraint,
    ) -> DrawResult {
        let local = image_draw_bounds(image, Some(src), Some(dst));
        let op = RecordType::DrawImageRectToRect;
        let Some(opaque) = self.admit(op, Some(local), state, brush)? else {
            return Ok(());
        };
        self.recording
            .draw_image_rect_to_rect(image, src, dst, sampling, state, &opaque, constraint)
    }

    fn draw_glyph_run_list(
        &mut self,
        list: &GlyphRunList,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let local = primitive_bounds(list.bounds(), stroke);
        let op = RecordType::DrawGlyphRunList;
        let Some(opaque) = self.admit(op, Some(local), state, brush)? else {
            return Ok(());
        };
        self.recording
            .draw_glyph_run_list(list, state, &opaque, stroke)
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult {
        if self.error.is_some() {
            return Ok(());
        }
        picture.playback_into(self, state, None)
    }

    fn draw_layer(
        &mut self,
        picture: &Arc<Picture>,
        filter: Option<&ImageFilter>,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        if self.error.is_some() {
            return Ok(());
        }
        if filter.is_some() {
            return self.fail(
                RecordType::DrawLayer,
                "filtered layers have no opaque rendition",
            );
        }
        if brush.mask_filter.is_some() {
            return self.fail(RecordType::DrawLayer, "mask filters have no opaque rendition");
        }
        // After thresholding only the coverage of the content remains.
        picture.playback_into(self, state, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::{MaskFilter, Shader};
    use crate::peniko::Color;
    use crate::record::Record;

    fn translucent() -> Brush {
        Brush::from_color(Color::from_rgba8(0, 0, 255, 64))
    }

    #[test]
    fn brushes_become_opaque() {
        let mut ctx = OpaqueContext::new();
        ctx.draw_rect(&Rect::new(0.0, 0.0, 4.0, 4.0), &McState::new(), &translucent(), None)
            .unwrap();
        let picture = ctx.finish().unwrap().unwrap();
        let brush = picture
            .records()
            .find_map(|record| match record {
                Record::SetBrush(brush) => Some(brush.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(brush.alpha(), 1.0);
        assert_eq!(brush.color_filter, Some(ColorFilter::OPAQUE_THRESHOLD));
    }

    #[test]
    fn covered_draws_are_skipped() {
        let mut ctx = OpaqueContext::new();
        let state = McState::new();
        ctx.draw_rect(&Rect::new(0.0, 0.0, 10.0, 10.0), &state, &Brush::default(), None)
            .unwrap();
        assert!(ctx.contain_contour_bound(&Rect::new(2.0, 2.0, 8.0, 8.0)));
        ctx.draw_rect(&Rect::new(2.0, 2.0, 8.0, 8.0), &state, &translucent(), None)
            .unwrap();
        let picture = ctx.finish().unwrap().unwrap();
        assert_eq!(picture.draw_count(), 1);
    }

    #[test]
    fn contour_cache_keeps_the_largest_three() {
        let mut ctx = OpaqueContext::new();
        for (i, size) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            let x = 100.0 * i as f64;
            ctx.add_contour_bound(Rect::new(x, 0.0, x + size, size));
        }
        assert_eq!(ctx.contour_bounds.len(), MAX_CONTOUR_BOUNDS);
        assert!(!ctx.contain_contour_bound(&Rect::new(0.0, 0.0, 1.0, 1.0)));
        assert!(ctx.contain_contour_bound(&Rect::new(300.0, 0.0, 304.0, 4.0)));
    }

    #[test]
    fn mask_filters_abort_and_latch() {
        let mut ctx = OpaqueContext::new();
        let mut brush = Brush::default();
        brush.mask_filter = Some(MaskFilter {
            shader: Shader::Color(Color::BLACK),
            inverted: false,
        });
        let state = McState::new();
        assert!(ctx.draw_fill(&state, &brush).is_err());
        assert!(ctx.is_aborted());
        // Later draws are ignored.
        assert!(ctx
            .draw_rect(&Rect::new(0.0, 0.0, 1.0, 1.0), &state, &Brush::default(), None)
            .is_ok());
        assert!(matches!(
            ctx.finish(),
            Err(DrawError::Unsupported {
                op: RecordType::DrawFill,
                ..
            })
        ));
    }

    #[test]
    fn filtered_layers_are_unsupported() {
        let mut inner = OpaqueContext::new();
        inner
            .draw_rect(&Rect::new(0.0, 0.0, 1.0, 1.0), &McState::new(), &Brush::default(), None)
            .unwrap();
        let content = inner.finish().unwrap().unwrap();
        let mut ctx = OpaqueContext::new();
        let blur = ImageFilter::Blur {
            sigma_x: 1.0,
            sigma_y: 1.0,
        };
        let result = ctx.draw_layer(&content, Some(&blur), &McState::new(), &Brush::default());
        assert!(result.is_err());
        assert!(ctx.finish().is_err());
    }
}
