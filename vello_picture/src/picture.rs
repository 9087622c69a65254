// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable recorded pictures.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::arena::{BlockArena, RecordHandle};
use crate::canvas::Canvas;
use crate::clip::Clip;
use crate::context::{
    DrawContext, DrawError, DrawResult, HitTestContext, MaskContext, MeasureContext,
    RecordingContext,
};
use crate::geometry::{
    rect_contains_rect, rect_is_empty, rect_is_integral, translate_only, Path,
};
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Affine, Point, Rect, RoundedRect, Size, Stroke};
use crate::mc_state::McState;
use crate::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::playback::{play_records, AbortCallback};
use crate::record::{Record, RecordType};
use crate::shape::Shape;

/// An immutable list of drawing records.
///
/// Pictures are shared as `Arc<Picture>` and may be played back from any thread. Bounds are
/// computed on first request. Concurrent first requests each compute the bounds and race to
/// publish them; every caller observes the single published value.
pub struct Picture {
    records: Vec<RecordHandle>,
    arena: BlockArena<Record>,
    draw_count: usize,
    has_unbounded_fill: bool,
    bounds: OnceLock<Rect>,
}

impl Picture {
    /// Take ownership of recorded records. `records` lists the arena handles in command order.
    pub(crate) fn new(arena: BlockArena<Record>, records: Vec<RecordHandle>) -> Self {
        let mut draw_count = 0;
        let mut has_unbounded_fill = false;
        let mut has_inverse_clip = true;
        for handle in &records {
            let record = &arena[*handle];
            if record.is_draw() {
                draw_count += 1;
            }
            has_unbounded_fill |= record.has_unbounded_fill(&mut has_inverse_clip);
        }
        Self {
            records,
            arena,
            draw_count,
            has_unbounded_fill,
            bounds: OnceLock::new(),
        }
    }

    /// The records in command order.
    pub fn records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().map(|handle| &self.arena[*handle])
    }

    /// The kinds of the records in command order.
    pub fn record_types(&self) -> impl Iterator<Item = RecordType> + '_ {
        self.records().map(Record::record_type)
    }

    /// Number of records, including set-state records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of draw records.
    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    /// Returns `true` if any draw covers an unbounded area.
    pub fn has_unbounded_fill(&self) -> bool {
        self.has_unbounded_fill
    }

    /// Device space bounds of the content when played back with the identity matrix.
    pub fn bounds(&self) -> Rect {
        if let Some(bounds) = self.bounds.get() {
            return *bounds;
        }
        let computed = self.compute_bounds(&Affine::IDENTITY, false);
        // Losing the race drops our value in favour of the published one.
        let _ = self.bounds.set(computed);
        self.bounds.get().copied().unwrap_or(computed)
    }

    /// Bounds of the content under `matrix`, without caching. `tight` measures transformed
    /// outlines instead of transformed local bounds.
    pub fn compute_bounds(&self, matrix: &Affine, tight: bool) -> Rect {
        let mut measure = MeasureContext::new(tight);
        let base = McState::with(*matrix, Clip::wide_open());
        if let Err(err) = self.playback_into(&mut measure, &base, None) {
            log::debug!("measuring picture stopped early: {err}");
        }
        measure.bounds()
    }

    /// Play the picture into the current target of `canvas` under its matrix and clip.
    pub fn playback(&self, canvas: &mut Canvas<'_>, abort: Option<&mut dyn AbortCallback>) {
        canvas.playback_picture(self, abort);
    }

    /// Play the picture into `ctx` under `base`.
    pub fn playback_into(
        &self,
        ctx: &mut dyn DrawContext,
        base: &McState,
        abort: Option<&mut dyn AbortCallback>,
    ) -> DrawResult {
        play_records(self.records(), ctx, base, abort)
    }

    /// Returns the image drawn by a picture that consists of one plain image draw.
    ///
    /// `matrix` is applied on top of the recorded matrix, and `clip_size` restricts the result
    /// to a device viewport starting at the origin. The returned point is the device position
    /// of the image's top left corner. `None` means the picture must be rendered normally.
    pub fn as_image(&self, matrix: &Affine, clip_size: Option<Size>) -> Option<(Image, Point)> {
        if self.draw_count != 1 {
            return None;
        }
        let mut probe = SingleImageContext::default();
        self.playback_into(&mut probe, &McState::with(*matrix, Clip::wide_open()), None)
            .ok()?;
        let draw = probe.draw?;

        let offset = translate_only(&draw.matrix)?;
        let device_dst = draw.dst + offset.to_vec2();
        let mut crop = device_dst;
        if !draw.clip.is_wide_open() {
            crop = crop.intersect(draw.clip.as_rect()?);
        }
        if let Some(size) = clip_size {
            crop = crop.intersect(size.to_rect());
        }
        if rect_is_empty(&crop) {
            return None;
        }

        let src = if crop == device_dst {
            draw.src
        } else {
            if !rect_is_integral(&crop) {
                return None;
            }
            crop - device_dst.origin().to_vec2() + draw.src.origin().to_vec2()
        };
        let image = draw.image.make_subset(src)?;
        Some((image, crop.origin()))
    }

    /// Returns `true` if [`as_mask_path`](Self::as_mask_path) would succeed.
    pub fn can_convert_to_mask(&self) -> bool {
        self.as_mask_path().is_some()
    }

    /// The union of everything the picture draws, as one path.
    ///
    /// Only opaque fills of the whole clip, rectangles, rounded rectangles and paths, and nested
    /// pictures made of those, can be converted.
    pub fn as_mask_path(&self) -> Option<Path> {
        let mut mask = MaskContext::new();
        match self.playback_into(&mut mask, &McState::new(), None) {
            Ok(()) => mask.finish(),
            Err(err) => {
                log::debug!("picture cannot be used as a mask: {err}");
                None
            }
        }
    }

    /// Returns `true` if any draw covers the device point `(x, y)`.
    ///
    /// With `exact` unset, draws are tested by their bounds.
    pub fn hit_test_point(&self, x: f64, y: f64, exact: bool) -> bool {
        let mut hit_test = HitTestContext::new(Point::new(x, y), exact);
        let mut abort = hit_test.abort_callback();
        if let Err(err) = self.playback_into(&mut hit_test, &McState::new(), Some(&mut abort)) {
            log::debug!("hit testing stopped early: {err}");
        }
        hit_test.has_hit()
    }
}

impl Drop for Picture {
    fn drop(&mut self) {
        // Handles go before the storage they point into.
        self.records.clear();
        self.arena.clear();
    }
}

impl fmt::Debug for Picture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picture")
            .field("record_count", &self.records.len())
            .field("draw_count", &self.draw_count)
            .field("has_unbounded_fill", &self.has_unbounded_fill)
            .field("bounds", &self.bounds.get())
            .finish_non_exhaustive()
    }
}

/// Records a picture through a [`Canvas`].
#[derive(Debug, Default)]
pub struct PictureRecorder {
    context: RecordingContext,
    recording: bool,
}

impl PictureRecorder {
    /// Create a recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new recording, discarding anything not yet finished.
    pub fn begin_recording(&mut self) -> Canvas<'_> {
        self.context.reset();
        self.recording = true;
        Canvas::new(&mut self.context)
    }

    /// Returns `true` between [`begin_recording`](Self::begin_recording) and
    /// [`finish_recording_as_picture`](Self::finish_recording_as_picture).
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Finish the recording. `None` if nothing was recorded.
    pub fn finish_recording_as_picture(&mut self) -> Option<Arc<Picture>> {
        if !self.recording {
            return None;
        }
        self.recording = false;
        self.context.finish_recording_as_picture()
    }
}

struct ImageDraw {
    image: Image,
    src: Rect,
    dst: Rect,
    matrix: Affine,
    clip: Clip,
}

/// Captures the single draw of a picture if it is a plain, unfiltered image draw.
#[derive(Default)]
struct SingleImageContext {
    draw: Option<ImageDraw>,
}

const NOT_AN_IMAGE: &str = "only plain image draws have an image fast path";

impl SingleImageContext {
    fn capture(
        &mut self,
        op: RecordType,
        image: &Image,
        src: Rect,
        dst: Rect,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        let plain = brush.alpha() >= 1.0
            && brush.is_src_over()
            && brush.color_filter.is_none()
            && brush.mask_filter.is_none();
        let same_size = src.size() == dst.size();
        let integral_src = rect_is_integral(&src) && rect_contains_rect(&image.bounds(), &src);
        if !plain || !same_size || !integral_src {
            return Err(DrawError::unsupported(op, NOT_AN_IMAGE));
        }
        self.draw = Some(ImageDraw {
            image: image.clone(),
            src,
            dst,
            matrix: state.matrix,
            clip: state.clip.clone(),
        });
        Ok(())
    }
}

impl DrawContext for SingleImageContext {
    fn draw_fill(&mut self, _: &McState, _: &Brush) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawFill, NOT_AN_IMAGE))
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let op = RecordType::DrawRect;
        let Some(shader) = brush.shader.as_ref().and_then(|shader| shader.as_image()) else {
            return Err(DrawError::unsupported(op, NOT_AN_IMAGE));
        };
        if stroke.is_some() {
            return Err(DrawError::unsupported(op, NOT_AN_IMAGE));
        }
        let Some(shift) = translate_only(&shader.transform) else {
            return Err(DrawError::unsupported(op, NOT_AN_IMAGE));
        };
        let src = *rect - shift.to_vec2();
        let brush = Brush {
            shader: None,
            ..brush.clone()
        };
        self.capture(op, &shader.image, src, *rect, state, &brush)
    }

    fn draw_rrect(
        &mut self,
        _: &RoundedRect,
        _: &McState,
        _: &Brush,
        _: Option<&Stroke>,
    ) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawRRect, NOT_AN_IMAGE))
    }

    fn draw_path(&mut self, _: &Path, _: &McState, _: &Brush) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawPath, NOT_AN_IMAGE))
    }

    fn draw_shape(&mut self, _: &Shape, _: &McState, _: &Brush, _: Option<&Stroke>) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawShape, NOT_AN_IMAGE))
    }

    fn draw_image(
        &mut self,
        image: &Image,
        _: &SamplingOptions,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        if brush.shader.is_some() {
            return Err(DrawError::unsupported(RecordType::DrawImage, NOT_AN_IMAGE));
        }
        let bounds = image.bounds();
        self.capture(RecordType::DrawImage, image, bounds, bounds, state, brush)
    }

    fn draw_image_rect(
        &mut self,
        image: &Image,
        rect: &Rect,
        _: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        _: SrcRectConstraint,
    ) -> DrawResult {
        if brush.shader.is_some() {
            return Err(DrawError::unsupported(RecordType::DrawImageRect, NOT_AN_IMAGE));
        }
        self.capture(RecordType::DrawImageRect, image, *rect, *rect, state, brush)
    }

    fn draw_image_rect_to_rect(
        &mut self,
        image: &Image,
        src: &Rect,
        dst: &Rect,
        _: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        _: SrcRectConstraint,
    ) -> DrawResult {
        let op = RecordType::DrawImageRectToRect;
        if brush.shader.is_some() {
            return Err(DrawError::unsupported(op, NOT_AN_IMAGE));
        }
        self.capture(op, image, *src, *dst, state, brush)
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
            NOT_AN_IMAGE,
        ))
    }

    fn draw_picture(&mut self, _: &Arc<Picture>, _: &McState) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawPicture, NOT_AN_IMAGE))
    }

    fn draw_layer(
        &mut self,
        _: &Arc<Picture>,
        _: Option<&ImageFilter>,
        _: &McState,
        _: &Brush,
    ) -> DrawResult {
        Err(DrawError::unsupported(RecordType::DrawLayer, NOT_AN_IMAGE))
    }
}
