// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The immediate-style drawing front end.

use std::sync::Arc;

use crate::clip::Clip;
use crate::context::{DrawContext, DrawError, DrawResult, LayerUnrollContext, RecordingContext};
use crate::geometry::{Path, PATH_TOLERANCE};
use crate::glyph::{Font, GlyphId, GlyphRun, GlyphRunList};
use crate::image::Image;
use crate::kurbo::{
    Affine, BezPath, Circle, Ellipse, Point, Rect, RoundedRect, Shape as _, Stroke,
};
use crate::mc_state::McState;
use crate::paint::{Brush, ImageFilter, Paint, SamplingOptions, SrcRectConstraint};
use crate::peniko::{BlendMode, Color, Compose};
use crate::picture::Picture;
use crate::playback::AbortCallback;
use crate::shape::Shape;

/// Content drawn between a `save_layer` and its `restore`.
#[derive(Debug)]
struct CanvasLayer {
    context: RecordingContext,
    brush: Brush,
    image_filter: Option<ImageFilter>,
}

/// One entry of the save stack.
#[derive(Debug)]
struct CanvasState {
    mc_state: McState,
    layer: Option<Box<CanvasLayer>>,
}

/// Forwards draw calls with the current matrix and clip to a [`DrawContext`].
///
/// Draws between [`save_layer`](Self::save_layer) and the matching [`restore`](Self::restore)
/// are recorded into the layer and composited when it is restored. Dropping the canvas restores
/// every open save.
pub struct Canvas<'a> {
    target: &'a mut dyn DrawContext,
    // Never empty; the first entry is the base state.
    stack: Vec<CanvasState>,
    error: Option<DrawError>,
}

impl<'a> Canvas<'a> {
    /// Draw into `target`, starting with the identity matrix and a wide open clip.
    pub fn new(target: &'a mut dyn DrawContext) -> Self {
        Self {
            target,
            stack: vec![CanvasState {
                mc_state: McState::new(),
                layer: None,
            }],
            error: None,
        }
    }

    /// The first error reported by a context, if any.
    ///
    /// Once a draw failed every later draw is dropped.
    pub fn status(&self) -> Result<(), DrawError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn top(&self) -> &McState {
        &self.stack[self.stack.len() - 1].mc_state
    }

    fn top_mut(&mut self) -> &mut McState {
        let last = self.stack.len() - 1;
        &mut self.stack[last].mc_state
    }

    /// The current local to device matrix.
    pub fn matrix(&self) -> Affine {
        self.top().matrix
    }

    /// The current device space clip.
    pub fn clip(&self) -> &Clip {
        &self.top().clip
    }

    /// Replace the current matrix.
    pub fn set_matrix(&mut self, matrix: Affine) {
        self.top_mut().matrix = matrix;
    }

    /// Reset the current matrix to the identity.
    pub fn reset_matrix(&mut self) {
        self.set_matrix(Affine::IDENTITY);
    }

    /// Pre-concatenate `matrix` to the current matrix.
    pub fn concat(&mut self, matrix: &Affine) {
        let state = self.top_mut();
        state.matrix = state.matrix * *matrix;
    }

    /// Translate the local space.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.concat(&Affine::translate((dx, dy)));
    }

    /// Scale the local space.
    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.concat(&Affine::scale_non_uniform(sx, sy));
    }

    /// Rotate the local space by `radians`, clockwise in a y-down space.
    pub fn rotate(&mut self, radians: f64) {
        self.concat(&Affine::rotate(radians));
    }

    /// Skew the local space.
    pub fn skew(&mut self, kx: f64, ky: f64) {
        self.concat(&Affine::skew(kx, ky));
    }

    /// Intersect the clip with a local space rectangle.
    pub fn clip_rect(&mut self, rect: Rect) {
        self.top_mut().clip_rect(rect);
    }

    /// Intersect the clip with a local space rounded rectangle.
    pub fn clip_rrect(&mut self, rrect: &RoundedRect) {
        self.top_mut().clip_path(&Path::from_rrect(rrect));
    }

    /// Intersect the clip with a local space path.
    pub fn clip_path(&mut self, path: &Path) {
        self.top_mut().clip_path(path);
    }

    /// Number of saved states, including the base state.
    pub fn save_count(&self) -> usize {
        self.stack.len()
    }

    /// Save the matrix and clip. Returns the save count before saving.
    pub fn save(&mut self) -> usize {
        self.push(None)
    }

    /// Save the matrix and clip and start a layer composited with `paint` on restore.
    ///
    /// Only the brush and image filter of the paint are used.
    pub fn save_layer(&mut self, paint: Option<&Paint>) -> usize {
        let (brush, image_filter) = match paint {
            Some(paint) => (paint.brush.clone(), paint.image_filter.clone()),
            None => (Brush::default(), None),
        };
        self.push(Some(Box::new(CanvasLayer {
            context: RecordingContext::new(),
            brush,
            image_filter,
        })))
    }

    /// Start a layer composited with `alpha`.
    pub fn save_layer_alpha(&mut self, alpha: f32) -> usize {
        let paint = Paint {
            brush: Brush::default().with_alpha_multiplied(alpha),
            ..Paint::default()
        };
        self.save_layer(Some(&paint))
    }

    fn push(&mut self, layer: Option<Box<CanvasLayer>>) -> usize {
        let count = self.stack.len();
        let mc_state = self.top().clone();
        self.stack.push(CanvasState { mc_state, layer });
        count
    }

    /// Pop the last save. Restoring the base state does nothing.
    pub fn restore(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(popped) = self.stack.pop() else {
            return;
        };
        if let Some(layer) = popped.layer {
            self.composite_layer(*layer);
        }
    }

    /// Restore until `count` states remain.
    pub fn restore_to_count(&mut self, count: usize) {
        while self.stack.len() > count.max(1) {
            self.restore();
        }
    }

    fn composite_layer(&mut self, layer: CanvasLayer) {
        let CanvasLayer {
            mut context,
            brush,
            image_filter,
        } = layer;
        let Some(picture) = context.finish_recording_as_picture() else {
            return;
        };
        if picture.draw_count() == 0 {
            return;
        }
        let unroll = picture.draw_count() == 1
            && image_filter.is_none()
            && LayerUnrollContext::can_unroll(&brush);
        // Layer content was recorded in device space.
        self.dispatch(|sink, state| {
            if unroll {
                let mut unroll = LayerUnrollContext::new(sink, brush);
                picture.playback_into(&mut unroll, &McState::new(), None)
            } else {
                let composite = McState::with(Affine::IDENTITY, state.clip.clone());
                sink.draw_layer(&picture, image_filter.as_ref(), &composite, &brush)
            }
        });
    }

    fn sink(&mut self) -> Option<(&mut dyn DrawContext, &McState)> {
        let (top, rest) = self.stack.split_last_mut()?;
        let CanvasState { mc_state, layer } = top;
        let sink: &mut dyn DrawContext = match layer.as_deref_mut() {
            Some(layer) => &mut layer.context,
            None => match rest.iter_mut().rev().find_map(|s| s.layer.as_deref_mut()) {
                Some(layer) => &mut layer.context,
                None => &mut *self.target,
            },
        };
        Some((sink, mc_state))
    }

    /// Forward one draw to the current target, unless the clip rejects everything.
    fn dispatch(&mut self, draw: impl FnOnce(&mut dyn DrawContext, &McState) -> DrawResult) {
        if self.error.is_some() {
            return;
        }
        let Some((sink, state)) = self.sink() else {
            return;
        };
        if state.clip.is_empty() {
            return;
        }
        if let Err(err) = draw(sink, state) {
            log::debug!("canvas draw failed: {err}");
            self.error = Some(err);
        }
    }

    /// Draw with `paint`, wrapping the draw in a filtered layer if the paint has an image
    /// filter.
    fn draw_with_paint(
        &mut self,
        paint: &Paint,
        draw: impl FnOnce(&mut dyn DrawContext, &McState, &Brush, Option<&Stroke>) -> DrawResult,
    ) {
        let Some(filter) = &paint.image_filter else {
            self.dispatch(|sink, state| draw(sink, state, &paint.brush, paint.stroke_style()));
            return;
        };
        let layer = Paint {
            image_filter: Some(filter.clone()),
            ..Paint::default()
        };
        let count = self.save_layer(Some(&layer));
        self.dispatch(|sink, state| draw(sink, state, &paint.brush, paint.stroke_style()));
        self.restore_to_count(count);
    }

    /// Replace everything inside the clip with `color`.
    pub fn clear(&mut self, color: Color) {
        self.draw_color(color, Compose::Copy);
    }

    /// Fill the clip with `color`.
    pub fn draw_color(&mut self, color: Color, blend_mode: impl Into<BlendMode>) {
        let brush = Brush {
            blend_mode: blend_mode.into(),
            ..Brush::from_color(color)
        };
        self.dispatch(|sink, state| sink.draw_fill(state, &brush));
    }

    /// Fill the clip with `paint`.
    pub fn draw_paint(&mut self, paint: &Paint) {
        self.draw_with_paint(paint, |sink, state, brush, _| sink.draw_fill(state, brush));
    }

    /// Fill or stroke a rectangle.
    pub fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.draw_with_paint(paint, |sink, state, brush, stroke| {
            sink.draw_rect(&rect, state, brush, stroke)
        });
    }

    /// Fill or stroke a rounded rectangle.
    pub fn draw_rrect(&mut self, rrect: &RoundedRect, paint: &Paint) {
        self.draw_with_paint(paint, |sink, state, brush, stroke| {
            sink.draw_rrect(rrect, state, brush, stroke)
        });
    }

    /// Fill or stroke a rectangle with uniformly rounded corners.
    pub fn draw_round_rect(&mut self, rect: Rect, radius: f64, paint: &Paint) {
        self.draw_rrect(&RoundedRect::from_rect(rect, radius), paint);
    }

    /// Fill or stroke the ellipse inscribed in `oval`.
    pub fn draw_oval(&mut self, oval: Rect, paint: &Paint) {
        let outline = Ellipse::from_rect(oval).to_path(PATH_TOLERANCE);
        self.draw_path(&Path::from_bez(outline), paint);
    }

    /// Fill or stroke a circle.
    pub fn draw_circle(&mut self, center: Point, radius: f64, paint: &Paint) {
        let outline = Circle::new(center, radius).to_path(PATH_TOLERANCE);
        self.draw_path(&Path::from_bez(outline), paint);
    }

    /// Stroke a line segment with the stroke parameters of `paint`.
    pub fn draw_line(&mut self, p0: Point, p1: Point, paint: &Paint) {
        let mut line = BezPath::new();
        line.move_to(p0);
        line.line_to(p1);
        let shape = Shape::from_path(Path::from_bez(line));
        self.draw_with_paint(paint, |sink, state, brush, _| {
            sink.draw_shape(&shape, state, brush, Some(&paint.stroke))
        });
    }

    /// Fill or stroke a path. Stroked paths are drawn as shapes.
    pub fn draw_path(&mut self, path: &Path, paint: &Paint) {
        if paint.stroke_style().is_some() {
            let shape = Shape::from_path(path.clone());
            self.draw_shape(&shape, paint);
            return;
        }
        self.draw_with_paint(paint, |sink, state, brush, _| sink.draw_path(path, state, brush));
    }

    /// Fill or stroke a shape.
    pub fn draw_shape(&mut self, shape: &Shape, paint: &Paint) {
        self.draw_with_paint(paint, |sink, state, brush, stroke| {
            sink.draw_shape(shape, state, brush, stroke)
        });
    }

    /// Draw an image with its top left corner at `(x, y)`.
    pub fn draw_image(
        &mut self,
        image: &Image,
        x: f64,
        y: f64,
        sampling: &SamplingOptions,
        paint: Option<&Paint>,
    ) {
        let paint = paint.cloned().unwrap_or_default();
        self.draw_with_paint(&paint, |sink, state, brush, _| {
            let moved = McState::with(state.matrix * Affine::translate((x, y)), state.clip.clone());
            sink.draw_image(image, sampling, &moved, brush)
        });
    }

    /// Draw the `rect` subset of an image in place.
    pub fn draw_image_rect(
        &mut self,
        image: &Image,
        rect: Rect,
        sampling: &SamplingOptions,
        paint: Option<&Paint>,
        constraint: SrcRectConstraint,
    ) {
        let paint = paint.cloned().unwrap_or_default();
        self.draw_with_paint(&paint, |sink, state, brush, _| {
            sink.draw_image_rect(image, &rect, sampling, state, brush, constraint)
        });
    }

    /// Draw the `src` subset of an image scaled into `dst`.
    pub fn draw_image_rect_to_rect(
        &mut self,
        image: &Image,
        src: Rect,
        dst: Rect,
        sampling: &SamplingOptions,
        paint: Option<&Paint>,
        constraint: SrcRectConstraint,
    ) {
        let paint = paint.cloned().unwrap_or_default();
        self.draw_with_paint(&paint, |sink, state, brush, _| {
            sink.draw_image_rect_to_rect(image, &src, &dst, sampling, state, brush, constraint)
        });
    }

    /// Draw glyphs of one font, with positions relative to `origin`.
    pub fn draw_glyphs(
        &mut self,
        font: &Font,
        glyphs: &[GlyphId],
        positions: &[Point],
        origin: Point,
        paint: &Paint,
    ) {
        let run = GlyphRun {
            font: font.clone(),
            glyphs: glyphs.to_vec(),
            positions: positions
                .iter()
                .map(|position| *position + origin.to_vec2())
                .collect(),
        };
        self.draw_glyph_run_list(&GlyphRunList::from_run(run), paint);
    }

    /// Draw glyph runs.
    pub fn draw_glyph_run_list(&mut self, list: &GlyphRunList, paint: &Paint) {
        if list.glyph_count() == 0 {
            return;
        }
        self.draw_with_paint(paint, |sink, state, brush, stroke| {
            sink.draw_glyph_run_list(list, state, brush, stroke)
        });
    }

    /// Draw a picture under `matrix`, composited with `paint`.
    ///
    /// Pictures with at most one draw and no paint are played back in place.
    pub fn draw_picture(
        &mut self,
        picture: &Arc<Picture>,
        matrix: Option<&Affine>,
        paint: Option<&Paint>,
    ) {
        let count = self.save();
        if let Some(matrix) = matrix {
            self.concat(matrix);
        }
        match paint {
            Some(paint) => {
                self.save_layer(Some(paint));
                self.dispatch(|sink, state| sink.draw_picture(picture, state));
            }
            None if picture.draw_count() <= 1 => self.playback_picture(picture, None),
            None => self.dispatch(|sink, state| sink.draw_picture(picture, state)),
        }
        self.restore_to_count(count);
    }

    /// Play the records of `picture` into the current target under the current state.
    pub(crate) fn playback_picture(
        &mut self,
        picture: &Picture,
        abort: Option<&mut dyn AbortCallback>,
    ) {
        self.dispatch(|sink, state| picture.playback_into(sink, state, abort));
    }
}

impl Drop for Canvas<'_> {
    fn drop(&mut self) {
        self.restore_to_count(1);
    }
}

impl core::fmt::Debug for Canvas<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Canvas")
            .field("save_count", &self.stack.len())
            .field("matrix", &self.matrix())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
