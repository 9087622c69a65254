// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::fmt::Write as _;
use std::sync::Arc;

use vello_picture::geometry::Path;
use vello_picture::glyph::{
    GlyphFormat, GlyphId, GlyphImage, GlyphRasterParams, GlyphRunList, Typeface,
};
use vello_picture::image::Image;
use vello_picture::kurbo::{Rect, RoundedRect, Stroke};
use vello_picture::mc_state::McState;
use vello_picture::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use vello_picture::peniko::Blob;
use vello_picture::shape::Shape;
use vello_picture::{Canvas, DrawContext, DrawResult, Picture, PictureRecorder};

/// Record a picture by drawing into a fresh canvas.
pub(crate) fn record(draw: impl FnOnce(&mut Canvas<'_>)) -> Arc<Picture> {
    let mut recorder = PictureRecorder::new();
    {
        let mut canvas = recorder.begin_recording();
        draw(&mut canvas);
        assert_eq!(canvas.status(), Ok(()), "recording should never fail");
    }
    recorder
        .finish_recording_as_picture()
        .expect("the recording should contain draws")
}

/// An RGBA image filled with one byte value.
pub(crate) fn solid_image(width: u32, height: u32) -> Image {
    let len = usize::try_from(width * height * 4).unwrap();
    Image::from_pixels(width, height, Blob::from(vec![0xff_u8; len]), true)
}

/// Logs every draw with the full state it was issued with.
#[derive(Debug, Default)]
pub(crate) struct LogContext {
    pub(crate) log: Vec<String>,
}

impl LogContext {
    fn push(&mut self, op: &str, state: &McState, brush: Option<&Brush>, detail: &str) {
        let mut line = format!("{op} {:?} {:?}", state.matrix.as_coeffs(), state.clip.bounds());
        if let Some(brush) = brush {
            let _ = write!(line, " {:?} {:?}", brush.color.components, brush.blend_mode);
        }
        let _ = write!(line, " {detail}");
        self.log.push(line);
    }
}

impl DrawContext for LogContext {
    fn draw_fill(&mut self, state: &McState, brush: &Brush) -> DrawResult {
        self.push("fill", state, Some(brush), "");
        Ok(())
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let detail = format!("{rect:?} {:?}", stroke.map(|stroke| stroke.width));
        self.push("rect", state, Some(brush), &detail);
        Ok(())
    }

    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let detail = format!("{rrect:?} {:?}", stroke.map(|stroke| stroke.width));
        self.push("rrect", state, Some(brush), &detail);
        Ok(())
    }

    fn draw_path(&mut self, path: &Path, state: &McState, brush: &Brush) -> DrawResult {
        self.push("path", state, Some(brush), &format!("{:?}", path.outline_bounds()));
        Ok(())
    }

    fn draw_shape(
        &mut self,
        shape: &Shape,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let detail = format!("{:?} {:?}", shape.bounds(), stroke.map(|stroke| stroke.width));
        self.push("shape", state, Some(brush), &detail);
        Ok(())
    }

    fn draw_image(
        &mut self,
        image: &Image,
        _: &SamplingOptions,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        self.push("image", state, Some(brush), &format!("{}", image.id()));
        Ok(())
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
        self.push("image_rect", state, Some(brush), &format!("{} {rect:?}", image.id()));
        Ok(())
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
        let detail = format!("{} {src:?} {dst:?}", image.id());
        self.push("image_rect_to_rect", state, Some(brush), &detail);
        Ok(())
    }

    fn draw_glyph_run_list(
        &mut self,
        list: &GlyphRunList,
        state: &McState,
        brush: &Brush,
        _: Option<&Stroke>,
    ) -> DrawResult {
        self.push("glyphs", state, Some(brush), &format!("{}", list.glyph_count()));
        Ok(())
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult {
        self.push("picture", state, None, &format!("{}", picture.draw_count()));
        Ok(())
    }

    fn draw_layer(
        &mut self,
        picture: &Arc<Picture>,
        filter: Option<&ImageFilter>,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        let detail = format!("{} {}", picture.draw_count(), filter.is_some());
        self.push("layer", state, Some(brush), &detail);
        Ok(())
    }
}

/// A typeface whose glyphs are squares of half the font size.
#[derive(Debug)]
pub(crate) struct SquareTypeface;

impl Typeface for SquareTypeface {
    fn unique_id(&self) -> u64 {
        7
    }

    fn glyph_bounds(&self, _: GlyphId, size: f32) -> Rect {
        let side = f64::from(size) * 0.5;
        Rect::new(0.0, -side, side, 0.0)
    }

    fn glyph_path(&self, glyph: GlyphId, size: f32) -> Option<Path> {
        Some(Path::from_rect(&self.glyph_bounds(glyph, size)))
    }

    fn rasterize_glyph(&self, _: GlyphId, params: &GlyphRasterParams) -> Option<GlyphImage> {
        let side = (params.size * 0.5).ceil() as u32;
        Some(GlyphImage {
            width: side,
            height: side,
            left: 0,
            top: -(side as i32),
            format: GlyphFormat::Alpha8,
            pixels: vec![0xff; (side * side) as usize],
        })
    }
}
