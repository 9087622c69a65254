// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Appending draws to a record stream.

use std::sync::Arc;

use crate::arena::{BlockArena, RecordHandle};
use crate::clip::Clip;
use crate::context::{DrawContext, DrawResult};
use crate::geometry::Path;
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Affine, Rect, RoundedRect, Stroke};
use crate::mc_state::McState;
use crate::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::picture::Picture;
use crate::record::Record;
use crate::shape::Shape;

/// The state as of the last emitted set-state record, mirroring playback.
#[derive(Debug)]
struct Emitted {
    matrix: Affine,
    clip: Clip,
    brush: Brush,
    stroke: Stroke,
    has_stroke: bool,
}

impl Default for Emitted {
    fn default() -> Self {
        Self {
            matrix: Affine::IDENTITY,
            clip: Clip::wide_open(),
            brush: Brush::default(),
            stroke: Stroke::default(),
            has_stroke: false,
        }
    }
}

/// Records draws into a [`Picture`].
///
/// Set-state records are only emitted for fields that differ from what playback will already
/// hold at that point.
#[derive(Debug, Default)]
pub struct RecordingContext {
    arena: BlockArena<Record>,
    records: Vec<RecordHandle>,
    emitted: Emitted,
}

impl RecordingContext {
    /// Create an empty recording context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything recorded so far.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.records.clear();
        self.emitted = Emitted::default();
    }

    /// Number of records so far.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Returns the recorded picture and starts over. `None` if nothing was recorded.
    pub fn finish_recording_as_picture(&mut self) -> Option<Arc<Picture>> {
        if self.records.is_empty() {
            self.reset();
            return None;
        }
        let arena = core::mem::take(&mut self.arena);
        let records = core::mem::take(&mut self.records);
        self.emitted = Emitted::default();
        Some(Arc::new(Picture::new(arena, records)))
    }

    fn push(&mut self, record: Record) {
        let handle = self.arena.allocate(record);
        self.records.push(handle);
    }

    fn emit_state(&mut self, state: &McState, brush: Option<&Brush>, stroke: Option<&Stroke>) {
        if state.matrix != self.emitted.matrix {
            self.emitted.matrix = state.matrix;
            self.push(Record::SetMatrix(state.matrix));
        }
        if state.clip != self.emitted.clip {
            self.emitted.clip = state.clip.clone();
            self.push(Record::SetClip(state.clip.clone()));
        }
        if let Some(brush) = brush {
            if *brush != self.emitted.brush {
                let record = if brush.same_except_color(&self.emitted.brush) {
                    Record::SetColor(brush.color)
                } else {
                    Record::SetBrush(brush.clone())
                };
                self.emitted.brush = brush.clone();
                self.push(record);
            }
        }
        let has_stroke = stroke.is_some();
        if has_stroke != self.emitted.has_stroke {
            self.emitted.has_stroke = has_stroke;
            self.push(Record::SetHasStroke(has_stroke));
        }
        if let Some(stroke) = stroke {
            if *stroke != self.emitted.stroke {
                let width_only = Stroke {
                    width: self.emitted.stroke.width,
                    ..stroke.clone()
                } == self.emitted.stroke;
                let record = if width_only {
                    Record::SetStrokeWidth(stroke.width)
                } else {
                    Record::SetStroke(stroke.clone())
                };
                self.emitted.stroke = stroke.clone();
                self.push(record);
            }
        }
    }
}

impl DrawContext for RecordingContext {
    fn draw_fill(&mut self, state: &McState, brush: &Brush) -> DrawResult {
        self.emit_state(state, Some(brush), None);
        self.push(Record::DrawFill);
        Ok(())
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.emit_state(state, Some(brush), stroke);
        self.push(Record::DrawRect(*rect));
        Ok(())
    }

    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.emit_state(state, Some(brush), stroke);
        self.push(Record::DrawRRect(*rrect));
        Ok(())
    }

    fn draw_path(&mut self, path: &Path, state: &McState, brush: &Brush) -> DrawResult {
        self.emit_state(state, Some(brush), None);
        self.push(Record::DrawPath(path.clone()));
        Ok(())
    }

    fn draw_shape(
        &mut self,
        shape: &Shape,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.emit_state(state, Some(brush), stroke);
        self.push(Record::DrawShape(shape.clone()));
        Ok(())
    }

    fn draw_image(
        &mut self,
        image: &Image,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        self.emit_state(state, Some(brush), None);
        self.push(Record::DrawImage {
            image: image.clone(),
            sampling: *sampling,
        });
        Ok(())
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
        self.emit_state(state, Some(brush), None);
        self.push(Record::DrawImageRect {
            image: image.clone(),
            rect: *rect,
            sampling: *sampling,
            constraint,
        });
        Ok(())
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
        self.emit_state(state, Some(brush), None);
        self.push(Record::DrawImageRectToRect {
            image: image.clone(),
            src: *src,
            dst: *dst,
            sampling: *sampling,
            constraint,
        });
        Ok(())
    }

    fn draw_glyph_run_list(
        &mut self,
        list: &GlyphRunList,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.emit_state(state, Some(brush), stroke);
        self.push(Record::DrawGlyphRunList(Arc::new(list.clone())));
        Ok(())
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult {
        self.emit_state(state, None, None);
        self.push(Record::DrawPicture(picture.clone()));
        Ok(())
    }

    fn draw_layer(
        &mut self,
        picture: &Arc<Picture>,
        filter: Option<&ImageFilter>,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        self.emit_state(state, Some(brush), None);
        self.push(Record::DrawLayer {
            picture: picture.clone(),
            filter: filter.cloned(),
        });
        Ok(())
    }
}
