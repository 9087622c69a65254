// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recorded drawing commands.

use std::sync::Arc;

use static_assertions::const_assert;

use crate::clip::Clip;
use crate::context::{DrawContext, DrawResult};
use crate::geometry::Path;
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Affine, Rect, RoundedRect, Stroke};
use crate::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::peniko::Color;
use crate::picture::Picture;
use crate::playback::PlaybackState;
use crate::shape::Shape;

/// The kind of a [`Record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// See [`Record::SetMatrix`].
    SetMatrix,
    /// See [`Record::SetClip`].
    SetClip,
    /// See [`Record::SetColor`].
    SetColor,
    /// See [`Record::SetBrush`].
    SetBrush,
    /// See [`Record::SetStrokeWidth`].
    SetStrokeWidth,
    /// See [`Record::SetStroke`].
    SetStroke,
    /// See [`Record::SetHasStroke`].
    SetHasStroke,
    /// See [`Record::DrawFill`].
    DrawFill,
    /// See [`Record::DrawRect`].
    DrawRect,
    /// See [`Record::DrawRRect`].
    DrawRRect,
    /// See [`Record::DrawPath`].
    DrawPath,
    /// See [`Record::DrawShape`].
    DrawShape,
    /// See [`Record::DrawImage`].
    DrawImage,
    /// See [`Record::DrawImageRect`].
    DrawImageRect,
    /// See [`Record::DrawImageRectToRect`].
    DrawImageRectToRect,
    /// See [`Record::DrawGlyphRunList`].
    DrawGlyphRunList,
    /// See [`Record::DrawPicture`].
    DrawPicture,
    /// See [`Record::DrawLayer`].
    DrawLayer,
}

impl RecordType {
    /// Returns `true` for records that forward a draw, `false` for set-state records.
    pub fn is_draw(self) -> bool {
        !matches!(
            self,
            Self::SetMatrix
                | Self::SetClip
                | Self::SetColor
                | Self::SetBrush
                | Self::SetStrokeWidth
                | Self::SetStroke
                | Self::SetHasStroke
        )
    }
}

/// One recorded command.
///
/// Set-state records change one field of the [`PlaybackState`]. Draw records hold only their
/// primitive; matrix, clip, brush and stroke are taken from the playback state.
#[derive(Clone, Debug)]
pub enum Record {
    /// Replace the matrix.
    SetMatrix(Affine),
    /// Replace the clip. The clip is in recording device space.
    SetClip(Clip),
    /// Replace only the brush color.
    SetColor(Color),
    /// Replace the whole brush.
    SetBrush(Brush),
    /// Replace only the stroke width.
    SetStrokeWidth(f64),
    /// Replace the whole stroke.
    SetStroke(Stroke),
    /// Toggle whether primitives are stroked.
    SetHasStroke(bool),
    /// Fill the clip.
    DrawFill,
    /// Draw a rectangle.
    DrawRect(Rect),
    /// Draw a rounded rectangle.
    DrawRRect(RoundedRect),
    /// Fill a path.
    DrawPath(Path),
    /// Draw a shape.
    DrawShape(Shape),
    /// Draw an image at the origin.
    DrawImage {
        /// The image.
        image: Image,
        /// Sampling parameters.
        sampling: SamplingOptions,
    },
    /// Draw a subset of an image in place.
    DrawImageRect {
        /// The image.
        image: Image,
        /// The subset, also used as destination.
        rect: Rect,
        /// Sampling parameters.
        sampling: SamplingOptions,
        /// Sampling constraint.
        constraint: SrcRectConstraint,
    },
    /// Draw a subset of an image into a destination rectangle.
    DrawImageRectToRect {
        /// The image.
        image: Image,
        /// Source rectangle in image pixels.
        src: Rect,
        /// Destination rectangle in local space.
        dst: Rect,
        /// Sampling parameters.
        sampling: SamplingOptions,
        /// Sampling constraint.
        constraint: SrcRectConstraint,
    },
    /// Draw glyph runs.
    DrawGlyphRunList(Arc<GlyphRunList>),
    /// Play back a nested picture.
    DrawPicture(Arc<Picture>),
    /// Composite a layer.
    DrawLayer {
        /// The layer content in device space.
        picture: Arc<Picture>,
        /// Filter applied to the content.
        filter: Option<ImageFilter>,
    },
}

// Records live in arena blocks and must not need more than the natural alignment of the
// largest scalar they hold.
const_assert!(core::mem::align_of::<Record>() <= 8);

impl Record {
    /// The kind of this record.
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::SetMatrix(_) => RecordType::SetMatrix,
            Self::SetClip(_) => RecordType::SetClip,
            Self::SetColor(_) => RecordType::SetColor,
            Self::SetBrush(_) => RecordType::SetBrush,
            Self::SetStrokeWidth(_) => RecordType::SetStrokeWidth,
            Self::SetStroke(_) => RecordType::SetStroke,
            Self::SetHasStroke(_) => RecordType::SetHasStroke,
            Self::DrawFill => RecordType::DrawFill,
            Self::DrawRect(_) => RecordType::DrawRect,
            Self::DrawRRect(_) => RecordType::DrawRRect,
            Self::DrawPath(_) => RecordType::DrawPath,
            Self::DrawShape(_) => RecordType::DrawShape,
            Self::DrawImage { .. } => RecordType::DrawImage,
            Self::DrawImageRect { .. } => RecordType::DrawImageRect,
            Self::DrawImageRectToRect { .. } => RecordType::DrawImageRectToRect,
            Self::DrawGlyphRunList(_) => RecordType::DrawGlyphRunList,
            Self::DrawPicture(_) => RecordType::DrawPicture,
            Self::DrawLayer { .. } => RecordType::DrawLayer,
        }
    }

    /// Returns `true` for draw records.
    pub fn is_draw(&self) -> bool {
        self.record_type().is_draw()
    }

    /// Apply a set-state record to `state`, or forward a draw record to `ctx`.
    pub fn playback(&self, ctx: &mut dyn DrawContext, state: &mut PlaybackState) -> DrawResult {
        match self {
            Self::SetMatrix(matrix) => state.set_matrix(matrix),
            Self::SetClip(clip) => state.set_clip(clip),
            Self::SetColor(color) => state.brush.color = *color,
            Self::SetBrush(brush) => state.brush = brush.clone(),
            Self::SetStrokeWidth(width) => state.stroke.width = *width,
            Self::SetStroke(stroke) => state.stroke = stroke.clone(),
            Self::SetHasStroke(has_stroke) => state.has_stroke = *has_stroke,
            Self::DrawFill => return ctx.draw_fill(&state.state, &state.brush),
            Self::DrawRect(rect) => {
                return ctx.draw_rect(rect, &state.state, &state.brush, state.stroke());
            }
            Self::DrawRRect(rrect) => {
                return ctx.draw_rrect(rrect, &state.state, &state.brush, state.stroke());
            }
            Self::DrawPath(path) => return ctx.draw_path(path, &state.state, &state.brush),
            Self::DrawShape(shape) => {
                return ctx.draw_shape(shape, &state.state, &state.brush, state.stroke());
            }
            Self::DrawImage { image, sampling } => {
                return ctx.draw_image(image, sampling, &state.state, &state.brush);
            }
            Self::DrawImageRect {
                image,
                rect,
                sampling,
                constraint,
            } => {
                return ctx.draw_image_rect(
                    image,
                    rect,
                    sampling,
                    &state.state,
                    &state.brush,
                    *constraint,
                );
            }
            Self::DrawImageRectToRect {
                image,
                src,
                dst,
                sampling,
                constraint,
            } => {
                return ctx.draw_image_rect_to_rect(
                    image,
                    src,
                    dst,
                    sampling,
                    &state.state,
                    &state.brush,
                    *constraint,
                );
            }
            Self::DrawGlyphRunList(list) => {
                return ctx.draw_glyph_run_list(list, &state.state, &state.brush, state.stroke());
            }
            Self::DrawPicture(picture) => return ctx.draw_picture(picture, &state.state),
            Self::DrawLayer { picture, filter } => {
                return ctx.draw_layer(picture, filter.as_ref(), &state.state, &state.brush);
            }
        }
        Ok(())
    }

    /// Returns `true` if this record fills an unbounded area.
    ///
    /// `has_inverse_clip` carries whether the current clip is unbounded from one record to the
    /// next. It starts out `true`, since recording begins with a wide open clip.
    pub fn has_unbounded_fill(&self, has_inverse_clip: &mut bool) -> bool {
        match self {
            Self::SetClip(clip) => {
                *has_inverse_clip = clip.is_inverse_fill();
                false
            }
            Self::DrawFill => *has_inverse_clip,
            Self::DrawPath(path) => path.is_inverse_fill() && *has_inverse_clip,
            Self::DrawShape(shape) => shape.is_inverse_fill() && *has_inverse_clip,
            Self::DrawPicture(picture) | Self::DrawLayer { picture, .. } => {
                picture.has_unbounded_fill() && *has_inverse_clip
            }
            _ => false,
        }
    }
}
