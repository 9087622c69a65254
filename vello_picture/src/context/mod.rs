// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The draw sink interface and its implementations.
//!
//! Every draw reaching a [`DrawContext`] carries the full [`McState`] and [`Brush`] in effect, so
//! contexts never track state themselves. A context that cannot model a draw returns
//! [`DrawError::Unsupported`] and playback stops there.

mod hit_test;
mod layer_unroll;
mod mask;
mod measure;
mod opaque;
mod recording;

pub use hit_test::HitTestContext;
pub use layer_unroll::LayerUnrollContext;
pub use mask::MaskContext;
pub use measure::MeasureContext;
pub use opaque::OpaqueContext;
pub use recording::RecordingContext;

use std::sync::Arc;

use thiserror::Error;

use crate::geometry::Path;
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Rect, RoundedRect, Stroke};
use crate::mc_state::McState;
use crate::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::picture::Picture;
use crate::record::RecordType;
use crate::shape::Shape;

/// Errors reported by draw contexts.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DrawError {
    /// The context cannot model this draw.
    #[error("{op:?} is not supported here: {reason}")]
    Unsupported {
        /// The record that was rejected.
        op: RecordType,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl DrawError {
    /// Shorthand for [`DrawError::Unsupported`].
    pub fn unsupported(op: RecordType, reason: &'static str) -> Self {
        Self::Unsupported { op, reason }
    }
}

/// The result of forwarding one draw.
pub type DrawResult = Result<(), DrawError>;

/// A sink for draws.
///
/// There is one method per kind of draw record. Set-state records never reach a context: their
/// effect is folded into the `state`, `brush` and `stroke` arguments.
pub trait DrawContext {
    /// Fill the whole clip.
    fn draw_fill(&mut self, state: &McState, brush: &Brush) -> DrawResult;

    /// Fill or stroke a rectangle.
    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult;

    /// Fill or stroke a rounded rectangle.
    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult;

    /// Fill a path.
    fn draw_path(&mut self, path: &Path, state: &McState, brush: &Brush) -> DrawResult;

    /// Fill or stroke a shape.
    fn draw_shape(
        &mut self,
        shape: &Shape,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult;

    /// Draw an image with its top left corner at the local origin.
    fn draw_image(
        &mut self,
        image: &Image,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult;

    /// Draw the `rect` subset of an image in place.
    fn draw_image_rect(
        &mut self,
        image: &Image,
        rect: &Rect,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        constraint: SrcRectConstraint,
    ) -> DrawResult;

    /// Draw the `src` subset of an image scaled into `dst`.
    fn draw_image_rect_to_rect(
        &mut self,
        image: &Image,
        src: &Rect,
        dst: &Rect,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
        constraint: SrcRectConstraint,
    ) -> DrawResult;

    /// Draw glyph runs.
    fn draw_glyph_run_list(
        &mut self,
        list: &GlyphRunList,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult;

    /// Draw a nested picture under `state`.
    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult;

    /// Composite the content of a layer, optionally filtered, with `brush`.
    ///
    /// The layer content is in the device space of `state`, whose matrix is the identity.
    fn draw_layer(
        &mut self,
        picture: &Arc<Picture>,
        filter: Option<&ImageFilter>,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult;
}

/// Local space bounds of a stroked or filled primitive.
pub(crate) fn primitive_bounds(bounds: Rect, stroke: Option<&Stroke>) -> Rect {
    match stroke {
        Some(stroke) => crate::geometry::stroke_bounds(&bounds, stroke),
        None => bounds,
    }
}

/// Local space bounds of an image draw, given the record kind.
pub(crate) fn image_draw_bounds(image: &Image, src: Option<&Rect>, dst: Option<&Rect>) -> Rect {
    match (src, dst) {
        (_, Some(dst)) => *dst,
        (Some(src), None) => *src,
        (None, None) => image.bounds(),
    }
}
