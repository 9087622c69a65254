// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Folding a layer's paint into the draws it contains.

use std::sync::Arc;

use crate::context::{DrawContext, DrawResult};
use crate::geometry::Path;
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Rect, RoundedRect, Stroke};
use crate::mc_state::McState;
use crate::paint::{Brush, ColorFilter, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::picture::Picture;
use crate::shape::Shape;

/// Forwards draws to a parent context with a layer brush merged into each brush.
///
/// The layer alpha multiplies the draw alpha, a non source-over layer blend mode replaces the
/// draw's, and the layer color filter is applied after the draw's own.
pub struct LayerUnrollContext<'a> {
    parent: &'a mut dyn DrawContext,
    layer: Brush,
}

impl<'a> LayerUnrollContext<'a> {
    /// Wrap `parent`, merging `layer` into every draw.
    pub fn new(parent: &'a mut dyn DrawContext, layer: Brush) -> Self {
        Self { parent, layer }
    }

    /// Returns `true` if content drawn with `layer` can be unrolled into its draws.
    pub fn can_unroll(layer: &Brush) -> bool {
        layer.shader.is_none() && layer.mask_filter.is_none()
    }

    fn merge(&self, brush: &Brush) -> Brush {
        let mut merged = brush.with_alpha_multiplied(self.layer.alpha());
        if !self.layer.is_src_over() {
            merged.blend_mode = self.layer.blend_mode;
        }
        merged.color_filter = ColorFilter::compose_optional(
            self.layer.color_filter.clone(),
            brush.color_filter.clone(),
        );
        merged
    }
}

impl core::fmt::Debug for LayerUnrollContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayerUnrollContext")
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}

impl DrawContext for LayerUnrollContext<'_> {
    fn draw_fill(&mut self, state: &McState, brush: &Brush) -> DrawResult {
        let brush = self.merge(brush);
        self.parent.draw_fill(state, &brush)
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let brush = self.merge(brush);
        self.parent.draw_rect(rect, state, &brush, stroke)
    }

    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let brush = self.merge(brush);
        self.parent.draw_rrect(rrect, state, &brush, stroke)
    }

    fn draw_path(&mut self, path: &Path, state: &McState, brush: &Brush) -> DrawResult {
        let brush = self.merge(brush);
        self.parent.draw_path(path, state, &brush)
    }

    fn draw_shape(
        &mut self,
        shape: &Shape,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let brush = self.merge(brush);
        self.parent.draw_shape(shape, state, &brush, stroke)
    }

    fn draw_image(
        &mut self,
        image: &Image,
        sampling: &SamplingOptions,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        let brush = self.merge(brush);
        self.parent.draw_image(image, sampling, state, &brush)
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
        let brush = self.merge(brush);
        self.parent
            .draw_image_rect(image, rect, sampling, state, &brush, constraint)
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
        let brush = self.merge(brush);
        self.parent
            .draw_image_rect_to_rect(image, src, dst, sampling, state, &brush, constraint)
    }

    fn draw_glyph_run_list(
        &mut self,
        list: &GlyphRunList,
        state: &McState,
        brush: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        let brush = self.merge(brush);
        self.parent.draw_glyph_run_list(list, state, &brush, stroke)
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult {
        // Nested draws carry their own brushes, each of which needs the layer merged in.
        picture.playback_into(self, state, None)
    }

    fn draw_layer(
        &mut self,
        picture: &Arc<Picture>,
        filter: Option<&ImageFilter>,
        state: &McState,
        brush: &Brush,
    ) -> DrawResult {
        let brush = self.merge(brush);
        self.parent.draw_layer(picture, filter, state, &brush)
    }
}
