// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Testing a device space point against draws.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use crate::context::{image_draw_bounds, primitive_bounds, DrawContext, DrawResult};
use crate::geometry::{rect_contains_point, Path};
use crate::glyph::GlyphRunList;
use crate::image::Image;
use crate::kurbo::{Point, Rect, RoundedRect, Shape as _, Stroke};
use crate::mc_state::McState;
use crate::paint::{Brush, ImageFilter, SamplingOptions, SrcRectConstraint};
use crate::picture::Picture;
use crate::shape::Shape;

/// Reports whether any draw covers a device point.
///
/// In exact mode the point is tested against outlines, otherwise against local bounds. The
/// hit flag latches; use [`abort_callback`](Self::abort_callback) to stop playback once hit.
#[derive(Debug)]
pub struct HitTestContext {
    point: Point,
    exact: bool,
    hit: Rc<Cell<bool>>,
}

impl HitTestContext {
    /// Test `point`, in device space.
    pub fn new(point: Point, exact: bool) -> Self {
        Self {
            point,
            exact,
            hit: Rc::new(Cell::new(false)),
        }
    }

    /// Returns `true` once any draw covered the point.
    pub fn has_hit(&self) -> bool {
        self.hit.get()
    }

    /// An abort callback that fires as soon as the point was hit.
    pub fn abort_callback(&self) -> impl FnMut() -> bool {
        let hit = self.hit.clone();
        move || hit.get()
    }

    /// The point in the local space of `state`, if it is inside the clip.
    fn local_point(&self, state: &McState) -> Option<Point> {
        if self.hit.get() || !state.clip.contains(self.point) {
            return None;
        }
        if state.matrix.determinant() == 0.0 {
            return None;
        }
        Some(state.matrix.inverse() * self.point)
    }

    fn test(&mut self, state: &McState, covers: impl FnOnce(Point) -> bool) -> DrawResult {
        if let Some(local) = self.local_point(state) {
            if covers(local) {
                self.hit.set(true);
            }
        }
        Ok(())
    }

    fn test_path(&mut self, path: &Path, state: &McState, stroke: Option<&Stroke>) -> DrawResult {
        let exact = self.exact;
        self.test(state, |local| match (exact, stroke) {
            (true, Some(stroke)) => path.stroked(stroke).contains(local),
            (true, None) => path.contains(local),
            (false, _) => {
                path.is_inverse_fill()
                    || rect_contains_point(&primitive_bounds(path.outline_bounds(), stroke), local)
            }
        })
    }

    fn test_rect(&mut self, rect: Rect, state: &McState, stroke: Option<&Stroke>) -> DrawResult {
        if self.exact && stroke.is_some() {
            return self.test_path(&Path::from_rect(&rect), state, stroke);
        }
        self.test(state, |local| {
            rect_contains_point(&primitive_bounds(rect, stroke), local)
        })
    }
}

impl DrawContext for HitTestContext {
    fn draw_fill(&mut self, state: &McState, _: &Brush) -> DrawResult {
        self.test(state, |_| true)
    }

    fn draw_rect(
        &mut self,
        rect: &Rect,
        state: &McState,
        _: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        self.test_rect(*rect, state, stroke)
    }

    fn draw_rrect(
        &mut self,
        rrect: &RoundedRect,
        state: &McState,
        _: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        if !self.exact {
            return self.test_rect(rrect.rect(), state, stroke);
        }
        match stroke {
            Some(_) => self.test_path(&Path::from_rrect(rrect), state, stroke),
            None => self.test(state, |local| rrect.contains(local)),
        }
    }

    fn draw_path(&mut self, path: &Path, state: &McState, _: &Brush) -> DrawResult {
        self.test_path(path, state, None)
    }

    fn draw_shape(
        &mut self,
        shape: &Shape,
        state: &McState,
        _: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        if self.hit.get() {
            return Ok(());
        }
        if self.exact || shape.is_inverse_fill() {
            self.test_path(&shape.path(), state, stroke)
        } else {
            self.test_rect(shape.bounds(), state, stroke)
        }
    }

    fn draw_image(
        &mut self,
        image: &Image,
        _: &SamplingOptions,
        state: &McState,
        _: &Brush,
    ) -> DrawResult {
        self.test_rect(image_draw_bounds(image, None, None), state, None)
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
        self.test_rect(image_draw_bounds(image, Some(rect), None), state, None)
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
        self.test_rect(image_draw_bounds(image, Some(src), Some(dst)), state, None)
    }

    fn draw_glyph_run_list(
        &mut self,
        list: &GlyphRunList,
        state: &McState,
        _: &Brush,
        stroke: Option<&Stroke>,
    ) -> DrawResult {
        if self.exact {
            for run in &list.runs {
                if let Some(path) = run.path() {
                    self.test_path(&path, state, stroke)?;
                } else {
                    self.test_rect(run.bounds(), state, stroke)?;
                }
            }
            Ok(())
        } else {
            self.test_rect(list.bounds(), state, stroke)
        }
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &McState) -> DrawResult {
        if self.hit.get() {
            return Ok(());
        }
        let mut abort = self.abort_callback();
        picture.playback_into(self, state, Some(&mut abort))
    }

    fn draw_layer(
        &mut self,
        picture: &Arc<Picture>,
        filter: Option<&ImageFilter>,
        state: &McState,
        _: &Brush,
    ) -> DrawResult {
        if self.hit.get() {
            return Ok(());
        }
        match filter {
            // Filters can move content, so test against the area they may touch.
            Some(filter) => {
                let bounds = filter.filter_bounds(picture.bounds());
                self.test_rect(bounds, state, None)
            }
            None => {
                let mut abort = self.abort_callback();
                picture.playback_into(self, state, Some(&mut abort))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::Clip;
    use crate::kurbo::{Affine, BezPath};

    fn triangle() -> Path {
        let mut bez = BezPath::new();
        bez.move_to((0.0, 0.0));
        bez.line_to((10.0, 0.0));
        bez.line_to((0.0, 10.0));
        bez.close_path();
        Path::from_bez(bez)
    }

    #[test]
    fn exact_mode_tests_outlines() {
        let state = McState::new();
        let point = Point::new(8.0, 8.0);
        let mut bounds = HitTestContext::new(point, false);
        bounds
            .draw_path(&triangle(), &state, &Brush::default())
            .unwrap();
        assert!(bounds.has_hit());
        let mut exact = HitTestContext::new(point, true);
        exact.draw_path(&triangle(), &state, &Brush::default()).unwrap();
        assert!(!exact.has_hit());
    }

    #[test]
    fn clip_excludes_hits() {
        let state = McState::with(
            Affine::IDENTITY,
            Clip::from_rect(Rect::new(0.0, 0.0, 2.0, 2.0)),
        );
        let mut ctx = HitTestContext::new(Point::new(3.0, 3.0), true);
        ctx.draw_fill(&state, &Brush::default()).unwrap();
        assert!(!ctx.has_hit());
    }

    #[test]
    fn point_is_mapped_to_local_space() {
        let state = McState::with(Affine::scale(4.0), Clip::wide_open());
        let mut ctx = HitTestContext::new(Point::new(6.0, 6.0), true);
        ctx.draw_rect(&Rect::new(1.0, 1.0, 2.0, 2.0), &state, &Brush::default(), None)
            .unwrap();
        assert!(ctx.has_hit());
    }

    #[test]
    fn abort_fires_after_hit() {
        let ctx = HitTestContext::new(Point::ZERO, false);
        let mut abort = ctx.abort_callback();
        assert!(!abort());
        ctx.hit.set(true);
        assert!(abort());
    }
}
