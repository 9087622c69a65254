// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The matrix and clip pair in effect for a draw.

use crate::clip::Clip;
use crate::geometry::{preserves_axis_alignment, Path};
use crate::kurbo::{Affine, Rect};

/// Accumulated transform and device space clip.
///
/// The clip is transformed into device space when it is set, so later matrix changes never
/// affect it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McState {
    /// Local to device transform.
    pub matrix: Affine,
    /// Device space clip.
    pub clip: Clip,
}

impl McState {
    /// Identity matrix and a wide open clip.
    pub fn new() -> Self {
        Self::default()
    }

    /// A state with the given matrix and clip.
    pub fn with(matrix: Affine, clip: Clip) -> Self {
        Self { matrix, clip }
    }

    /// A state that only restricts drawing to `rect` in device space.
    pub fn from_clip_rect(rect: Rect) -> Self {
        Self {
            matrix: Affine::IDENTITY,
            clip: Clip::from_rect(rect),
        }
    }

    /// Intersect the clip with a local space rectangle.
    pub fn clip_rect(&mut self, rect: Rect) {
        if preserves_axis_alignment(&self.matrix) {
            self.clip
                .intersect_rect(crate::geometry::map_rect(&self.matrix, &rect));
        } else {
            self.clip
                .intersect_path(Path::from_rect(&rect).transformed(&self.matrix));
        }
    }

    /// Intersect the clip with a local space path.
    pub fn clip_path(&mut self, path: &Path) {
        self.clip.intersect_path(path.transformed(&self.matrix));
    }

    /// Pre-concatenate the playback base: `base.matrix * self.matrix` and
    /// `base.clip ∩ self.clip` mapped through `base.matrix`.
    pub fn under(&self, base: &Self) -> Self {
        let mut clip = base.clip.clone();
        clip.intersect(&self.clip.transform(&base.matrix));
        Self {
            matrix: base.matrix * self.matrix,
            clip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_is_pre_transformed() {
        let mut state = McState::new();
        state.matrix = Affine::translate((10.0, 10.0));
        state.clip_rect(Rect::new(0.0, 0.0, 5.0, 5.0));
        state.matrix = Affine::IDENTITY;
        assert_eq!(state.clip.as_rect(), Some(Rect::new(10.0, 10.0, 15.0, 15.0)));
    }

    #[test]
    fn under_composes_with_base() {
        let base = McState::with(
            Affine::scale(2.0),
            Clip::from_rect(Rect::new(0.0, 0.0, 8.0, 8.0)),
        );
        let local = McState::with(
            Affine::translate((1.0, 1.0)),
            Clip::from_rect(Rect::new(2.0, 2.0, 10.0, 10.0)),
        );
        let combined = local.under(&base);
        assert_eq!(
            combined.matrix,
            Affine::scale(2.0) * Affine::translate((1.0, 1.0))
        );
        assert_eq!(combined.clip.as_rect(), Some(Rect::new(4.0, 4.0, 8.0, 8.0)));
    }
}
