// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Replaying a record stream against a target context.

use crate::clip::Clip;
use crate::context::{DrawContext, DrawResult};
use crate::kurbo::{Affine, Stroke};
use crate::mc_state::McState;
use crate::paint::Brush;
use crate::record::Record;

/// Cooperative cancellation of playback, polled once before each record.
pub trait AbortCallback {
    /// Return `true` to stop playback before the next record.
    fn abort(&mut self) -> bool;
}

impl<F: FnMut() -> bool> AbortCallback for F {
    fn abort(&mut self) -> bool {
        self()
    }
}

/// The state accumulated from set-state records during playback.
#[derive(Clone, Debug)]
pub struct PlaybackState {
    base: McState,
    /// Matrix and clip for the next draw, already combined with the base.
    pub state: McState,
    /// Brush for the next draw.
    pub brush: Brush,
    /// Stroke parameters, used when `has_stroke` is set.
    pub stroke: Stroke,
    /// Whether the next primitive is stroked.
    pub has_stroke: bool,
}

impl PlaybackState {
    /// Start playback under `base`.
    pub fn new(base: McState) -> Self {
        Self {
            state: base.clone(),
            base,
            brush: Brush::default(),
            stroke: Stroke::default(),
            has_stroke: false,
        }
    }

    /// The state playback was started under.
    pub fn base(&self) -> &McState {
        &self.base
    }

    /// The stroke for the next draw, if it is stroked.
    pub fn stroke(&self) -> Option<&Stroke> {
        self.has_stroke.then_some(&self.stroke)
    }

    /// Apply a recorded matrix.
    pub fn set_matrix(&mut self, matrix: &Affine) {
        self.state.matrix = self.base.matrix * *matrix;
    }

    /// Apply a recorded device space clip.
    pub fn set_clip(&mut self, clip: &Clip) {
        let mut combined = self.base.clip.clone();
        combined.intersect(&clip.transform(&self.base.matrix));
        self.state.clip = combined;
    }
}

/// Play `records` into `ctx` under `base`.
///
/// Stops without error when `abort` fires, and with the context's error as soon as a draw is
/// rejected.
pub fn play_records<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    ctx: &mut dyn DrawContext,
    base: &McState,
    mut abort: Option<&mut dyn AbortCallback>,
) -> DrawResult {
    let mut state = PlaybackState::new(base.clone());
    for record in records {
        if let Some(abort) = abort.as_deref_mut() {
            if abort.abort() {
                return Ok(());
            }
        }
        record.playback(ctx, &mut state)?;
    }
    Ok(())
}
