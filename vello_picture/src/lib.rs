// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canvas recording and replayable pictures.
//!
//! This crate captures drawing calls made on a [`Canvas`] into an immutable [`Picture`]: a flat
//! list of records placed in a block arena. Set-state records (matrix, clip, brush, stroke) and
//! draw records are interleaved, and playback re-synthesizes the full state for every draw
//! before forwarding it to a [`DrawContext`].
//!
//! # Contexts
//!
//! The same draw surface is consumed differently by each context:
//!
//! - [`RecordingContext`](context::RecordingContext) appends records and produces a [`Picture`].
//! - [`MeasureContext`](context::MeasureContext) accumulates device space bounds.
//! - [`HitTestContext`](context::HitTestContext) tests a device point against each draw.
//! - [`LayerUnrollContext`](context::LayerUnrollContext) folds a layer brush into a single draw.
//! - [`OpaqueContext`](context::OpaqueContext) re-records draws with alpha-thresholded brushes.
//!
//! Contexts that cannot model a draw return [`DrawError::Unsupported`](context::DrawError), and
//! playback stops at the first such error.
//!
//! # Features
//!
//! - `multithreading`: Run [`AsyncDataSource`](data_source::AsyncDataSource) producers on the
//!   global rayon thread pool rather than on a dedicated thread each.
// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod arena;
pub mod canvas;
pub mod clip;
pub mod context;
pub mod data_source;
pub mod geometry;
pub mod glyph;
pub mod image;
pub mod mc_state;
pub mod paint;
pub mod picture;
pub mod playback;
pub mod record;
pub mod shape;

pub use peniko;
pub use peniko::color;
pub use peniko::kurbo;

pub use canvas::Canvas;
pub use context::{DrawContext, DrawError, DrawResult};
pub use picture::{Picture, PictureRecorder};
