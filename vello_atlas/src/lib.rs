// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plot-based texture atlases for caching glyph images on the GPU.
//!
//! An [`Atlas`] is a list of page textures, each split into a fixed grid of plots. Cells are
//! packed into plots with a skyline packer and addressed by an [`AtlasLocator`] carrying the
//! plot generation, so a locator outlives the content it names without ever aliasing new data.
//!
//! Eviction is driven by [`AtlasToken`]s from a [`TokenTracker`]: every draw using a cell marks its
//! plot, and a plot is only reused once the flush that submitted its last draw has been issued.
//! [`Atlas::compact`] runs after each flush, retiring pages that stay unused and consolidating
//! a sparse last page so that it can be released.
//!
//! The [`AtlasManager`] keeps one atlas per [`TextureFormat`] together with a [`StrikeCache`]
//! mapping glyphs to their cells. [`AtlasRenderContext`] plays pictures through the manager and
//! emits [`RenderOp`]s with textured glyph quads.
//!
//! # Features
//!
//! - `wgpu`: Provide [`WgpuTextureBackend`], which creates and writes `wgpu` textures.
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

pub mod atlas;
pub mod config;
pub mod error;
pub mod manager;
pub mod packer;
pub mod page;
pub mod plot;
pub mod proxy;
pub mod render;
pub mod strike;
pub mod token;

pub use atlas::Atlas;
pub use config::{AtlasConfig, AtlasManagerConfig};
pub use error::{AddResult, AtlasError};
pub use manager::AtlasManager;
pub use plot::{AtlasLocator, AtlasRect, PlotLocator};
pub use proxy::{TextureBackend, TextureFormat, TextureProxy};
pub use render::{AtlasRenderContext, QuadVertex, RenderOp};
pub use strike::{CachedGlyph, StrikeCache, StrikeKey};
pub use token::{AtlasToken, TokenTracker};

#[cfg(feature = "wgpu")]
pub use proxy::WgpuTextureBackend;
