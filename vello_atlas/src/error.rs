// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atlas errors.

use thiserror::Error;

use crate::plot::AtlasLocator;

/// Errors that can occur while caching content in an atlas.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AtlasError {
    /// The cell is larger than a plot, padding included.
    #[error("Cell too large ({width}x{height}) for atlas plots")]
    CellTooLarge {
        /// The width of the requested cell.
        width: u32,
        /// The height of the requested cell.
        height: u32,
    },
    /// The backend could not provide a texture for a new page.
    #[error("Failed to create a {width}x{height} atlas page texture")]
    TextureCreationFailed {
        /// The width of the page.
        width: u32,
        /// The height of the page.
        height: u32,
    },
    /// Every page is in use by the upcoming flush; retry after flushing.
    #[error("All atlas pages are in use by the upcoming flush")]
    AtlasFull,
    /// The atlas configuration is inconsistent.
    #[error("Invalid atlas configuration: {0}")]
    InvalidConfig(&'static str),
    /// Pixels could not be written to a page texture.
    #[error("Failed to upload atlas pixels: {0}")]
    UploadFailed(&'static str),
}

/// The outcome of [`Atlas::add_to_atlas`](crate::Atlas::add_to_atlas).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddResult {
    /// The cell was placed.
    Succeeded(AtlasLocator),
    /// No space can be reclaimed until the upcoming flush has been submitted.
    TryAgain,
    /// The cell can not be cached.
    Error(AtlasError),
}

impl AddResult {
    /// The locator of a placed cell.
    pub fn locator(&self) -> Option<AtlasLocator> {
        match self {
            Self::Succeeded(locator) => Some(*locator),
            Self::TryAgain | Self::Error(_) => None,
        }
    }
}
