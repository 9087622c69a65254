// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atlas layout and limits.

use crate::error::AtlasError;
use crate::proxy::TextureFormat;

/// Layout and limits of one atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Width of each page texture.
    pub page_width: u32,
    /// Height of each page texture.
    pub page_height: u32,
    /// Width of each plot. Must divide the page width.
    pub plot_width: u32,
    /// Height of each plot. Must divide the page height.
    pub plot_height: u32,
    /// Maximum number of simultaneously active pages.
    pub max_pages: usize,
    /// Empty pixels kept around each cell so that filtering never samples a neighbour.
    pub padding: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            page_width: 2048,
            page_height: 2048,
            plot_width: 512,
            plot_height: 512,
            max_pages: 4,
            padding: 1,
        }
    }
}

impl AtlasConfig {
    /// Number of plot columns and rows in a page.
    pub fn plot_grid(&self) -> (u32, u32) {
        (
            self.page_width / self.plot_width,
            self.page_height / self.plot_height,
        )
    }

    /// Number of plots in a page.
    pub fn plots_per_page(&self) -> usize {
        let (columns, rows) = self.plot_grid();
        (columns * rows) as usize
    }

    /// Check the configuration describes a usable atlas.
    pub fn validate(&self) -> Result<(), AtlasError> {
        if self.plot_width == 0 || self.plot_height == 0 {
            return Err(AtlasError::InvalidConfig("plots must not be empty"));
        }
        if self.page_width % self.plot_width != 0 || self.page_height % self.plot_height != 0 {
            return Err(AtlasError::InvalidConfig(
                "page size must be a multiple of the plot size",
            ));
        }
        if self.page_width == 0 || self.page_height == 0 {
            return Err(AtlasError::InvalidConfig("pages must not be empty"));
        }
        if self.max_pages == 0 {
            return Err(AtlasError::InvalidConfig("at least one page is required"));
        }
        if self.padding.saturating_mul(2) >= self.plot_width.min(self.plot_height) {
            return Err(AtlasError::InvalidConfig("padding leaves no room in a plot"));
        }
        Ok(())
    }
}

/// Configuration for the per-format glyph atlases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasManagerConfig {
    /// The coverage mask atlas.
    pub a8: AtlasConfig,
    /// The color atlas for RGBA glyphs.
    pub rgba: AtlasConfig,
    /// The color atlas for BGRA glyphs.
    pub bgra: AtlasConfig,
    /// Glyphs with a larger side are drawn as paths instead of being cached.
    pub max_glyph_size: u32,
}

impl AtlasManagerConfig {
    /// The configuration of the atlas holding `format` glyphs.
    pub fn atlas(&self, format: TextureFormat) -> AtlasConfig {
        match format {
            TextureFormat::A8 => self.a8,
            TextureFormat::Rgba8 => self.rgba,
            TextureFormat::Bgra8 => self.bgra,
        }
    }
}

impl Default for AtlasManagerConfig {
    fn default() -> Self {
        let color = AtlasConfig {
            page_width: 1024,
            page_height: 1024,
            plot_width: 256,
            plot_height: 256,
            ..AtlasConfig::default()
        };
        Self {
            a8: AtlasConfig::default(),
            rgba: color,
            bgra: color,
            max_glyph_size: 256,
        }
    }
}
