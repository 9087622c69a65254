// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Where rasterized glyphs live in the atlases, per font configuration.

use hashbrown::HashMap;
use vello_picture::glyph::{GlyphId, GlyphRasterParams};
use vello_picture::kurbo::{Point, Rect};

use crate::plot::{AtlasLocator, PlotLocator};
use crate::proxy::TextureFormat;

/// Identifies a set of glyphs rasterized the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StrikeKey {
    typeface: u64,
    size_bits: u32,
    stroke_bits: Option<u32>,
    faux_bold: bool,
    faux_italic: bool,
}

impl StrikeKey {
    /// The strike of `typeface` rendered with `params`.
    pub fn new(typeface: u64, params: &GlyphRasterParams) -> Self {
        Self {
            typeface,
            size_bits: params.size.to_bits(),
            stroke_bits: params.stroke_width.map(f32::to_bits),
            faux_bold: params.faux_bold,
            faux_italic: params.faux_italic,
        }
    }

    /// The typeface identifier.
    pub fn typeface(&self) -> u64 {
        self.typeface
    }
}

/// A glyph placed in an atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedGlyph {
    /// The atlas cell holding the glyph image.
    pub locator: AtlasLocator,
    /// The format of the atlas holding it.
    pub format: TextureFormat,
    /// Offset from the glyph origin to the left edge of the image.
    pub left: i32,
    /// Offset from the glyph origin to the top edge of the image.
    pub top: i32,
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
}

impl CachedGlyph {
    /// Where the glyph image lands when its origin is at `origin`.
    pub fn device_rect(&self, origin: Point) -> Rect {
        let x = origin.x + f64::from(self.left);
        let y = origin.y + f64::from(self.top);
        Rect::new(x, y, x + f64::from(self.width), y + f64::from(self.height))
    }
}

/// The cached glyphs of one strike.
#[derive(Clone, Debug, Default)]
pub struct Strike {
    glyphs: HashMap<GlyphId, CachedGlyph>,
}

impl Strike {
    /// Number of cached glyphs.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Returns `true` if no glyph is cached.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Glyph placements for every strike in use.
#[derive(Debug, Default)]
pub struct StrikeCache {
    strikes: HashMap<StrikeKey, Strike>,
    entry_count: usize,
    /// Number of cache hits since last `clear_stats()`.
    hits: u64,
    /// Number of cache misses since last `clear_stats()`.
    misses: u64,
}

impl StrikeCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a glyph. Entries rejected by `is_valid` are dropped and count as misses.
    pub fn lookup(
        &mut self,
        key: &StrikeKey,
        glyph: GlyphId,
        is_valid: impl FnOnce(&CachedGlyph) -> bool,
    ) -> Option<CachedGlyph> {
        let Some(strike) = self.strikes.get_mut(key) else {
            self.misses += 1;
            return None;
        };
        match strike.glyphs.get(&glyph).copied() {
            Some(cached) if is_valid(&cached) => {
                self.hits += 1;
                Some(cached)
            }
            Some(_) => {
                strike.glyphs.remove(&glyph);
                if strike.is_empty() {
                    self.strikes.remove(key);
                }
                self.entry_count -= 1;
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Remember where a glyph was placed.
    pub fn insert(&mut self, key: StrikeKey, glyph: GlyphId, cached: CachedGlyph) {
        let strike = self.strikes.entry(key).or_default();
        if strike.glyphs.insert(glyph, cached).is_none() {
            self.entry_count += 1;
        }
    }

    /// Forget one glyph.
    pub fn remove(&mut self, key: &StrikeKey, glyph: GlyphId) -> Option<CachedGlyph> {
        let strike = self.strikes.get_mut(key)?;
        let removed = strike.glyphs.remove(&glyph)?;
        if strike.is_empty() {
            self.strikes.remove(key);
        }
        self.entry_count -= 1;
        Some(removed)
    }

    /// Forget every glyph stored in the given plot generation. Returns the number dropped.
    pub fn purge_plot(&mut self, format: TextureFormat, plot: &PlotLocator) -> usize {
        let before = self.entry_count;
        let entry_count = &mut self.entry_count;
        self.strikes.retain(|_, strike| {
            strike.glyphs.retain(|_, cached| {
                let stale = cached.format == format && cached.locator.plot == *plot;
                if stale {
                    *entry_count -= 1;
                }
                !stale
            });
            !strike.is_empty()
        });
        before - self.entry_count
    }

    /// The strike for `key`, if any glyph of it is cached.
    pub fn strike(&self, key: &StrikeKey) -> Option<&Strike> {
        self.strikes.get(key)
    }

    /// Drop every entry and reset the statistics.
    pub fn clear(&mut self) {
        self.strikes.clear();
        self.entry_count = 0;
        self.clear_stats();
    }

    /// Number of cached glyphs.
    pub fn len(&self) -> usize {
        self.entry_count
    }

    /// Returns `true` if no glyph is cached.
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Number of strikes with cached glyphs.
    pub fn num_strikes(&self) -> usize {
        self.strikes.len()
    }

    /// Get the number of cache hits since last `clear_stats()`.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Get the number of cache misses since last `clear_stats()`.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Clear the cache statistics.
    pub fn clear_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }
}
