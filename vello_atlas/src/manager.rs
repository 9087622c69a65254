// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph caching across the per-format atlases.

use log::{debug, warn};
use vello_picture::glyph::{Font, GlyphId, GlyphImage, GlyphRasterParams};

use crate::atlas::Atlas;
use crate::config::AtlasManagerConfig;
use crate::error::{AddResult, AtlasError};
use crate::plot::AtlasLocator;
use crate::proxy::{TextureBackend, TextureFormat};
use crate::strike::{CachedGlyph, StrikeCache, StrikeKey};
use crate::token::{AtlasToken, TokenTracker};

const FORMATS: [TextureFormat; 3] = [
    TextureFormat::A8,
    TextureFormat::Rgba8,
    TextureFormat::Bgra8,
];

fn format_index(format: TextureFormat) -> usize {
    match format {
        TextureFormat::A8 => 0,
        TextureFormat::Rgba8 => 1,
        TextureFormat::Bgra8 => 2,
    }
}

/// The atlas for `format`, created on first use.
fn atlas_slot<'a>(
    atlases: &'a mut [Option<Atlas>; 3],
    config: &AtlasManagerConfig,
    format: TextureFormat,
) -> Result<&'a mut Atlas, AtlasError> {
    let slot = &mut atlases[format_index(format)];
    let atlas = match slot.take() {
        Some(atlas) => atlas,
        None => Atlas::new(format, config.atlas(format))?,
    };
    Ok(slot.insert(atlas))
}

/// Glyph pixels waiting to be written to their atlas cell.
#[derive(Debug)]
struct PendingUpload {
    key: StrikeKey,
    glyph: GlyphId,
    format: TextureFormat,
    locator: AtlasLocator,
    pixels: Vec<u8>,
    row_bytes: u32,
}

/// Owns the glyph atlases, the strike cache and the token clock that ages them.
///
/// Glyphs are rasterized and placed on demand; their pixels reach the GPU on the next
/// [`flush`](Self::flush), which then compacts every atlas.
#[derive(Debug)]
pub struct AtlasManager {
    config: AtlasManagerConfig,
    atlases: [Option<Atlas>; 3],
    strikes: StrikeCache,
    tokens: TokenTracker,
    pending: Vec<PendingUpload>,
}

impl AtlasManager {
    /// A manager without any page allocated yet.
    pub fn new(config: AtlasManagerConfig) -> Result<Self, AtlasError> {
        for format in FORMATS {
            config.atlas(format).validate()?;
        }
        if config.max_glyph_size == 0 {
            return Err(AtlasError::InvalidConfig("glyphs must be allowed some size"));
        }
        Ok(Self {
            config,
            atlases: [None, None, None],
            strikes: StrikeCache::new(),
            tokens: TokenTracker::new(),
            pending: Vec::new(),
        })
    }

    /// The configuration the manager was created with.
    pub fn config(&self) -> &AtlasManagerConfig {
        &self.config
    }

    /// The atlas a rasterized glyph is stored in.
    pub fn format_for_glyph(image: &GlyphImage) -> TextureFormat {
        image.format.into()
    }

    /// The atlas for `format`, if it was ever used.
    pub fn atlas(&self, format: TextureFormat) -> Option<&Atlas> {
        self.atlases[format_index(format)].as_ref()
    }

    /// The glyph placements.
    pub fn strikes(&self) -> &StrikeCache {
        &self.strikes
    }

    /// The draw and flush clock.
    pub fn tokens(&self) -> &TokenTracker {
        &self.tokens
    }

    /// The draw and flush clock, for issuing draw tokens.
    pub fn tokens_mut(&mut self) -> &mut TokenTracker {
        &mut self.tokens
    }

    /// Number of glyph uploads waiting for the next flush.
    pub fn num_pending_uploads(&self) -> usize {
        self.pending.len()
    }

    /// Number of active pages of the `format` atlas.
    pub fn num_active_pages(&self, format: TextureFormat) -> usize {
        self.atlas(format).map_or(0, Atlas::num_active_pages)
    }

    /// Returns `true` if `locator` still names its content in the `format` atlas.
    pub fn has_cell(&self, format: TextureFormat, locator: &AtlasLocator) -> bool {
        self.atlas(format)
            .is_some_and(|atlas| atlas.has_cell(locator))
    }

    /// Record a draw of a cached glyph.
    pub fn set_last_use_token(&mut self, glyph: &CachedGlyph, token: AtlasToken) {
        if let Some(atlas) = self.atlases[format_index(glyph.format)].as_mut() {
            atlas.set_last_use_token(&glyph.locator, token);
        }
    }

    /// The cached placement of a glyph, if it is still in its atlas.
    pub fn get_glyph(
        &mut self,
        font: &Font,
        glyph: GlyphId,
        params: &GlyphRasterParams,
    ) -> Option<CachedGlyph> {
        let key = StrikeKey::new(font.typeface.unique_id(), params);
        let atlases = &self.atlases;
        self.strikes.lookup(&key, glyph, |cached| {
            atlases[format_index(cached.format)]
                .as_ref()
                .is_some_and(|atlas| atlas.has_cell(&cached.locator))
        })
    }

    /// The placement of a glyph, rasterizing and placing it when it is not cached.
    ///
    /// Returns `None` for glyphs without pixels. Glyphs larger than the configured maximum or
    /// than a plot are [`AtlasError::CellTooLarge`]; [`AtlasError::AtlasFull`] means no space can
    /// be reclaimed before the next flush.
    pub fn add_glyph(
        &mut self,
        backend: &mut dyn TextureBackend,
        font: &Font,
        glyph: GlyphId,
        params: &GlyphRasterParams,
    ) -> Result<Option<CachedGlyph>, AtlasError> {
        if let Some(cached) = self.get_glyph(font, glyph, params) {
            return Ok(Some(cached));
        }
        let Some(image) = font.typeface.rasterize_glyph(glyph, params) else {
            return Ok(None);
        };
        if image.width == 0 || image.height == 0 {
            return Ok(None);
        }
        if image.width.max(image.height) > self.config.max_glyph_size {
            return Err(AtlasError::CellTooLarge {
                width: image.width,
                height: image.height,
            });
        }

        let format = Self::format_for_glyph(&image);
        let atlas = atlas_slot(&mut self.atlases, &self.config, format)?;
        let locator = match atlas.add_to_atlas(backend, &self.tokens, image.width, image.height) {
            AddResult::Succeeded(locator) => locator,
            AddResult::TryAgain => return Err(AtlasError::AtlasFull),
            AddResult::Error(err) => return Err(err),
        };
        for plot in atlas.take_evicted_plots() {
            self.strikes.purge_plot(format, &plot);
        }

        let key = StrikeKey::new(font.typeface.unique_id(), params);
        let cached = CachedGlyph {
            locator,
            format,
            left: image.left,
            top: image.top,
            width: image.width,
            height: image.height,
        };
        self.strikes.insert(key, glyph, cached);
        self.pending.push(PendingUpload {
            key,
            glyph,
            format,
            locator,
            row_bytes: image.row_bytes(),
            pixels: image.pixels,
        });
        Ok(Some(cached))
    }

    /// Upload pending glyphs, close the flush interval and compact every atlas.
    ///
    /// Uploads into cells that were evicted in the meantime are dropped. A failed upload removes
    /// its glyph from the cache; the first failure is returned after the flush completes.
    pub fn flush(&mut self, backend: &mut dyn TextureBackend) -> Result<(), AtlasError> {
        let mut result = Ok(());
        for upload in self.pending.drain(..) {
            let Some(atlas) = self.atlases[format_index(upload.format)].as_ref() else {
                continue;
            };
            let texture = atlas
                .page_texture(upload.locator.page_index())
                .filter(|_| atlas.has_cell(&upload.locator));
            let Some(texture) = texture else {
                warn!(
                    "dropping upload of glyph {} into evicted atlas cell {:?}",
                    upload.glyph, upload.locator
                );
                continue;
            };
            let written = backend.write_pixels(
                texture,
                upload.locator.rect,
                &upload.pixels,
                upload.row_bytes,
            );
            if let Err(err) = written {
                warn!("failed to upload glyph {}: {err}", upload.glyph);
                self.strikes.remove(&upload.key, upload.glyph);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        let start = self.tokens.issue_flush_token();
        for atlas in self.atlases.iter_mut().flatten() {
            atlas.compact(start);
            let format = atlas.format();
            let mut purged = 0;
            for plot in atlas.take_evicted_plots() {
                purged += self.strikes.purge_plot(format, &plot);
            }
            if purged > 0 {
                debug!("purged {purged} cached {format:?} glyphs after compaction");
            }
        }
        result
    }

    /// Drop every atlas page, cached glyph and pending upload.
    pub fn release_all(&mut self) {
        self.atlases = [None, None, None];
        self.strikes.clear();
        self.pending.clear();
        debug!("released all glyph atlases");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vello_picture::geometry::Path;
    use vello_picture::glyph::{GlyphFormat, Typeface};
    use vello_picture::kurbo::Rect;

    use super::*;
    use crate::plot::AtlasRect;
    use crate::proxy::TextureProxy;

    /// Glyph `n` is an `n` by `n` coverage square; glyph 0 is empty.
    struct Squares;

    impl Typeface for Squares {
        fn unique_id(&self) -> u64 {
            42
        }

        fn glyph_bounds(&self, glyph: GlyphId, _: f32) -> Rect {
            Rect::new(0.0, -f64::from(glyph), f64::from(glyph), 0.0)
        }

        fn glyph_path(&self, glyph: GlyphId, size: f32) -> Option<Path> {
            Some(Path::from_rect(&self.glyph_bounds(glyph, size)))
        }

        fn rasterize_glyph(&self, glyph: GlyphId, _: &GlyphRasterParams) -> Option<GlyphImage> {
            let side = u32::from(glyph);
            (side > 0).then(|| GlyphImage {
                width: side,
                height: side,
                left: 0,
                top: -i32::from(glyph),
                format: GlyphFormat::Alpha8,
                pixels: vec![0xff; (side * side) as usize],
            })
        }
    }

    #[derive(Debug, Default)]
    struct RecordingBackend {
        writes: Vec<AtlasRect>,
    }

    impl TextureBackend for RecordingBackend {
        fn create_texture_proxy(
            &mut self,
            width: u32,
            height: u32,
            format: TextureFormat,
        ) -> Option<TextureProxy> {
            Some(TextureProxy::new(width, height, format, Arc::new(())))
        }

        fn write_pixels(
            &mut self,
            target: &TextureProxy,
            rect: AtlasRect,
            pixels: &[u8],
            row_bytes: u32,
        ) -> Result<(), AtlasError> {
            crate::proxy::validate_upload(target, &rect, pixels, row_bytes)?;
            self.writes.push(rect);
            Ok(())
        }
    }

    fn params() -> GlyphRasterParams {
        GlyphRasterParams {
            size: 16.0,
            faux_bold: false,
            faux_italic: false,
            stroke_width: None,
        }
    }

    #[test]
    fn glyphs_are_cached_and_uploaded_on_flush() {
        let mut manager = AtlasManager::new(AtlasManagerConfig::default()).unwrap();
        let mut backend = RecordingBackend::default();
        let font = Font::new(Arc::new(Squares), 16.0);
        let first = manager
            .add_glyph(&mut backend, &font, 5, &params())
            .unwrap()
            .unwrap();
        let again = manager
            .add_glyph(&mut backend, &font, 5, &params())
            .unwrap()
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(manager.num_pending_uploads(), 1);
        assert_eq!(manager.num_active_pages(TextureFormat::A8), 1);
        assert_eq!(manager.num_active_pages(TextureFormat::Rgba8), 0);
        manager.flush(&mut backend).unwrap();
        assert_eq!(backend.writes, [first.locator.rect]);
        assert_eq!(manager.num_pending_uploads(), 0);
    }

    #[test]
    fn empty_and_oversized_glyphs_are_not_cached() {
        let config = AtlasManagerConfig {
            max_glyph_size: 8,
            ..AtlasManagerConfig::default()
        };
        let mut manager = AtlasManager::new(config).unwrap();
        let mut backend = RecordingBackend::default();
        let font = Font::new(Arc::new(Squares), 16.0);
        assert_eq!(manager.add_glyph(&mut backend, &font, 0, &params()), Ok(None));
        assert!(matches!(
            manager.add_glyph(&mut backend, &font, 9, &params()),
            Err(AtlasError::CellTooLarge { .. })
        ));
        assert!(manager.strikes().is_empty());
        assert_eq!(manager.num_active_pages(TextureFormat::A8), 0);
    }

    #[test]
    fn release_all_forgets_everything() {
        let mut manager = AtlasManager::new(AtlasManagerConfig::default()).unwrap();
        let mut backend = RecordingBackend::default();
        let font = Font::new(Arc::new(Squares), 16.0);
        let cached = manager
            .add_glyph(&mut backend, &font, 3, &params())
            .unwrap()
            .unwrap();
        manager.release_all();
        assert!(!manager.has_cell(TextureFormat::A8, &cached.locator));
        assert_eq!(manager.get_glyph(&font, 3, &params()), None);
        manager.flush(&mut backend).unwrap();
        assert!(backend.writes.is_empty());
    }
}
