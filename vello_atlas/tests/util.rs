// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use vello_atlas::proxy::validate_upload;
use vello_atlas::{
    Atlas, AtlasConfig, AtlasError, AtlasLocator, AtlasManager, AtlasManagerConfig, AtlasRect,
    TextureBackend, TextureFormat, TextureProxy, TokenTracker,
};
use vello_picture::geometry::Path;
use vello_picture::glyph::{Font, GlyphFormat, GlyphId, GlyphImage, GlyphRasterParams, Typeface};
use vello_picture::kurbo::Rect;
use vello_picture::{Canvas, Picture, PictureRecorder};

/// Two pages of four 16x16 plots, without padding.
pub(crate) fn small_config() -> AtlasConfig {
    AtlasConfig {
        page_width: 32,
        page_height: 32,
        plot_width: 16,
        plot_height: 16,
        max_pages: 2,
        padding: 0,
    }
}

pub(crate) fn small_atlas() -> Atlas {
    Atlas::new(TextureFormat::A8, small_config()).unwrap()
}

/// A manager whose atlases all use [`small_config`].
pub(crate) fn small_manager() -> AtlasManager {
    AtlasManager::new(AtlasManagerConfig {
        a8: small_config(),
        rgba: small_config(),
        bgra: small_config(),
        max_glyph_size: 16,
    })
    .unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Write {
    pub(crate) texture: u64,
    pub(crate) rect: AtlasRect,
    pub(crate) len: usize,
}

/// Hands out proxies without GPU objects and logs every upload.
#[derive(Debug, Default)]
pub(crate) struct MockBackend {
    pub(crate) created: Vec<TextureProxy>,
    pub(crate) writes: Vec<Write>,
    pub(crate) fail_writes: bool,
}

impl TextureBackend for MockBackend {
    fn create_texture_proxy(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Option<TextureProxy> {
        let proxy = TextureProxy::new(width, height, format, Arc::new(()));
        self.created.push(proxy.clone());
        Some(proxy)
    }

    fn write_pixels(
        &mut self,
        target: &TextureProxy,
        rect: AtlasRect,
        pixels: &[u8],
        row_bytes: u32,
    ) -> Result<(), AtlasError> {
        validate_upload(target, &rect, pixels, row_bytes)?;
        if self.fail_writes {
            return Err(AtlasError::UploadFailed("device lost"));
        }
        self.writes.push(Write {
            texture: target.id(),
            rect,
            len: pixels.len(),
        });
        Ok(())
    }
}

/// Glyph `n` is an `n` by `n` square sitting on the baseline, whatever the size. Glyph 0 is
/// empty.
#[derive(Debug)]
pub(crate) struct Squares {
    pub(crate) color: bool,
}

impl Typeface for Squares {
    fn unique_id(&self) -> u64 {
        if self.color {
            101
        } else {
            100
        }
    }

    fn has_color(&self) -> bool {
        self.color
    }

    fn glyph_bounds(&self, glyph: GlyphId, _: f32) -> Rect {
        let side = f64::from(glyph);
        Rect::new(0.0, -side, side, 0.0)
    }

    fn glyph_path(&self, glyph: GlyphId, size: f32) -> Option<Path> {
        Some(Path::from_rect(&self.glyph_bounds(glyph, size)))
    }

    fn rasterize_glyph(&self, glyph: GlyphId, _: &GlyphRasterParams) -> Option<GlyphImage> {
        if glyph == 0 {
            return None;
        }
        let side = u32::from(glyph);
        let format = if self.color {
            GlyphFormat::Rgba8
        } else {
            GlyphFormat::Alpha8
        };
        let len = (side * side * format.bytes_per_pixel()) as usize;
        Some(GlyphImage {
            width: side,
            height: side,
            left: 0,
            top: -i32::from(glyph),
            format,
            pixels: vec![0xff; len],
        })
    }
}

pub(crate) fn mask_font(size: f32) -> Font {
    Font::new(Arc::new(Squares { color: false }), size)
}

pub(crate) fn color_font(size: f32) -> Font {
    Font::new(Arc::new(Squares { color: true }), size)
}

/// Rasterization parameters of an unscaled draw with `font`.
pub(crate) fn plain_params(font: &Font) -> GlyphRasterParams {
    GlyphRasterParams {
        size: font.size,
        faux_bold: font.faux_bold,
        faux_italic: font.faux_italic,
        stroke_width: None,
    }
}

/// Reserve a whole plot of the small atlas and draw it once.
pub(crate) fn fill_plot(
    atlas: &mut Atlas,
    backend: &mut MockBackend,
    tokens: &mut TokenTracker,
) -> AtlasLocator {
    let locator = atlas
        .add_to_atlas(backend, tokens, 16, 16)
        .locator()
        .expect("the atlas should have room");
    atlas.set_last_use_token(&locator, tokens.issue_draw_token());
    locator
}

/// Draw `used` once, flush and compact.
pub(crate) fn frame(atlas: &mut Atlas, tokens: &mut TokenTracker, used: &[AtlasLocator]) {
    for cell in used {
        atlas.set_last_use_token(cell, tokens.issue_draw_token());
    }
    let start = tokens.issue_flush_token();
    atlas.compact(start);
}

/// Record a picture by drawing into a fresh canvas.
pub(crate) fn record(draw: impl FnOnce(&mut Canvas<'_>)) -> Arc<Picture> {
    let mut recorder = PictureRecorder::new();
    {
        let mut canvas = recorder.begin_recording();
        draw(&mut canvas);
        assert_eq!(canvas.status(), Ok(()), "recording should never fail");
    }
    recorder
        .finish_recording_as_picture()
        .expect("the recording should contain draws")
}
