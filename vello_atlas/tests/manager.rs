// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph caching across flushes.

use vello_atlas::atlas::PLOT_RECENTLY_USED_COUNT;
use vello_atlas::{AtlasError, AtlasManager, CachedGlyph, TextureFormat};
use vello_picture::glyph::{Font, GlyphId};

use crate::util::{color_font, mask_font, plain_params, small_manager, MockBackend};

/// Cache `glyphs`, each large enough to take a plot of its own.
fn add_all(
    manager: &mut AtlasManager,
    backend: &mut MockBackend,
    font: &Font,
    glyphs: impl IntoIterator<Item = GlyphId>,
) -> Vec<CachedGlyph> {
    glyphs
        .into_iter()
        .map(|glyph| {
            manager
                .add_glyph(backend, font, glyph, &plain_params(font))
                .unwrap()
                .unwrap()
        })
        .collect()
}

fn draw(manager: &mut AtlasManager, glyphs: &[CachedGlyph]) {
    let token = manager.tokens_mut().issue_draw_token();
    for glyph in glyphs {
        manager.set_last_use_token(glyph, token);
    }
}

#[test]
fn full_atlas_reports_until_flushed() {
    let mut manager = small_manager();
    let mut backend = MockBackend::default();
    let font = mask_font(12.0);
    let cached = add_all(&mut manager, &mut backend, &font, 9..=16);
    draw(&mut manager, &cached);
    assert_eq!(manager.num_active_pages(TextureFormat::A8), 2);

    let bigger = mask_font(13.0);
    assert_eq!(
        manager.add_glyph(&mut backend, &bigger, 9, &plain_params(&bigger)),
        Err(AtlasError::AtlasFull)
    );

    manager.flush(&mut backend).unwrap();
    assert_eq!(backend.writes.len(), 8);
    let placed = manager
        .add_glyph(&mut backend, &bigger, 9, &plain_params(&bigger))
        .unwrap()
        .unwrap();
    // The oldest glyph lost its plot and is gone from the cache.
    assert_eq!(placed.locator.plot.plot_index, cached[0].locator.plot.plot_index);
    assert_eq!(manager.get_glyph(&font, 9, &plain_params(&font)), None);
    assert_eq!(
        manager.get_glyph(&font, 10, &plain_params(&font)),
        Some(cached[1])
    );
    assert_eq!(manager.strikes().len(), 8);
}

#[test]
fn uploads_into_reclaimed_cells_are_dropped() {
    let mut manager = small_manager();
    let mut backend = MockBackend::default();
    let font = mask_font(12.0);
    // Never drawn, so their plots can be reclaimed before the first flush.
    let cached = add_all(&mut manager, &mut backend, &font, 9..=16);
    let replacement = add_all(&mut manager, &mut backend, &mask_font(20.0), [9]);
    assert_eq!(manager.num_pending_uploads(), 9);
    assert!(!manager.has_cell(TextureFormat::A8, &cached[0].locator));

    manager.flush(&mut backend).unwrap();
    assert_eq!(backend.writes.len(), 8);
    // Only the replacement is written where the first glyph used to be.
    let into_cell = backend
        .writes
        .iter()
        .filter(|write| write.rect == cached[0].locator.rect)
        .count();
    assert_eq!(into_cell, 1);
    assert_eq!(replacement[0].locator.rect, cached[0].locator.rect);
}

#[test]
fn released_pages_purge_their_glyphs() {
    let mut manager = small_manager();
    let mut backend = MockBackend::default();
    let font = mask_font(12.0);
    let cached = add_all(&mut manager, &mut backend, &font, 9..=13);
    assert_eq!(cached[4].locator.page_index(), 1);
    draw(&mut manager, &cached);
    manager.flush(&mut backend).unwrap();

    for _ in 0..PLOT_RECENTLY_USED_COUNT {
        draw(&mut manager, &cached[..4]);
        manager.flush(&mut backend).unwrap();
    }
    assert_eq!(manager.num_active_pages(TextureFormat::A8), 2);
    assert_eq!(manager.strikes().len(), 5);

    draw(&mut manager, &cached[..4]);
    manager.flush(&mut backend).unwrap();
    assert_eq!(manager.num_active_pages(TextureFormat::A8), 1);
    assert_eq!(manager.get_glyph(&font, 13, &plain_params(&font)), None);
    assert_eq!(manager.strikes().len(), 4);
}

#[test]
fn color_glyphs_use_their_own_atlas() {
    let mut manager = small_manager();
    let mut backend = MockBackend::default();
    let mask = mask_font(12.0);
    let color = color_font(12.0);
    let glyphs = add_all(&mut manager, &mut backend, &mask, [4]);
    let emoji = add_all(&mut manager, &mut backend, &color, [4]);
    assert_eq!(glyphs[0].format, TextureFormat::A8);
    assert_eq!(emoji[0].format, TextureFormat::Rgba8);
    assert_eq!(manager.num_active_pages(TextureFormat::A8), 1);
    assert_eq!(manager.num_active_pages(TextureFormat::Rgba8), 1);
    assert_eq!(manager.num_active_pages(TextureFormat::Bgra8), 0);
    assert_eq!(manager.strikes().num_strikes(), 2);

    manager.flush(&mut backend).unwrap();
    let lengths: Vec<usize> = backend.writes.iter().map(|write| write.len).collect();
    assert_eq!(lengths, [16, 64]);
    let formats: Vec<TextureFormat> = backend.created.iter().map(|proxy| proxy.format()).collect();
    assert_eq!(formats, [TextureFormat::A8, TextureFormat::Rgba8]);
    assert_eq!(backend.writes[1].texture, backend.created[1].id());
}

#[test]
fn failed_uploads_are_forgotten() {
    let mut manager = small_manager();
    let mut backend = MockBackend {
        fail_writes: true,
        ..MockBackend::default()
    };
    let font = mask_font(12.0);
    add_all(&mut manager, &mut backend, &font, [3, 4]);
    assert_eq!(
        manager.flush(&mut backend),
        Err(AtlasError::UploadFailed("device lost"))
    );
    assert!(manager.strikes().is_empty());
    assert_eq!(manager.num_pending_uploads(), 0);

    // The next attempt rasterizes again.
    backend.fail_writes = false;
    add_all(&mut manager, &mut backend, &font, [3]);
    manager.flush(&mut backend).unwrap();
    assert_eq!(backend.writes.len(), 1);
    assert_eq!(manager.strikes().len(), 1);
}

#[test]
fn lookups_are_counted() {
    let mut manager = small_manager();
    let mut backend = MockBackend::default();
    let font = mask_font(12.0);
    add_all(&mut manager, &mut backend, &font, [3, 3, 3]);
    assert_eq!(manager.strikes().hits(), 2);
    assert_eq!(manager.strikes().misses(), 1);
}
