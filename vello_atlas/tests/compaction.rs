// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Aging, consolidation and page release.

use vello_atlas::atlas::{ATLAS_RECENTLY_USED_COUNT, PLOT_RECENTLY_USED_COUNT};
use vello_atlas::{Atlas, AtlasConfig, AtlasLocator, TextureFormat, TokenTracker};

use crate::util::{fill_plot, frame, small_atlas, small_config, MockBackend};

#[test]
fn unused_last_page_is_released() {
    let mut atlas = small_atlas();
    let mut backend = MockBackend::default();
    let mut tokens = TokenTracker::new();
    let first_page: Vec<AtlasLocator> = (0..4)
        .map(|_| fill_plot(&mut atlas, &mut backend, &mut tokens))
        .collect();
    let straggler = fill_plot(&mut atlas, &mut backend, &mut tokens);
    assert_eq!(straggler.page_index(), 1);

    // The straggler was last drawn in the first flush and ages from the second one on.
    for _ in 0..=PLOT_RECENTLY_USED_COUNT {
        frame(&mut atlas, &mut tokens, &first_page);
    }
    assert_eq!(atlas.num_active_pages(), 2);
    assert!(atlas.has_cell(&straggler));

    frame(&mut atlas, &mut tokens, &first_page);
    assert_eq!(atlas.num_active_pages(), 1);
    assert!(!atlas.has_cell(&straggler));
    assert!(first_page.iter().all(|cell| atlas.has_cell(cell)));
    assert_eq!(atlas.take_evicted_plots(), [straggler.plot]);
}

#[test]
fn content_used_in_the_last_flush_survives_consolidation() {
    let mut atlas = small_atlas();
    let mut backend = MockBackend::default();
    let mut tokens = TokenTracker::new();
    let first_page: Vec<AtlasLocator> = (0..4)
        .map(|_| fill_plot(&mut atlas, &mut backend, &mut tokens))
        .collect();
    let last_page = fill_plot(&mut atlas, &mut backend, &mut tokens);

    // Only the first cell of each page stays in use, so the other plots of the first page age
    // out and become available while the last page is sparse.
    let in_use = [first_page[0], last_page];
    for _ in 0..40 {
        frame(&mut atlas, &mut tokens, &in_use);
    }
    assert_eq!(atlas.num_active_pages(), 2);
    assert!(atlas.has_cell(&last_page));
    assert!(first_page.iter().all(|cell| atlas.has_cell(cell)));
    assert!(atlas.take_evicted_plots().is_empty());

    // Once the last page cell misses a flush it is drained into the least recently used of
    // the available plots.
    frame(&mut atlas, &mut tokens, &in_use[..1]);
    assert_eq!(atlas.num_active_pages(), 1);
    assert!(!atlas.has_cell(&last_page));
    assert!(!atlas.has_cell(&first_page[1]));
    assert!(atlas.has_cell(&first_page[0]));
    assert!(atlas.has_cell(&first_page[2]));
    assert!(atlas.has_cell(&first_page[3]));
    assert_eq!(
        atlas.take_evicted_plots(),
        [last_page.plot, first_page[1].plot]
    );
}

#[test]
fn idle_atlas_is_eventually_released() {
    let mut atlas = small_atlas();
    let mut backend = MockBackend::default();
    let mut tokens = TokenTracker::new();
    let cell = fill_plot(&mut atlas, &mut backend, &mut tokens);
    frame(&mut atlas, &mut tokens, &[]);

    // Without any use the atlas is only looked at after a long idle period, and then its
    // plots age one flush at a time.
    let idle = ATLAS_RECENTLY_USED_COUNT + PLOT_RECENTLY_USED_COUNT;
    for _ in 0..idle {
        frame(&mut atlas, &mut tokens, &[]);
    }
    assert_eq!(atlas.num_active_pages(), 1);
    assert!(atlas.has_cell(&cell));

    frame(&mut atlas, &mut tokens, &[]);
    assert_eq!(atlas.num_active_pages(), 0);
    assert_eq!(atlas.take_evicted_plots(), [cell.plot]);

    // Released pages come back on demand.
    let again = fill_plot(&mut atlas, &mut backend, &mut tokens);
    assert_eq!(again.page_index(), 0);
    assert_ne!(again.plot.gen_id, cell.plot.gen_id);
    assert_eq!(backend.created.len(), 2);
}

#[test]
fn plots_only_age_while_the_atlas_is_in_use() {
    let mut atlas = small_atlas();
    let mut backend = MockBackend::default();
    let mut tokens = TokenTracker::new();
    let busy = fill_plot(&mut atlas, &mut backend, &mut tokens);
    let quiet = fill_plot(&mut atlas, &mut backend, &mut tokens);
    frame(&mut atlas, &mut tokens, &[busy, quiet]);
    assert_eq!(atlas.previous_flush_token(), tokens.next_flush_token());
    let flushes = |atlas: &Atlas, cell: &AtlasLocator| {
        atlas.plot(&cell.plot).unwrap().flushes_since_last_used()
    };
    assert_eq!(flushes(&atlas, &quiet), 0);

    frame(&mut atlas, &mut tokens, &[busy]);
    assert_eq!((flushes(&atlas, &busy), flushes(&atlas, &quiet)), (0, 1));

    // A flush that does not touch the atlas leaves it alone.
    frame(&mut atlas, &mut tokens, &[]);
    assert_eq!((flushes(&atlas, &busy), flushes(&atlas, &quiet)), (0, 1));
}

/// Two pages of eight 16x16 plots, so a quarter of a page is two plots.
fn wide_atlas() -> Atlas {
    let config = AtlasConfig {
        page_width: 64,
        ..small_config()
    };
    Atlas::new(TextureFormat::A8, config).unwrap()
}

/// Fill the first page, put `stragglers` cells on the second one, and keep drawing the first
/// cell of each page long enough for the rest of the first page to age out.
fn sparse_last_page(
    atlas: &mut Atlas,
    tokens: &mut TokenTracker,
    stragglers: usize,
) -> (Vec<AtlasLocator>, Vec<AtlasLocator>) {
    let mut backend = MockBackend::default();
    let first_page: Vec<AtlasLocator> = (0..8)
        .map(|_| fill_plot(atlas, &mut backend, tokens))
        .collect();
    let last_page: Vec<AtlasLocator> = (0..stragglers)
        .map(|_| fill_plot(atlas, &mut backend, tokens))
        .collect();
    let in_use: Vec<AtlasLocator> = first_page[..1].iter().chain(&last_page).copied().collect();
    for _ in 0..40 {
        frame(atlas, tokens, &in_use);
    }
    assert_eq!(atlas.num_active_pages(), 2);
    assert!(atlas.take_evicted_plots().is_empty());
    (first_page, last_page)
}

#[test]
fn last_page_a_quarter_in_use_is_consolidated() {
    let mut atlas = wide_atlas();
    let mut tokens = TokenTracker::new();
    let (first_page, last_page) = sparse_last_page(&mut atlas, &mut tokens, 2);

    frame(&mut atlas, &mut tokens, &first_page[..1]);
    assert_eq!(atlas.num_active_pages(), 1);
    assert!(last_page.iter().all(|cell| !atlas.has_cell(cell)));
    assert_eq!(
        atlas.take_evicted_plots(),
        [
            last_page[1].plot,
            first_page[1].plot,
            last_page[0].plot,
            first_page[2].plot,
        ]
    );
}

#[test]
fn last_page_more_than_a_quarter_in_use_is_kept() {
    let mut atlas = wide_atlas();
    let mut tokens = TokenTracker::new();
    let (first_page, last_page) = sparse_last_page(&mut atlas, &mut tokens, 3);

    frame(&mut atlas, &mut tokens, &first_page[..1]);
    assert_eq!(atlas.num_active_pages(), 2);
    assert!(last_page.iter().all(|cell| atlas.has_cell(cell)));
    assert!(first_page.iter().all(|cell| atlas.has_cell(cell)));
    assert!(atlas.take_evicted_plots().is_empty());
}
