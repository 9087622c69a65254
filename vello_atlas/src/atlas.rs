// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A growable set of pages for one texture format.

use log::{debug, trace, warn};
use smallvec::SmallVec;

use crate::config::AtlasConfig;
use crate::error::{AddResult, AtlasError};
use crate::page::Page;
use crate::plot::{AtlasLocator, Plot, PlotLocator};
use crate::proxy::{TextureBackend, TextureFormat, TextureProxy};
use crate::token::{AtlasToken, TokenTracker};

/// Flushes without use after which a plot's content may be reclaimed by compaction.
pub const PLOT_RECENTLY_USED_COUNT: u32 = 32;

/// Flushes without any use after which an idle atlas is compacted anyway.
pub const ATLAS_RECENTLY_USED_COUNT: u32 = 128;

type PlotIndices = SmallVec<[usize; 16]>;

/// Packs cells of one format into pages of plots.
///
/// Pages are only ever appended and removed from the end. Cells are found again through
/// [`AtlasLocator`]s, which must be revalidated with [`has_cell`](Self::has_cell) since plots
/// are reclaimed when they age out or when space is needed.
#[derive(Debug)]
pub struct Atlas {
    format: TextureFormat,
    config: AtlasConfig,
    pages: Vec<Page>,
    previous_flush_token: AtlasToken,
    flushes_since_last_use: u32,
    next_gen_id: u64,
    evicted: Vec<PlotLocator>,
}

impl Atlas {
    /// An atlas without any active page.
    pub fn new(format: TextureFormat, config: AtlasConfig) -> Result<Self, AtlasError> {
        config.validate()?;
        Ok(Self {
            format,
            config,
            pages: Vec::new(),
            previous_flush_token: AtlasToken::INVALID,
            flushes_since_last_use: 0,
            next_gen_id: 1,
            evicted: Vec::new(),
        })
    }

    /// The texture format of every page.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// The configuration the atlas was created with.
    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Number of pages with a texture.
    pub fn num_active_pages(&self) -> usize {
        self.pages.len()
    }

    /// The page at `index`.
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// The texture of the page at `index`.
    pub fn page_texture(&self, index: usize) -> Option<&TextureProxy> {
        self.pages.get(index).map(Page::texture)
    }

    /// The start of the flush interval the last compaction closed.
    pub fn previous_flush_token(&self) -> AtlasToken {
        self.previous_flush_token
    }

    /// The plot currently holding the generation named by `locator`.
    pub fn plot(&self, locator: &PlotLocator) -> Option<&Plot> {
        self.pages
            .get(locator.page_index)?
            .plot(locator.plot_index)
            .filter(|plot| plot.gen_id() == locator.gen_id)
    }

    /// Returns `true` if the cell at `locator` still holds the content it was made for.
    pub fn has_cell(&self, locator: &AtlasLocator) -> bool {
        self.plot(&locator.plot).is_some()
    }

    /// Record a draw of the cell at `locator`, which also makes its plot the most recently used.
    ///
    /// Stale locators are ignored.
    pub fn set_last_use_token(&mut self, locator: &AtlasLocator, token: AtlasToken) {
        let plot = locator.plot;
        let Some(page) = self.pages.get_mut(plot.page_index) else {
            return;
        };
        match page.plot_mut(plot.plot_index) {
            Some(current) if current.gen_id() == plot.gen_id => {
                current.set_last_use_token(token);
                page.make_mru(plot.plot_index);
            }
            _ => {}
        }
    }

    /// Locators of plots whose content was dropped since the last call.
    pub fn take_evicted_plots(&mut self) -> Vec<PlotLocator> {
        std::mem::take(&mut self.evicted)
    }

    fn fits_plot(&self, width: u32, height: u32) -> bool {
        let border = self.config.padding.saturating_mul(2);
        width > 0
            && height > 0
            && width.saturating_add(border) <= self.config.plot_width
            && height.saturating_add(border) <= self.config.plot_height
    }

    /// Reserve a `width` by `height` cell.
    ///
    /// Active pages are tried first. When no more pages can be activated, the least recently
    /// used plot of the first page whose tail is not needed by the upcoming flush is evicted and
    /// reused; if every tail is needed the result is [`AddResult::TryAgain`].
    pub fn add_to_atlas(
        &mut self,
        backend: &mut dyn TextureBackend,
        tokens: &TokenTracker,
        width: u32,
        height: u32,
    ) -> AddResult {
        if !self.fits_plot(width, height) {
            return AddResult::Error(AtlasError::CellTooLarge { width, height });
        }
        for page_index in 0..self.pages.len() {
            if let Some(locator) = self.add_to_page(page_index, width, height) {
                return AddResult::Succeeded(locator);
            }
        }

        if self.pages.len() >= self.config.max_pages {
            let next_flush = tokens.next_flush_token();
            for page_index in 0..self.pages.len() {
                let Some(plot_index) = self.pages[page_index].lru_plot() else {
                    continue;
                };
                if self.pages[page_index].plots()[plot_index].last_use_token() >= next_flush {
                    continue;
                }
                self.evict_plot(page_index, plot_index);
                let page = &mut self.pages[page_index];
                if let Some(rect) = page
                    .plot_mut(plot_index)
                    .and_then(|plot| plot.add_rect(width, height))
                {
                    page.make_mru(plot_index);
                    return AddResult::Succeeded(AtlasLocator {
                        plot: page.plots()[plot_index].locator(),
                        rect,
                    });
                }
            }
            return AddResult::TryAgain;
        }

        if let Err(err) = self.activate_new_page(backend) {
            return AddResult::Error(err);
        }
        match self.add_to_page(self.pages.len() - 1, width, height) {
            Some(locator) => AddResult::Succeeded(locator),
            None => AddResult::Error(AtlasError::CellTooLarge { width, height }),
        }
    }

    fn add_to_page(&mut self, page_index: usize, width: u32, height: u32) -> Option<AtlasLocator> {
        let page = &mut self.pages[page_index];
        let (plot_index, rect) = page.add_rect(width, height)?;
        Some(AtlasLocator {
            plot: page.plots()[plot_index].locator(),
            rect,
        })
    }

    fn alloc_gen_id(&mut self) -> u64 {
        let id = self.next_gen_id;
        self.next_gen_id += 1;
        id
    }

    fn activate_new_page(&mut self, backend: &mut dyn TextureBackend) -> Result<(), AtlasError> {
        let (width, height) = (self.config.page_width, self.config.page_height);
        let Some(texture) = backend.create_texture_proxy(width, height, self.format) else {
            warn!(
                "failed to create a {width}x{height} {:?} atlas page texture",
                self.format
            );
            return Err(AtlasError::TextureCreationFailed { width, height });
        };
        let index = self.pages.len();
        let config = self.config;
        let page = Page::new(index, &config, texture, || self.alloc_gen_id());
        self.pages.push(page);
        debug!(
            "activated {:?} atlas page {index} ({} of {} pages)",
            self.format,
            self.pages.len(),
            self.config.max_pages
        );
        Ok(())
    }

    /// Drop the content of a plot and move it to a fresh generation.
    fn evict_plot(&mut self, page_index: usize, plot_index: usize) {
        let gen_id = self.alloc_gen_id();
        let Some(plot) = self
            .pages
            .get_mut(page_index)
            .and_then(|page| page.plot_mut(plot_index))
        else {
            return;
        };
        if plot.has_content() {
            let locator = plot.locator();
            trace!("evicting {:?} atlas plot {locator:?}", self.format);
            self.evicted.push(locator);
        }
        plot.reset_rects(gen_id);
    }

    /// Release the last page and its texture.
    ///
    /// This is the only way the page count shrinks.
    pub fn deactivate_last_page(&mut self) {
        let Some(page) = self.pages.pop() else {
            return;
        };
        for plot in page.plots() {
            if plot.has_content() {
                self.evicted.push(plot.locator());
            }
        }
        debug!(
            "deactivated {:?} atlas page {}",
            self.format,
            self.pages.len()
        );
    }

    /// Age plots by one flush and reclaim what is no longer used.
    ///
    /// `start` is the first token of the flush after the one that just completed; draws of the
    /// completed flush carry tokens in `[previous_flush_token, start)`. Content used in that
    /// interval is never evicted here.
    pub fn compact(&mut self, start: AtlasToken) {
        if self.pages.is_empty() {
            self.previous_flush_token = start;
            return;
        }
        let previous = self.previous_flush_token;
        let used_in_flush = |plot: &Plot| plot.last_use_token().in_interval(previous, start);

        let mut atlas_used = false;
        for page in &mut self.pages {
            for plot in page.plots_mut() {
                if used_in_flush(plot) {
                    plot.reset_flushes_since_last_used();
                    atlas_used = true;
                }
            }
        }
        if atlas_used {
            self.flushes_since_last_use = 0;
        } else {
            self.flushes_since_last_use = self.flushes_since_last_use.saturating_add(1);
        }

        if atlas_used || self.flushes_since_last_use > ATLAS_RECENTLY_USED_COUNT {
            let last = self.pages.len() - 1;
            let evicted_before = self.evicted.len();

            // Aged plots on earlier pages can take over the content of the last page.
            let mut available: SmallVec<[(usize, usize); 16]> = SmallVec::new();
            for page_index in 0..last {
                let order: PlotIndices = self.pages[page_index].mru_order().collect();
                for plot_index in order {
                    let plot = &mut self.pages[page_index].plots_mut()[plot_index];
                    if !used_in_flush(plot) {
                        plot.inc_flushes_since_last_used();
                    }
                    if plot.flushes_since_last_used() > PLOT_RECENTLY_USED_COUNT {
                        available.push((page_index, plot_index));
                    }
                }
            }

            let last_order: PlotIndices = self.pages[last].mru_order().collect();
            let mut used_plots = 0;
            for &plot_index in &last_order {
                let plot = &mut self.pages[last].plots_mut()[plot_index];
                if !used_in_flush(plot) {
                    plot.inc_flushes_since_last_used();
                }
                if plot.flushes_since_last_used() <= PLOT_RECENTLY_USED_COUNT {
                    used_plots += 1;
                } else if plot.last_use_token() != AtlasToken::INVALID {
                    self.evict_plot(last, plot_index);
                }
            }

            // Drain a sparsely used last page by evicting its plots together with aged plots on
            // earlier pages, which then receive the content when it is drawn again.
            let num_plots = self.config.plots_per_page();
            // A quarter of the plots still in use is sparse enough.
            if !available.is_empty() && used_plots > 0 && used_plots <= num_plots / 4 {
                for &plot_index in &last_order {
                    let plot = &self.pages[last].plots()[plot_index];
                    if plot.flushes_since_last_used() > PLOT_RECENTLY_USED_COUNT {
                        continue;
                    }
                    let last_use = plot.last_use_token();
                    if last_use != AtlasToken::INVALID && last_use >= previous {
                        continue;
                    }
                    let Some((page_index, available_index)) = available.pop() else {
                        break;
                    };
                    self.evict_plot(last, plot_index);
                    self.evict_plot(page_index, available_index);
                    used_plots -= 1;
                    if used_plots == 0 || available.is_empty() {
                        break;
                    }
                }
            }

            let evicted = self.evicted.len() - evicted_before;
            if evicted > 0 {
                debug!(
                    "compacted {:?} atlas: {evicted} plots evicted, {used_plots} in use on page {last}",
                    self.format
                );
            }
            if used_plots == 0 {
                self.deactivate_last_page();
                self.flushes_since_last_use = 0;
            }
        }

        self.previous_flush_token = start;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::plot::AtlasRect;

    #[derive(Debug, Default)]
    struct CountingBackend {
        created: usize,
        fail: bool,
    }

    impl TextureBackend for CountingBackend {
        fn create_texture_proxy(
            &mut self,
            width: u32,
            height: u32,
            format: TextureFormat,
        ) -> Option<TextureProxy> {
            if self.fail {
                return None;
            }
            self.created += 1;
            Some(TextureProxy::new(width, height, format, Arc::new(())))
        }

        fn write_pixels(
            &mut self,
            _: &TextureProxy,
            _: AtlasRect,
            _: &[u8],
            _: u32,
        ) -> Result<(), AtlasError> {
            Ok(())
        }
    }

    /// Two pages of four 16x16 plots.
    fn small_atlas() -> Atlas {
        let config = AtlasConfig {
            page_width: 32,
            page_height: 32,
            plot_width: 16,
            plot_height: 16,
            max_pages: 2,
            padding: 0,
        };
        Atlas::new(TextureFormat::A8, config).unwrap()
    }

    fn add(
        atlas: &mut Atlas,
        backend: &mut CountingBackend,
        tokens: &mut TokenTracker,
    ) -> AtlasLocator {
        let locator = atlas
            .add_to_atlas(backend, tokens, 16, 16)
            .locator()
            .unwrap();
        atlas.set_last_use_token(&locator, tokens.issue_draw_token());
        locator
    }

    #[test]
    fn oversized_cells_are_errors() {
        let mut atlas = small_atlas();
        let mut backend = CountingBackend::default();
        let result = atlas.add_to_atlas(&mut backend, &TokenTracker::new(), 17, 1);
        assert_eq!(
            result,
            AddResult::Error(AtlasError::CellTooLarge {
                width: 17,
                height: 1
            })
        );
        assert_eq!(atlas.num_active_pages(), 0);
    }

    #[test]
    fn pages_are_activated_on_demand() {
        let mut atlas = small_atlas();
        let mut backend = CountingBackend::default();
        let mut tokens = TokenTracker::new();
        for _ in 0..4 {
            add(&mut atlas, &mut backend, &mut tokens);
        }
        assert_eq!(atlas.num_active_pages(), 1);
        let fifth = add(&mut atlas, &mut backend, &mut tokens);
        assert_eq!(atlas.num_active_pages(), 2);
        assert_eq!(fifth.page_index(), 1);
        assert_eq!(backend.created, 2);
    }

    #[test]
    fn texture_failures_are_errors() {
        let mut atlas = small_atlas();
        let mut backend = CountingBackend {
            fail: true,
            ..CountingBackend::default()
        };
        let result = atlas.add_to_atlas(&mut backend, &TokenTracker::new(), 4, 4);
        assert!(matches!(
            result,
            AddResult::Error(AtlasError::TextureCreationFailed { .. })
        ));
    }

    #[test]
    fn full_atlas_evicts_only_after_a_flush() {
        let mut atlas = small_atlas();
        let mut backend = CountingBackend::default();
        let mut tokens = TokenTracker::new();
        let cells = (0..8)
            .map(|_| add(&mut atlas, &mut backend, &mut tokens))
            .collect::<Vec<_>>();
        // Every plot is needed by the flush that has not happened yet.
        assert_eq!(
            atlas.add_to_atlas(&mut backend, &tokens, 16, 16),
            AddResult::TryAgain
        );

        tokens.issue_flush_token();
        let reused = atlas
            .add_to_atlas(&mut backend, &tokens, 16, 16)
            .locator()
            .unwrap();
        // The least recently used plot of the first page is reclaimed.
        assert_eq!(reused.plot.page_index, 0);
        assert_eq!(reused.plot.plot_index, cells[0].plot.plot_index);
        assert!(!atlas.has_cell(&cells[0]));
        assert!(cells[1..].iter().all(|cell| atlas.has_cell(cell)));
        assert_eq!(atlas.take_evicted_plots(), [cells[0].plot]);
        assert!(atlas.take_evicted_plots().is_empty());
    }

    #[test]
    fn stale_locators_do_not_touch_plots() {
        let mut atlas = small_atlas();
        let mut backend = CountingBackend::default();
        let mut tokens = TokenTracker::new();
        let cells = (0..8)
            .map(|_| add(&mut atlas, &mut backend, &mut tokens))
            .collect::<Vec<_>>();
        tokens.issue_flush_token();
        let reused = atlas
            .add_to_atlas(&mut backend, &tokens, 16, 16)
            .locator()
            .unwrap();
        atlas.set_last_use_token(&cells[0], tokens.issue_draw_token());
        let plot = atlas.plot(&reused.plot).unwrap();
        assert_eq!(plot.last_use_token(), AtlasToken::INVALID);
    }

    #[test]
    fn compacting_an_empty_atlas_advances_the_clock() {
        let mut atlas = small_atlas();
        let mut tokens = TokenTracker::new();
        tokens.issue_draw_token();
        let start = tokens.issue_flush_token();
        atlas.compact(start);
        assert_eq!(atlas.previous_flush_token(), start);
    }
}
