// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atlas pages: one texture divided into a grid of plots.

use crate::config::AtlasConfig;
use crate::plot::{AtlasRect, Plot};
use crate::proxy::TextureProxy;

#[derive(Clone, Copy, Debug, Default)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

/// A doubly linked recency list over plot indices, most recently used first.
#[derive(Clone, Debug)]
struct MruList {
    head: Option<usize>,
    tail: Option<usize>,
    links: Vec<Link>,
}

impl MruList {
    /// A list holding `0..len` in index order.
    fn new(len: usize) -> Self {
        let links = (0..len)
            .map(|index| Link {
                prev: index.checked_sub(1),
                next: (index + 1 < len).then_some(index + 1),
            })
            .collect();
        Self {
            head: (len > 0).then_some(0),
            tail: len.checked_sub(1),
            links,
        }
    }

    fn unlink(&mut self, index: usize) {
        let Link { prev, next } = self.links[index];
        match prev {
            Some(prev) => self.links[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.links[next].prev = prev,
            None => self.tail = prev,
        }
        self.links[index] = Link::default();
    }

    fn push_front(&mut self, index: usize) {
        let old_head = self.head;
        self.links[index] = Link {
            prev: None,
            next: old_head,
        };
        match old_head {
            Some(head) => self.links[head].prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
    }

    fn move_to_front(&mut self, index: usize) {
        if self.head == Some(index) {
            return;
        }
        self.unlink(index);
        self.push_front(index);
    }
}

/// Iterates the plots of a page from most to least recently used.
#[derive(Clone, Debug)]
pub struct MruIter<'a> {
    list: &'a MruList,
    cursor: Option<usize>,
}

impl Iterator for MruIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let index = self.cursor?;
        self.cursor = self.list.links[index].next;
        Some(index)
    }
}

/// One texture of an atlas and the plots it is divided into.
#[derive(Debug)]
pub struct Page {
    plots: Vec<Plot>,
    mru: MruList,
    texture: TextureProxy,
}

impl Page {
    /// Lay out a fresh grid of plots over `texture`.
    ///
    /// Plots are numbered row by row; each takes its generation from `next_gen_id`.
    pub fn new(
        page_index: usize,
        config: &AtlasConfig,
        texture: TextureProxy,
        mut next_gen_id: impl FnMut() -> u64,
    ) -> Self {
        let (columns, _) = config.plot_grid();
        let plots = (0..config.plots_per_page())
            .map(|plot_index| {
                let column = plot_index as u32 % columns;
                let row = plot_index as u32 / columns;
                Plot::new(
                    page_index,
                    plot_index,
                    (column * config.plot_width, row * config.plot_height),
                    (config.plot_width, config.plot_height),
                    config.padding,
                    next_gen_id(),
                )
            })
            .collect::<Vec<_>>();
        let mru = MruList::new(plots.len());
        Self {
            plots,
            mru,
            texture,
        }
    }

    /// Number of plots.
    pub fn num_plots(&self) -> usize {
        self.plots.len()
    }

    /// The plot at `index`.
    pub fn plot(&self, index: usize) -> Option<&Plot> {
        self.plots.get(index)
    }

    pub(crate) fn plot_mut(&mut self, index: usize) -> Option<&mut Plot> {
        self.plots.get_mut(index)
    }

    /// All plots in index order.
    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub(crate) fn plots_mut(&mut self) -> &mut [Plot] {
        &mut self.plots
    }

    /// The texture backing the page.
    pub fn texture(&self) -> &TextureProxy {
        &self.texture
    }

    /// Move a plot to the front of the recency list.
    pub fn make_mru(&mut self, index: usize) {
        debug_assert!(index < self.plots.len(), "plot index out of range");
        self.mru.move_to_front(index);
    }

    /// The least recently used plot.
    pub fn lru_plot(&self) -> Option<usize> {
        self.mru.tail
    }

    /// Place a cell in the most recently used plot with room for it, and make that plot MRU.
    pub(crate) fn add_rect(&mut self, width: u32, height: u32) -> Option<(usize, AtlasRect)> {
        let mut cursor = self.mru.head;
        while let Some(index) = cursor {
            cursor = self.mru.links[index].next;
            if let Some(rect) = self.plots[index].add_rect(width, height) {
                self.make_mru(index);
                return Some((index, rect));
            }
        }
        None
    }

    /// Plot indices from most to least recently used.
    pub fn mru_order(&self) -> MruIter<'_> {
        MruIter {
            list: &self.mru,
            cursor: self.mru.head,
        }
    }
}
