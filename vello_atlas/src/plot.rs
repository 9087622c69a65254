// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Individually evictable tiles of an atlas page.

use vello_picture::kurbo::Rect;

use crate::packer::RectPackSkyline;
use crate::token::AtlasToken;

/// An integer rectangle in page pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AtlasRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl AtlasRect {
    /// A rectangle from its origin and size.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle as floating point geometry.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x + self.width),
            f64::from(self.y + self.height),
        )
    }

    /// Returns `true` if `other` lies inside this rectangle.
    pub fn contains(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

/// Identifies one generation of a plot's content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlotLocator {
    /// Index of the page in its atlas.
    pub page_index: usize,
    /// Index of the plot in its page.
    pub plot_index: usize,
    /// Generation of the plot content when the locator was made.
    pub gen_id: u64,
}

/// Where a cell lives: its plot generation and its rectangle in the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AtlasLocator {
    /// The plot holding the cell.
    pub plot: PlotLocator,
    /// The cell in page pixel space, padding excluded.
    pub rect: AtlasRect,
}

impl AtlasLocator {
    /// Index of the page texture holding the cell.
    pub fn page_index(&self) -> usize {
        self.plot.page_index
    }
}

/// A fixed-size tile of a page, packed independently of its neighbours.
#[derive(Clone, Debug)]
pub struct Plot {
    page_index: usize,
    plot_index: usize,
    offset: (u32, u32),
    packer: RectPackSkyline,
    padding: u32,
    gen_id: u64,
    last_use_token: AtlasToken,
    flushes_since_last_used: u32,
}

impl Plot {
    /// An empty plot at `offset` in its page.
    pub fn new(
        page_index: usize,
        plot_index: usize,
        offset: (u32, u32),
        size: (u32, u32),
        padding: u32,
        gen_id: u64,
    ) -> Self {
        Self {
            page_index,
            plot_index,
            offset,
            packer: RectPackSkyline::new(size.0, size.1),
            padding,
            gen_id,
            last_use_token: AtlasToken::INVALID,
            flushes_since_last_used: 0,
        }
    }

    /// Index of the owning page.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Index of this plot in its page.
    pub fn plot_index(&self) -> usize {
        self.plot_index
    }

    /// The current content generation.
    pub fn gen_id(&self) -> u64 {
        self.gen_id
    }

    /// A locator for the current generation.
    pub fn locator(&self) -> PlotLocator {
        PlotLocator {
            page_index: self.page_index,
            plot_index: self.plot_index,
            gen_id: self.gen_id,
        }
    }

    /// The plot area in page pixel space.
    pub fn bounds(&self) -> AtlasRect {
        AtlasRect::new(
            self.offset.0,
            self.offset.1,
            self.packer.width(),
            self.packer.height(),
        )
    }

    /// Returns `true` if a cell of this size fits an empty plot.
    pub fn fits_empty(&self, width: u32, height: u32) -> bool {
        self.padded(width, height)
            .is_some_and(|(w, h)| w <= self.packer.width() && h <= self.packer.height())
    }

    /// The size of a cell with its padding, `None` if it overflows.
    fn padded(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let border = self.padding.checked_mul(2)?;
        Some((width.checked_add(border)?, height.checked_add(border)?))
    }

    /// Reserve a `width` by `height` cell surrounded by the plot padding.
    ///
    /// Returns the cell rectangle in page pixel space, not including the padding.
    pub fn add_rect(&mut self, width: u32, height: u32) -> Option<AtlasRect> {
        let (padded_width, padded_height) = self.padded(width, height)?;
        let (x, y) = self.packer.add_rect(padded_width, padded_height)?;
        Some(AtlasRect::new(
            self.offset.0 + x + self.padding,
            self.offset.1 + y + self.padding,
            width,
            height,
        ))
    }

    /// Returns `true` if any cell was placed since the last reset.
    pub fn has_content(&self) -> bool {
        self.packer.area_used() > 0
    }

    /// Drop every cell and move to generation `gen_id`.
    ///
    /// Locators of the previous generation stop matching.
    pub fn reset_rects(&mut self, gen_id: u64) {
        self.packer.reset();
        self.gen_id = gen_id;
        self.last_use_token = AtlasToken::INVALID;
    }

    /// The token of the last draw that used this plot.
    pub fn last_use_token(&self) -> AtlasToken {
        self.last_use_token
    }

    /// Record a draw that uses this plot.
    pub fn set_last_use_token(&mut self, token: AtlasToken) {
        self.last_use_token = token;
    }

    /// Flushes since this plot was last used.
    pub fn flushes_since_last_used(&self) -> u32 {
        self.flushes_since_last_used
    }

    pub(crate) fn reset_flushes_since_last_used(&mut self) {
        self.flushes_since_last_used = 0;
    }

    pub(crate) fn inc_flushes_since_last_used(&mut self) {
        self.flushes_since_last_used = self.flushes_since_last_used.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_surrounds_cells() {
        let mut plot = Plot::new(0, 1, (16, 0), (16, 16), 1, 3);
        let rect = plot.add_rect(4, 4).unwrap();
        assert_eq!(rect, AtlasRect::new(17, 1, 4, 4));
        let next = plot.add_rect(4, 4).unwrap();
        assert_eq!(next, AtlasRect::new(23, 1, 4, 4));
        assert!(plot.bounds().contains(&rect) && plot.bounds().contains(&next));
        assert!(!plot.fits_empty(15, 1));
        assert!(plot.fits_empty(14, 14));
    }

    #[test]
    fn huge_cells_do_not_fit() {
        let mut plot = Plot::new(0, 0, (0, 0), (16, 16), 1, 1);
        assert!(!plot.fits_empty(u32::MAX, 1));
        assert!(!plot.fits_empty(1, u32::MAX - 1));
        assert_eq!(plot.add_rect(u32::MAX, 1), None);
        assert!(!plot.has_content());
    }

    #[test]
    fn reset_changes_generation() {
        let mut plot = Plot::new(0, 0, (0, 0), (8, 8), 0, 1);
        plot.add_rect(8, 8).unwrap();
        plot.set_last_use_token(AtlasToken::INVALID.next());
        let before = plot.locator();
        plot.reset_rects(2);
        assert_ne!(plot.locator(), before);
        assert!(!plot.has_content());
        assert_eq!(plot.last_use_token(), AtlasToken::INVALID);
        assert!(plot.add_rect(8, 8).is_some());
    }
}
