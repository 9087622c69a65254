// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Skyline rectangle packing within one plot.

/// A horizontal run of the skyline: everything below `y` in `[x, x + width)` is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    x: u32,
    y: u32,
    width: u32,
}

/// Packs rectangles bottom-left first along a skyline.
///
/// Each placement picks the lowest position, breaking ties by the narrowest segment, which keeps
/// the skyline flat for glyph-sized content.
#[derive(Clone, Debug)]
pub struct RectPackSkyline {
    width: u32,
    height: u32,
    skyline: Vec<Segment>,
    area_used: u64,
}

impl RectPackSkyline {
    /// An empty packer covering `width` by `height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        let mut packer = Self {
            width,
            height,
            skyline: Vec::new(),
            area_used: 0,
        };
        packer.reset();
        packer
    }

    /// Width of the packed area.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the packed area.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Forget every placed rectangle.
    pub fn reset(&mut self) {
        self.area_used = 0;
        self.skyline.clear();
        self.skyline.push(Segment {
            x: 0,
            y: 0,
            width: self.width,
        });
    }

    /// Pixels covered by placed rectangles.
    pub fn area_used(&self) -> u64 {
        self.area_used
    }

    /// Fraction of the area covered by placed rectangles.
    pub fn percent_full(&self) -> f32 {
        let total = u64::from(self.width) * u64::from(self.height);
        if total == 0 {
            return 1.0;
        }
        self.area_used as f32 / total as f32
    }

    /// Place a `width` by `height` rectangle and return its top left corner.
    pub fn add_rect(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }
        let mut best: Option<(usize, u32, u32)> = None;
        for index in 0..self.skyline.len() {
            let Some(y) = self.rectangle_fits(index, width, height) else {
                continue;
            };
            let segment_width = self.skyline[index].width;
            let better = match best {
                None => true,
                Some((best_index, _, best_y)) => {
                    y < best_y || (y == best_y && segment_width < self.skyline[best_index].width)
                }
            };
            if better {
                best = Some((index, self.skyline[index].x, y));
            }
        }
        let (index, x, y) = best?;
        self.add_skyline_level(index, x, y, width, height);
        self.area_used += u64::from(width) * u64::from(height);
        Some((x, y))
    }

    /// The lowest `y` at which the rectangle fits when its left edge is at segment `index`.
    fn rectangle_fits(&self, index: usize, width: u32, height: u32) -> Option<u32> {
        let x = self.skyline[index].x;
        if x + width > self.width {
            return None;
        }
        let mut width_left = width;
        let mut y = self.skyline[index].y;
        for segment in &self.skyline[index..] {
            if width_left == 0 {
                break;
            }
            y = y.max(segment.y);
            if y + height > self.height {
                return None;
            }
            width_left = width_left.saturating_sub(segment.width);
        }
        Some(y)
    }

    fn add_skyline_level(&mut self, index: usize, x: u32, y: u32, width: u32, height: u32) {
        self.skyline.insert(
            index,
            Segment {
                x,
                y: y + height,
                width,
            },
        );
        let right = x + width;
        // Trim the segments now covered by the new one.
        let next = index + 1;
        while next < self.skyline.len() {
            let segment = &mut self.skyline[next];
            if segment.x >= right {
                break;
            }
            let shrink = right - segment.x;
            if shrink >= segment.width {
                self.skyline.remove(next);
            } else {
                segment.x += shrink;
                segment.width -= shrink;
                break;
            }
        }
        // Merge neighbours at the same height.
        let mut i = 0;
        while i + 1 < self.skyline.len() {
            if self.skyline[i].y == self.skyline[i + 1].y {
                self.skyline[i].width += self.skyline[i + 1].width;
                self.skyline.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }
}
