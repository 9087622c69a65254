// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The flush clock used to age atlas content.

/// A point on the draw and flush timeline.
///
/// Tokens are issued in increasing order by a [`TokenTracker`]. [`AtlasToken::INVALID`] sorts
/// before every issued token and is never part of an interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtlasToken(u64);

impl AtlasToken {
    /// The token of content that was never used.
    pub const INVALID: Self = Self(0);

    /// The token that follows this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns `true` if this token is valid and inside `[start, end)`.
    pub fn in_interval(self, start: Self, end: Self) -> bool {
        self != Self::INVALID && start <= self && self < end
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Issues draw and flush tokens.
///
/// Every draw that references atlas content gets a draw token. A flush closes the interval of
/// draw tokens issued since the previous flush and returns the first token of the next one.
#[derive(Clone, Debug)]
pub struct TokenTracker {
    current_draw: AtlasToken,
    flush_start: AtlasToken,
}

impl Default for TokenTracker {
    fn default() -> Self {
        Self {
            current_draw: AtlasToken::INVALID,
            flush_start: AtlasToken::INVALID.next(),
        }
    }
}

impl TokenTracker {
    /// A tracker at the start of time.
    pub fn new() -> Self {
        Self::default()
    }

    /// The token the next issued draw will get.
    pub fn next_draw_token(&self) -> AtlasToken {
        self.current_draw.next()
    }

    /// Issue a token for a draw.
    pub fn issue_draw_token(&mut self) -> AtlasToken {
        self.current_draw = self.current_draw.next();
        self.current_draw
    }

    /// The first token of the flush that has not happened yet.
    ///
    /// Content whose last use is at or after this token is needed by that flush.
    pub fn next_flush_token(&self) -> AtlasToken {
        self.flush_start
    }

    /// Close the current flush interval and return the first token of the next interval.
    pub fn issue_flush_token(&mut self) -> AtlasToken {
        self.flush_start = self.next_draw_token();
        self.flush_start
    }
}
