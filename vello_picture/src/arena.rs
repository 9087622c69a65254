// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A typed block arena.
//!
//! Values are appended to fixed capacity blocks. A block is never reallocated once created, so a
//! [`RecordHandle`] stays valid for as long as the arena lives. There is no way to free a single
//! value: everything is dropped together when the arena is cleared or dropped.

use core::ops::Index;

use static_assertions::const_assert;

const FIRST_BLOCK_CAPACITY: usize = 64;
const MAX_BLOCK_CAPACITY: usize = 4096;
const_assert!(MAX_BLOCK_CAPACITY <= u32::MAX as usize);

/// The position of a value in a [`BlockArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordHandle {
    block: u32,
    offset: u32,
}

impl RecordHandle {
    /// The index of the block holding the value.
    pub fn block(self) -> usize {
        self.block as usize
    }

    /// The index of the value within its block.
    pub fn offset(self) -> usize {
        self.offset as usize
    }
}

/// Append-only storage where values are grouped into blocks of growing capacity.
#[derive(Debug)]
pub struct BlockArena<T> {
    blocks: Vec<Vec<T>>,
    len: usize,
}

impl<T> Default for BlockArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockArena<T> {
    /// Create an empty arena. No memory is allocated until the first value.
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            len: 0,
        }
    }

    fn block_capacity(index: usize) -> usize {
        let shift = index.min(MAX_BLOCK_CAPACITY.trailing_zeros() as usize);
        (FIRST_BLOCK_CAPACITY << shift).min(MAX_BLOCK_CAPACITY)
    }

    /// Move `value` into the arena.
    ///
    /// # Panics
    ///
    /// Panics if the arena grows past `u32::MAX` blocks, which handles can not address.
    pub fn allocate(&mut self, value: T) -> RecordHandle {
        let needs_block = match self.blocks.last() {
            Some(block) => block.len() >= Self::block_capacity(self.blocks.len() - 1),
            None => true,
        };
        if needs_block {
            let capacity = Self::block_capacity(self.blocks.len());
            self.blocks.push(Vec::with_capacity(capacity));
        }
        let block_index = self.blocks.len() - 1;
        let block = &mut self.blocks[block_index];
        let offset = block.len();
        block.push(value);
        self.len += 1;
        RecordHandle {
            block: u32::try_from(block_index).expect("arena exceeded u32::MAX blocks"),
            // Offsets stay below `MAX_BLOCK_CAPACITY`.
            offset: offset as u32,
        }
    }

    /// Returns the value behind `handle`, or `None` if the handle is from another arena.
    pub fn get(&self, handle: RecordHandle) -> Option<&T> {
        self.blocks
            .get(handle.block())
            .and_then(|block| block.get(handle.offset()))
    }

    /// Number of values in the arena.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the arena holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks allocated so far.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterate over all values in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.blocks.iter().flatten()
    }

    /// Drop every value and release all blocks.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.len = 0;
    }
}

impl<T> Index<RecordHandle> for BlockArena<T> {
    type Output = T;

    fn index(&self, handle: RecordHandle) -> &T {
        debug_assert!(
            handle.block() < self.blocks.len(),
            "handle does not belong to this arena"
        );
        &self.blocks[handle.block()][handle.offset()]
    }
}
