//! Handles to metadata arena allocations.
//!
//! An [`ArenaSlot`] records where an allocation lives inside a
//! [`MetadataArena`](crate::MetadataArena). Slots are plain offsets, so a
//! method can keep them while the arena itself is only borrowed.

use std::fmt;

/// Location of one allocation inside a metadata arena.
///
/// Only meaningful for the arena that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaSlot {
    /// Byte offset from the arena base.
    pub(crate) offset: usize,
    /// Length of the allocation in bytes.
    pub(crate) len: usize,
}

impl ArenaSlot {
    pub(crate) fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Byte offset from the arena base.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the allocation in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this is a zero-length allocation.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte of the allocation.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

impl fmt::Display for ArenaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaSlot(off={}, len={})", self.offset, self.len)
    }
}
