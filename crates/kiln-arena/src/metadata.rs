//! Fixed-capacity bump arena for method metadata.
//!
//! A [`MetadataArena`] owns one contiguous block sized by the caller before
//! loading begins. Allocation only moves a cursor forward; individual
//! allocations are never freed. The arena is released as a whole when it is
//! dropped, after the method that used it has been discarded.

use std::ops::Range;

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::profile::AllocatorProfile;
use crate::slot::ArenaSlot;

/// Bounded bump allocator for load-time bookkeeping.
///
/// A request that does not fit in the remaining capacity fails with
/// [`ArenaError::OutOfArenaSpace`]. There is no fallback to the heap, so
/// the memory ceiling of loading a method is exactly `capacity()`.
///
/// Failed requests leave the cursor untouched: earlier allocations stay
/// valid and the high-water mark does not move.
#[derive(Debug)]
pub struct MetadataArena {
    /// Backing storage, allocated to full capacity at creation.
    data: Box<[u8]>,
    /// Bump pointer: next free byte.
    cursor: usize,
    /// Allocation statistics, when profiling is enabled.
    profile: Option<AllocatorProfile>,
}

impl MetadataArena {
    /// Create an arena of `capacity` bytes.
    ///
    /// Aborts on allocation failure like any `Vec`. Use
    /// [`try_new`](Self::try_new) to handle exhaustion.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
            profile: None,
        }
    }

    /// Create an arena of `capacity` bytes, reporting reservation failure.
    pub fn try_new(capacity: usize) -> Result<Self, ArenaError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| ArenaError::ReserveFailed { capacity })?;
        data.resize(capacity, 0);
        Ok(Self {
            data: data.into_boxed_slice(),
            cursor: 0,
            profile: None,
        })
    }

    /// Create an arena from an [`ArenaConfig`], enabling profiling if named.
    pub fn from_config(config: &ArenaConfig) -> Result<Self, ArenaError> {
        let mut arena = Self::try_new(config.method_arena_bytes)?;
        if let Some(name) = &config.profiling_name {
            arena.enable_profiling(name.clone());
        }
        Ok(arena)
    }

    /// Start recording allocation statistics under `name`.
    ///
    /// Counters start at zero; the high-water mark starts at the current
    /// cursor so bytes already handed out are not forgotten.
    pub fn enable_profiling(&mut self, name: impl Into<String>) {
        let mut profile = AllocatorProfile::new(name.into(), self.capacity());
        profile.high_water_bytes = self.cursor;
        self.profile = Some(profile);
    }

    /// Statistics recorded so far, if profiling is enabled.
    pub fn profile(&self) -> Option<&AllocatorProfile> {
        self.profile.as_ref()
    }

    /// Bump-allocate `len` bytes with no alignment requirement.
    pub fn allocate(&mut self, len: usize) -> Result<ArenaSlot, ArenaError> {
        self.allocate_aligned(len, 1)
    }

    /// Bump-allocate `len` bytes starting at a multiple of `align`
    /// (relative to the arena base).
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    pub fn allocate_aligned(&mut self, len: usize, align: usize) -> Result<ArenaSlot, ArenaError> {
        assert!(
            align.is_power_of_two(),
            "alignment {align} is not a power of two"
        );
        let start = self
            .cursor
            .checked_add(align - 1)
            .map(|v| v & !(align - 1));
        let end = start.and_then(|s| s.checked_add(len));

        match (start, end) {
            (Some(start), Some(end)) if end <= self.data.len() => {
                self.cursor = end;
                if let Some(p) = &mut self.profile {
                    p.allocations += 1;
                    p.requested_bytes += len as u64;
                    p.high_water_bytes = p.high_water_bytes.max(end);
                }
                Ok(ArenaSlot::new(start, len))
            }
            _ => {
                if let Some(p) = &mut self.profile {
                    p.failed_allocations += 1;
                }
                let padding = start.map_or(0, |s| s - self.cursor);
                Err(ArenaError::OutOfArenaSpace {
                    requested: len.saturating_add(padding),
                    remaining: self.remaining(),
                    capacity: self.capacity(),
                })
            }
        }
    }

    /// Allocate a slot for `bytes` and copy them in.
    pub fn allocate_copy(&mut self, bytes: &[u8], align: usize) -> Result<ArenaSlot, ArenaError> {
        let slot = self.allocate_aligned(bytes.len(), align)?;
        self.slice_mut(slot).copy_from_slice(bytes);
        Ok(slot)
    }

    /// Shared view of an allocation.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was not produced by this arena.
    pub fn slice(&self, slot: ArenaSlot) -> &[u8] {
        &self.data[slot.offset..slot.end()]
    }

    /// Mutable view of an allocation.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was not produced by this arena.
    pub fn slice_mut(&mut self, slot: ArenaSlot) -> &mut [u8] {
        &mut self.data[slot.offset..slot.end()]
    }

    /// Declared capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes consumed so far, including alignment padding.
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// Highest offset ever reached.
    ///
    /// Allocation is monotonic, so this equals [`used`](Self::used); it is
    /// what a caller should size the arena to for the same method.
    pub fn high_water_mark(&self) -> usize {
        self.cursor
    }

    /// Address range of the backing block.
    pub fn address_range(&self) -> Range<usize> {
        let r = self.data.as_ptr_range();
        r.start as usize..r.end as usize
    }
}
