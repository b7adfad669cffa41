//! Owned storage for memory-planned buffers.
//!
//! [`PlannedBufferSet`] allocates one region per planned buffer id, sized
//! exactly as the method metadata declares. Regions are boxed slices, so
//! their addresses never move while the set is alive. The runtime only
//! ever sees them through a borrowed
//! [`HierarchicalAllocator`](crate::HierarchicalAllocator).

use std::ops::Range;

use kiln_core::{BufferId, PlannedMemory};

use crate::error::{ArenaError, Mismatch};
use crate::hierarchical::HierarchicalAllocator;

/// Owned, positionally ordered planned buffers.
///
/// Region `i` backs `BufferId(i)`. The order is fixed at construction and
/// never changes.
///
/// Initial contents are unspecified. Regions happen to be zero-filled
/// because safe Rust requires initialised memory, but nothing downstream
/// may depend on that.
pub struct PlannedBufferSet {
    buffers: Vec<Box<[u8]>>,
}

impl PlannedBufferSet {
    /// Allocate `count` regions, sizing region `id` with `size_of(id)`.
    ///
    /// Fails with [`Mismatch::Count`] before allocating anything if `count`
    /// does not fit the `BufferId` space, with [`Mismatch::Undeclared`] if
    /// `size_of` returns `None` for an id below `count`, or with
    /// [`ArenaError::BufferAllocationFailure`] if a region cannot be
    /// reserved. On failure every region built so far is dropped; no
    /// partial set is returned.
    pub fn build<F>(count: usize, mut size_of: F) -> Result<Self, ArenaError>
    where
        F: FnMut(BufferId) -> Option<usize>,
    {
        let ids = BufferId::first(count).ok_or(Mismatch::Count {
            declared: count,
            actual: u32::MAX as usize,
        })?;
        let mut buffers = Vec::with_capacity(count);
        for id in ids {
            let size = size_of(id).ok_or(Mismatch::Undeclared { id, count })?;
            let region =
                alloc_region(size).ok_or(ArenaError::BufferAllocationFailure { id, size })?;
            buffers.push(region);
        }
        Ok(Self { buffers })
    }

    /// Allocate the regions a method's planned-memory metadata declares.
    pub fn from_meta<M: PlannedMemory + ?Sized>(meta: &M) -> Result<Self, ArenaError> {
        Self::build(meta.num_memory_planned_buffers(), |id| {
            meta.memory_planned_buffer_size(id)
        })
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the set has no regions.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Size of region `id` in bytes.
    pub fn size(&self, id: BufferId) -> Option<usize> {
        self.buffers.get(id.index()).map(|b| b.len())
    }

    /// Read-only contents of region `id`.
    pub fn buffer(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(id.index()).map(|b| &b[..])
    }

    /// Total bytes across all regions.
    pub fn total_bytes(&self) -> usize {
        self.buffers.iter().map(|b| b.len()).sum()
    }

    /// Address range of each region, in id order.
    pub fn address_ranges(&self) -> Vec<Range<usize>> {
        self.buffers
            .iter()
            .map(|b| {
                let r = b.as_ptr_range();
                r.start as usize..r.end as usize
            })
            .collect()
    }

    /// Borrow every region as a positional view for the runtime.
    ///
    /// The view cannot outlive this set, and the set cannot be touched
    /// while the view is alive.
    pub fn as_view(&mut self) -> HierarchicalAllocator<'_> {
        HierarchicalAllocator::new(self.buffers.iter_mut().map(|b| &mut b[..]).collect())
    }
}

/// Reserve and initialise a region, returning `None` on exhaustion.
fn alloc_region(size: usize) -> Option<Box<[u8]>> {
    let mut v = Vec::new();
    v.try_reserve_exact(size).ok()?;
    v.resize(size, 0u8);
    Some(v.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn build_sizes_each_region() {
        let sizes = [1024usize, 2048];
        let set = PlannedBufferSet::build(2, |id| sizes.get(id.index()).copied()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.size(BufferId(0)), Some(1024));
        assert_eq!(set.size(BufferId(1)), Some(2048));
        assert_eq!(set.total_bytes(), 3072);
    }

    #[test]
    fn zero_count_builds_empty_set() {
        let set = PlannedBufferSet::build(0, |_| None).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.total_bytes(), 0);
    }

    #[test]
    fn undeclared_size_aborts_build() {
        let sizes = [16usize, 32];
        let result = PlannedBufferSet::build(3, |id| sizes.get(id.index()).copied());
        assert!(matches!(
            result,
            Err(ArenaError::SizeMismatch(Mismatch::Undeclared {
                id: BufferId(2),
                count: 3
            }))
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn count_beyond_id_space_is_rejected_before_allocating() {
        let count = u32::MAX as usize + 1;
        let mut calls = 0;
        let result = PlannedBufferSet::build(count, |_| {
            calls += 1;
            Some(0)
        });
        assert!(matches!(
            result,
            Err(ArenaError::SizeMismatch(Mismatch::Count { declared, .. })) if declared == count
        ));
        assert_eq!(calls, 0);
    }

    #[test]
    fn size_fn_called_in_id_order() {
        let mut seen = Vec::new();
        PlannedBufferSet::build(4, |id| {
            seen.push(id.0);
            Some(8)
        })
        .unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn unsatisfiable_size_reports_allocation_failure() {
        let result = PlannedBufferSet::build(1, |_| Some(usize::MAX));
        assert!(matches!(
            result,
            Err(ArenaError::BufferAllocationFailure {
                id: BufferId(0),
                size: usize::MAX
            })
        ));
    }

    #[test]
    fn zero_sized_region_is_allowed() {
        let set = PlannedBufferSet::build(2, |id| Some(id.index() * 4)).unwrap();
        assert_eq!(set.size(BufferId(0)), Some(0));
        assert_eq!(set.buffer(BufferId(1)).unwrap().len(), 4);
    }

    #[test]
    fn view_preserves_order_and_sizes() {
        let mut set = PlannedBufferSet::build(3, |id| Some(10 + id.index())).unwrap();
        let view = set.as_view();
        assert_eq!(view.num_buffers(), 3);
        for i in 0..3u32 {
            assert_eq!(view.buffer_size(BufferId(i)), Some(10 + i as usize));
        }
    }

    #[test]
    fn writes_through_view_land_in_owned_region() {
        let mut set = PlannedBufferSet::build(2, |_| Some(8)).unwrap();
        {
            let mut view = set.as_view();
            view.offset_slice_mut(BufferId(1), 4, 4).unwrap().fill(7);
        }
        assert_eq!(set.buffer(BufferId(1)).unwrap(), &[0, 0, 0, 0, 7, 7, 7, 7]);
        assert!(set.buffer(BufferId(0)).unwrap().iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn regions_match_declared_sizes_and_stay_put(
            sizes in proptest::collection::vec(0usize..4096, 0..8),
        ) {
            let mut set = PlannedBufferSet::build(sizes.len(), |id| sizes.get(id.index()).copied()).unwrap();
            prop_assert_eq!(set.len(), sizes.len());
            for (i, &s) in sizes.iter().enumerate() {
                prop_assert_eq!(set.size(BufferId(i as u32)), Some(s));
            }

            let first = set.address_ranges();
            {
                let view = set.as_view();
                prop_assert_eq!(view.address_ranges(), first.clone());
            }
            prop_assert_eq!(set.address_ranges(), first);
        }
    }
}
