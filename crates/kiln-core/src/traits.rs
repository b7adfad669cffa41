//! Core abstraction traits for memory planning metadata.

use crate::id::BufferId;

/// Source of truth for a method's memory-planned buffers.
///
/// Implemented by the program's method metadata. The count and per-id
/// sizes come from an ahead-of-time memory planning pass and are treated
/// as authoritative: the planned buffer builder sizes each region exactly
/// as reported here, and the loader rejects any view that disagrees.
pub trait PlannedMemory {
    /// Number of memory-planned buffers the method expects.
    fn num_memory_planned_buffers(&self) -> usize;

    /// Size in bytes of planned buffer `id`.
    ///
    /// Returns `None` if `id` is outside `[0, num_memory_planned_buffers)`
    /// or the size is not known.
    fn memory_planned_buffer_size(&self, id: BufferId) -> Option<usize>;

    /// Total bytes across all planned buffers, or `None` if any size is
    /// unknown, the sum overflows, or the count exceeds the id space.
    fn total_planned_bytes(&self) -> Option<usize> {
        BufferId::first(self.num_memory_planned_buffers())?.try_fold(0usize, |acc, id| {
            let size = self.memory_planned_buffer_size(id)?;
            acc.checked_add(size)
        })
    }
}
