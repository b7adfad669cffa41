//! Allocation statistics for sizing metadata arenas.

/// Statistics recorded by a [`MetadataArena`](crate::MetadataArena) with
/// profiling enabled.
///
/// `high_water_bytes` is what a caller should size the arena to for this
/// method; `capacity_bytes` is what it was actually given.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocatorProfile {
    /// Name given to [`enable_profiling`](crate::MetadataArena::enable_profiling).
    pub name: String,
    /// Declared arena capacity in bytes.
    pub capacity_bytes: usize,
    /// Number of successful allocations.
    pub allocations: u64,
    /// Bytes requested by successful allocations, excluding alignment padding.
    pub requested_bytes: u64,
    /// Highest offset reached, including alignment padding.
    pub high_water_bytes: usize,
    /// Number of allocations rejected for lack of space.
    pub failed_allocations: u64,
}

impl AllocatorProfile {
    pub(crate) fn new(name: String, capacity_bytes: usize) -> Self {
        Self {
            name,
            capacity_bytes,
            ..Self::default()
        }
    }

    /// Fraction of the capacity reached by the high-water mark, in `[0, 1]`.
    ///
    /// A zero-capacity arena reports `0.0`.
    pub fn utilisation(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }
        self.high_water_bytes as f64 / self.capacity_bytes as f64
    }
}
