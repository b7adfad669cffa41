//! Composite allocator handed to method loading.
//!
//! [`MemoryManager`] aggregates a [`MetadataArena`] and a
//! [`HierarchicalAllocator`] without owning either. Its borrows tie the
//! lifetime of anything bound against it to the storage it references,
//! so region addresses and sizes stay fixed for as long as a method is
//! alive.

use crate::hierarchical::HierarchicalAllocator;
use crate::metadata::MetadataArena;

/// Non-owning aggregate of the two memory tiers a method needs.
///
/// Construction is pure aggregation and cannot fail: both references are
/// non-null by construction and an empty planned view is valid for
/// methods with no planned buffers.
pub struct MemoryManager<'a> {
    method_allocator: &'a mut MetadataArena,
    planned_memory: HierarchicalAllocator<'a>,
}

impl<'a> MemoryManager<'a> {
    /// Aggregate an arena and a planned-buffer view.
    pub fn new(
        method_allocator: &'a mut MetadataArena,
        planned_memory: HierarchicalAllocator<'a>,
    ) -> Self {
        Self {
            method_allocator,
            planned_memory,
        }
    }

    /// The metadata arena, read-only.
    pub fn method_allocator(&self) -> &MetadataArena {
        self.method_allocator
    }

    /// The planned-buffer view, read-only.
    pub fn planned_memory(&self) -> &HierarchicalAllocator<'a> {
        &self.planned_memory
    }

    /// Capability for the loading step: arena writable, planned view
    /// read-only.
    pub fn loading(&mut self) -> LoadGrant<'_, 'a> {
        LoadGrant {
            arena: self.method_allocator,
            planned: &self.planned_memory,
        }
    }

    /// Give up arena write access and keep the planned view for
    /// execution.
    pub fn into_execution(self) -> ExecGrant<'a> {
        let MemoryManager {
            method_allocator,
            planned_memory,
        } = self;
        ExecGrant {
            metadata: method_allocator,
            planned: planned_memory,
        }
    }
}

/// Load-time capability: the arena may grow, planned memory is untouched.
pub struct LoadGrant<'m, 'a> {
    arena: &'m mut MetadataArena,
    planned: &'m HierarchicalAllocator<'a>,
}

impl<'a> LoadGrant<'_, 'a> {
    /// The metadata arena, writable.
    pub fn arena(&mut self) -> &mut MetadataArena {
        self.arena
    }

    /// The planned-buffer view, read-only.
    pub fn planned(&self) -> &HierarchicalAllocator<'a> {
        self.planned
    }
}

/// Execution capability: planned memory is writable, the arena is frozen.
#[derive(Debug)]
pub struct ExecGrant<'a> {
    metadata: &'a MetadataArena,
    planned: HierarchicalAllocator<'a>,
}

impl<'a> ExecGrant<'a> {
    /// The frozen metadata arena.
    pub fn metadata(&self) -> &'a MetadataArena {
        self.metadata
    }

    /// The planned-buffer view, read-only.
    pub fn planned(&self) -> &HierarchicalAllocator<'a> {
        &self.planned
    }

    /// The planned-buffer view, writable.
    pub fn planned_mut(&mut self) -> &mut HierarchicalAllocator<'a> {
        &mut self.planned
    }
}
