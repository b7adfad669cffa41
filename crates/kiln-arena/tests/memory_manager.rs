//! Integration test: full construction of the bounded memory manager.
//!
//! Walks the load-cycle states from an empty workspace to an assembled
//! manager, checking the capacity scenarios and that the two memory tiers
//! never share bytes.

use kiln_arena::{ArenaError, MemoryManager, MetadataArena, Mismatch, PlannedBufferSet};
use kiln_core::{BufferId, PlannedMemory};

// ── Declared metadata ────────────────────────────────────────────────

struct Declared(Vec<Option<usize>>);

impl PlannedMemory for Declared {
    fn num_memory_planned_buffers(&self) -> usize {
        self.0.len()
    }

    fn memory_planned_buffer_size(&self, id: BufferId) -> Option<usize> {
        self.0.get(id.index()).copied().flatten()
    }
}

fn overlaps(a: &std::ops::Range<usize>, b: &std::ops::Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn four_mib_arena_with_two_planned_buffers() {
    let meta = Declared(vec![Some(1024), Some(2048)]);
    let mut arena = MetadataArena::new(4 * 1024 * 1024);
    let mut planned = PlannedBufferSet::from_meta(&meta).unwrap();
    assert_eq!(planned.len(), 2);
    assert_eq!(planned.size(BufferId(0)), Some(1024));
    assert_eq!(planned.size(BufferId(1)), Some(2048));

    let manager = MemoryManager::new(&mut arena, planned.as_view());
    assert!(manager.planned_memory().check_against(&meta).is_ok());
    assert_eq!(manager.method_allocator().capacity(), 4 * 1024 * 1024);
}

#[test]
fn sixteen_byte_arena_rejects_thirty_two_byte_request() {
    let mut arena = MetadataArena::new(16);
    let mut manager = MemoryManager::new(
        &mut arena,
        kiln_arena::HierarchicalAllocator::new(Vec::new()),
    );
    let err = manager.loading().arena().allocate(32).unwrap_err();
    assert_eq!(
        err,
        ArenaError::OutOfArenaSpace {
            requested: 32,
            remaining: 16,
            capacity: 16
        }
    );
    assert_eq!(manager.method_allocator().high_water_mark(), 0);
}

#[test]
fn undeclared_size_aborts_the_whole_build() {
    let meta = Declared(vec![Some(64), Some(64), None]);
    let result = PlannedBufferSet::from_meta(&meta);
    assert!(matches!(
        result,
        Err(ArenaError::SizeMismatch(Mismatch::Undeclared {
            id: BufferId(2),
            count: 3
        }))
    ));
}

#[test]
fn zero_planned_buffers_is_a_valid_manager() {
    let meta = Declared(Vec::new());
    let mut arena = MetadataArena::new(128);
    let mut planned = PlannedBufferSet::from_meta(&meta).unwrap();
    assert!(planned.is_empty());
    let manager = MemoryManager::new(&mut arena, planned.as_view());
    assert_eq!(manager.planned_memory().num_buffers(), 0);
}

// ── Isolation ────────────────────────────────────────────────────────

#[test]
fn arena_and_planned_buffers_do_not_overlap() {
    let meta = Declared(vec![Some(256), Some(512), Some(0), Some(128)]);
    let mut arena = MetadataArena::new(1024);
    let mut planned = PlannedBufferSet::from_meta(&meta).unwrap();
    let arena_range = arena.address_range();
    let manager = MemoryManager::new(&mut arena, planned.as_view());

    let ranges: Vec<_> = manager
        .planned_memory()
        .address_ranges()
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();
    for r in &ranges {
        assert!(!overlaps(r, &arena_range));
    }
    for (i, a) in ranges.iter().enumerate() {
        for b in &ranges[i + 1..] {
            assert!(!overlaps(a, b));
        }
    }
}

#[test]
fn writes_to_one_tier_never_appear_in_the_other() {
    let meta = Declared(vec![Some(64), Some(64)]);
    let mut arena = MetadataArena::new(64);
    let mut planned = PlannedBufferSet::from_meta(&meta).unwrap();
    let mut manager = MemoryManager::new(&mut arena, planned.as_view());

    let slot = {
        let mut grant = manager.loading();
        let slot = grant.arena().allocate(64).unwrap();
        grant.arena().slice_mut(slot).fill(0xAB);
        slot
    };

    let mut exec = manager.into_execution();
    exec.planned_mut()
        .offset_slice_mut(BufferId(0), 0, 64)
        .unwrap()
        .fill(0xCD);

    assert!(exec.metadata().slice(slot).iter().all(|&b| b == 0xAB));
    assert!(exec
        .planned()
        .offset_slice(BufferId(0), 0, 64)
        .unwrap()
        .iter()
        .all(|&b| b == 0xCD));
    assert!(!exec
        .planned()
        .offset_slice(BufferId(1), 0, 64)
        .unwrap()
        .contains(&0xCD));
}

#[test]
fn planned_addresses_are_stable_across_cycles_of_access() {
    let meta = Declared(vec![Some(32), Some(16)]);
    let mut planned = PlannedBufferSet::from_meta(&meta).unwrap();
    let before = planned.address_ranges();
    {
        let mut arena = MetadataArena::new(16);
        let manager = MemoryManager::new(&mut arena, planned.as_view());
        let mut exec = manager.into_execution();
        exec.planned_mut().store_f32(BufferId(1), 12, 1.0).unwrap();
    }
    assert_eq!(planned.address_ranges(), before);
}
