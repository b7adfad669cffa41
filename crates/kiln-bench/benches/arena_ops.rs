//! Criterion micro-benchmarks for metadata arena, planned buffer and
//! method binding operations.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use kiln_arena::{MemoryManager, MetadataArena, PlannedBufferSet};
use kiln_bench::{reference_program, ARENA_BYTES};
use kiln_program::Program;
use kiln_runtime::Method;

/// Benchmark: 1000 small aligned bump allocations into a fresh 64 KiB arena.
fn bench_arena_allocate_1k(c: &mut Criterion) {
    c.bench_function("arena_allocate_1k", |b| {
        b.iter(|| {
            let mut arena = MetadataArena::new(ARENA_BYTES);
            for i in 0..1000 {
                black_box(arena.allocate_aligned(12 + i % 20, 8).unwrap());
            }
            arena.high_water_mark()
        });
    });
}

/// Benchmark: build 16 planned buffers of 64 KiB each.
fn bench_planned_build_16(c: &mut Criterion) {
    c.bench_function("planned_build_16x64k", |b| {
        b.iter(|| {
            let set = PlannedBufferSet::build(16, |_| Some(64 * 1024)).unwrap();
            black_box(set.total_bytes())
        });
    });
}

/// Benchmark: assemble a memory manager and bind the reference method.
fn bench_method_load(c: &mut Criterion) {
    let program = Program::from_bytes(&reference_program(256)).unwrap();
    let meta = program.method_meta("forward").unwrap();
    let mut planned = PlannedBufferSet::from_meta(&meta).unwrap();

    c.bench_function("method_load_reference", |b| {
        b.iter(|| {
            // Arena space is never returned, so every bind needs a fresh arena.
            let mut arena = MetadataArena::new(ARENA_BYTES);
            let manager = MemoryManager::new(&mut arena, planned.as_view());
            let method = Method::load(&program, "forward", manager).unwrap();
            black_box(method.outputs_size())
        });
    });
}

criterion_group!(
    benches,
    bench_arena_allocate_1k,
    bench_planned_build_16,
    bench_method_load
);
criterion_main!(benches);
