//! Criterion micro-benchmarks for program encoding and parsing.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use kiln_bench::reference_program;
use kiln_program::{BufferDataLoader, Program};

/// Benchmark: encode a 256-wide reference program.
fn bench_encode_reference(c: &mut Criterion) {
    c.bench_function("encode_reference_256", |b| {
        b.iter(|| black_box(reference_program(black_box(256))).len());
    });
}

/// Benchmark: parse and validate a 256-wide reference program.
fn bench_load_reference(c: &mut Criterion) {
    let bytes = reference_program(256);
    c.bench_function("load_reference_256", |b| {
        b.iter(|| {
            let program = Program::load(&BufferDataLoader::new(black_box(&bytes))).unwrap();
            black_box(program.num_methods())
        });
    });
}

criterion_group!(benches, bench_encode_reference, bench_load_reference);
criterion_main!(benches);
