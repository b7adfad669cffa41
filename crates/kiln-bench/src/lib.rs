//! Benchmark programs for the Kiln model runtime.
//!
//! - [`reference_program`]: a two-layer perceptron of configurable width
//! - [`ARENA_BYTES`]: a metadata arena capacity that fits it at any width

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use kiln_program::{MethodBuilder, OpKind, ProgramWriter};

/// Metadata arena capacity for [`reference_program`]. Method metadata
/// does not grow with tensor width.
pub const ARENA_BYTES: usize = 64 * 1024;

/// Encode a reference program: `forward(x[1, width])` runs
/// `linear → relu → linear → relu` with square `width × width` weights.
///
/// Planned memory is two buffers: one for activations, one for the result.
pub fn reference_program(width: u32) -> Vec<u8> {
    let w = width as usize;
    let mut writer = ProgramWriter::new();
    let weights = |seed: usize| -> Vec<f32> {
        (0..w * w)
            .map(|i| (((i + seed) as u64 * 2_654_435_761) % 1000) as f32 / 1000.0 - 0.5)
            .collect()
    };
    let cw1 = writer.add_constant_f32(&weights(1));
    let cb1 = writer.add_constant_f32(&vec![0.01; w]);
    let cw2 = writer.add_constant_f32(&weights(7));
    let cb2 = writer.add_constant_f32(&vec![-0.01; w]);

    let row = (w * 4) as u64;
    let mut m = MethodBuilder::new("forward");
    let act = m.planned_buffer(row * 2);
    let res = m.planned_buffer(row);
    let x = m.planned_f32(act, 0, &[1, width]);
    let h = m.planned_f32(act, row, &[1, width]);
    let out = m.planned_f32(res, 0, &[1, width]);
    let w1 = m.constant_f32(cw1, &[width, width]);
    let b1 = m.constant_f32(cb1, &[width]);
    let w2 = m.constant_f32(cw2, &[width, width]);
    let b2 = m.constant_f32(cb2, &[width]);
    m.input(x)
        .output(out)
        .instruction(OpKind::Linear, &[x, w1, b1, h])
        .instruction(OpKind::Relu, &[h, h])
        .instruction(OpKind::Linear, &[h, w2, b2, out])
        .instruction(OpKind::Relu, &[out, out]);
    writer.add_method(m.build());

    writer.finish().expect("reference program encodes")
}
