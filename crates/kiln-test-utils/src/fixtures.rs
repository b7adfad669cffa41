//! Reusable program fixtures.
//!
//! Each builder returns encoded program bytes:
//!
//! - [`add_relu_program`]: `forward(x, y) = relu(x + y)` over four floats.
//! - [`mlp_program`]: a two-layer perceptron with constant weights, plus a
//!   `double` method that scales its input by two.
//! - [`mixed_outputs_program`]: returns a tensor and every scalar kind.
//! - [`wide_relu_program`]: one long tensor, for edge-item printing.

use kiln_program::{MethodBuilder, OpKind, ProgramWriter, ValueDef};

pub const MLP_IN: usize = 4;
pub const MLP_HIDDEN: usize = 8;
pub const MLP_OUT: usize = 2;

fn finish(writer: &ProgramWriter) -> Vec<u8> {
    writer.finish().expect("fixture program encodes")
}

pub fn add_relu_program() -> Vec<u8> {
    let mut m = MethodBuilder::new("forward");
    let buf = m.planned_buffer(48);
    let x = m.planned_f32(buf, 0, &[4]);
    let y = m.planned_f32(buf, 16, &[4]);
    let out = m.planned_f32(buf, 32, &[4]);
    m.input(x)
        .input(y)
        .output(out)
        .instruction(OpKind::Add, &[x, y, out])
        .instruction(OpKind::Relu, &[out, out]);

    let mut w = ProgramWriter::new();
    w.add_method(m.build());
    finish(&w)
}

fn w1() -> Vec<f32> {
    (0..MLP_HIDDEN * MLP_IN)
        .map(|i| ((i % 5) as f32 - 2.0) * 0.25)
        .collect()
}

fn b1() -> Vec<f32> {
    (0..MLP_HIDDEN).map(|i| i as f32 * 0.1 - 0.3).collect()
}

fn w2() -> Vec<f32> {
    (0..MLP_OUT * MLP_HIDDEN)
        .map(|i| if i % 3 == 0 { 0.5 } else { -0.125 })
        .collect()
}

fn b2() -> Vec<f32> {
    vec![1.0, -1.0]
}

/// `relu(x · w1ᵀ + b1) · w2ᵀ + b2` computed directly, for comparison with
/// the `forward` method of [`mlp_program`].
pub fn mlp_reference(x: &[f32]) -> Vec<f32> {
    let (w1, b1, w2, b2) = (w1(), b1(), w2(), b2());
    let hidden: Vec<f32> = (0..MLP_HIDDEN)
        .map(|h| {
            let acc = b1[h] + (0..MLP_IN).map(|i| x[i] * w1[h * MLP_IN + i]).sum::<f32>();
            acc.max(0.0)
        })
        .collect();
    (0..MLP_OUT)
        .map(|o| b2[o] + (0..MLP_HIDDEN).map(|h| hidden[h] * w2[o * MLP_HIDDEN + h]).sum::<f32>())
        .collect()
}

pub fn mlp_program() -> Vec<u8> {
    let mut w = ProgramWriter::new();
    let (cw1, cb1) = (w.add_constant_f32(&w1()), w.add_constant_f32(&b1()));
    let (cw2, cb2) = (w.add_constant_f32(&w2()), w.add_constant_f32(&b2()));

    let mut m = MethodBuilder::new("forward");
    // Activations share buffer 0; the result lives alone in buffer 1.
    let act = m.planned_buffer(((MLP_IN + MLP_HIDDEN) * 4) as u64);
    let res = m.planned_buffer((MLP_OUT * 4) as u64);
    let x = m.planned_f32(act, 0, &[1, MLP_IN as u32]);
    let h = m.planned_f32(act, (MLP_IN * 4) as u64, &[1, MLP_HIDDEN as u32]);
    let out = m.planned_f32(res, 0, &[1, MLP_OUT as u32]);
    let w1v = m.constant_f32(cw1, &[MLP_HIDDEN as u32, MLP_IN as u32]);
    let b1v = m.constant_f32(cb1, &[MLP_HIDDEN as u32]);
    let w2v = m.constant_f32(cw2, &[MLP_OUT as u32, MLP_HIDDEN as u32]);
    let b2v = m.constant_f32(cb2, &[MLP_OUT as u32]);
    m.input(x)
        .output(out)
        .instruction(OpKind::Linear, &[x, w1v, b1v, h])
        .instruction(OpKind::Relu, &[h, h])
        .instruction(OpKind::Linear, &[h, w2v, b2v, out]);
    w.add_method(m.build());

    let mut d = MethodBuilder::new("double");
    let buf = d.planned_buffer(32);
    let x = d.planned_f32(buf, 0, &[4]);
    let out = d.planned_f32(buf, 16, &[4]);
    let two = d.double(2.0);
    d.input(x)
        .output(out)
        .instruction(OpKind::Scale, &[x, two, out]);
    w.add_method(d.build());

    finish(&w)
}

pub fn mixed_outputs_program() -> Vec<u8> {
    let mut m = MethodBuilder::new("forward");
    let buf = m.planned_buffer(8);
    let t = m.planned_i32(buf, 0, &[2]);
    let i = m.value(ValueDef::Int(7));
    let d = m.value(ValueDef::Double(0.25));
    let b = m.value(ValueDef::Bool(false));
    let n = m.value(ValueDef::None);
    m.input(t).output(t).output(i).output(d).output(b).output(n);

    let mut w = ProgramWriter::new();
    w.add_method(m.build());
    finish(&w)
}

pub fn wide_relu_program(len: u32) -> Vec<u8> {
    let mut m = MethodBuilder::new("forward");
    let buf = m.planned_buffer(u64::from(len) * 4);
    let x = m.planned_f32(buf, 0, &[len]);
    m.input(x).output(x).instruction(OpKind::Relu, &[x, x]);

    let mut w = ProgramWriter::new();
    w.add_method(m.build());
    finish(&w)
}
