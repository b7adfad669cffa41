//! Portable `f32` kernels.
//!
//! Kernels read operands from planned memory or the constant segment and
//! write their result into planned memory in place. They never allocate
//! on the success path.

use kiln_arena::HierarchicalAllocator;
use kiln_core::{numel, BufferId, ScalarType};
use kiln_program::{OpKind, Program, ProgramError, Storage, ValueDef};

use crate::error::ExecError;

const F32: usize = 4;

// ── Operands ───────────────────────────────────────────────────────

enum Source<'p> {
    Planned { mem_id: BufferId, offset: usize },
    Constant(&'p [u8]),
}

struct Operand<'d, 'p> {
    dims: &'d [u32],
    source: Source<'p>,
}

impl Operand<'_, '_> {
    fn numel(&self) -> usize {
        numel(self.dims)
    }

    fn get(&self, planned: &HierarchicalAllocator<'_>, i: usize) -> Result<f32, ExecError> {
        match self.source {
            Source::Planned { mem_id, offset } => Ok(planned.load_f32(mem_id, offset + i * F32)?),
            Source::Constant(bytes) => bytes
                .get(i * F32..(i + 1) * F32)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or_else(|| corrupt("constant read past end")),
        }
    }

    fn set(
        &self,
        planned: &mut HierarchicalAllocator<'_>,
        i: usize,
        v: f32,
    ) -> Result<(), ExecError> {
        match self.source {
            Source::Planned { mem_id, offset } => {
                Ok(planned.store_f32(mem_id, offset + i * F32, v)?)
            }
            Source::Constant(_) => Err(corrupt("write to constant tensor")),
        }
    }
}

fn corrupt(detail: &str) -> ExecError {
    ExecError::Metadata(ProgramError::Malformed {
        detail: detail.into(),
    })
}

fn tensor<'d, 'p>(
    op: OpKind,
    value: &'d ValueDef,
    program: &'p Program,
) -> Result<Operand<'d, 'p>, ExecError> {
    let ValueDef::Tensor(t) = value else {
        return Err(corrupt("operand is not a tensor"));
    };
    if t.scalar_type != ScalarType::Float32 {
        return Err(ExecError::UnsupportedScalarType {
            op,
            found: t.scalar_type,
        });
    }
    let source = match t.storage {
        Storage::Planned { mem_id, offset } => Source::Planned {
            mem_id,
            offset: offset as usize,
        },
        Storage::Constant { index } => Source::Constant(
            program
                .constant(index)
                .ok_or_else(|| corrupt("constant index out of range"))?,
        ),
    };
    Ok(Operand {
        dims: &t.dims,
        source,
    })
}

fn same_shape(op: OpKind, operands: &[&Operand<'_, '_>]) -> Result<(), ExecError> {
    let first = operands[0].dims;
    if operands.iter().all(|o| o.dims == first) {
        return Ok(());
    }
    let shapes: Vec<&[u32]> = operands.iter().map(|o| o.dims).collect();
    Err(ExecError::ShapeMismatch {
        op,
        detail: format!("operands must share one shape, got {shapes:?}"),
    })
}

// ── Dispatch ───────────────────────────────────────────────────────

/// Run `op` over `args` (inputs first, output last).
pub(crate) fn run(
    op: OpKind,
    args: &[ValueDef],
    planned: &mut HierarchicalAllocator<'_>,
    program: &Program,
) -> Result<(), ExecError> {
    match op {
        OpKind::Add => binary(op, args, planned, program, |a, b| a + b),
        OpKind::Mul => binary(op, args, planned, program, |a, b| a * b),
        OpKind::Relu => {
            let x = tensor(op, &args[0], program)?;
            let out = tensor(op, &args[1], program)?;
            same_shape(op, &[&x, &out])?;
            for i in 0..out.numel() {
                let v = x.get(planned, i)?;
                out.set(planned, i, v.max(0.0))?;
            }
            Ok(())
        }
        OpKind::Scale => {
            let x = tensor(op, &args[0], program)?;
            let ValueDef::Double(s) = args[1] else {
                return Err(corrupt("scale factor is not a double"));
            };
            let out = tensor(op, &args[2], program)?;
            same_shape(op, &[&x, &out])?;
            let s = s as f32;
            for i in 0..out.numel() {
                let v = x.get(planned, i)?;
                out.set(planned, i, v * s)?;
            }
            Ok(())
        }
        OpKind::Linear => linear(args, planned, program),
    }
}

fn binary(
    op: OpKind,
    args: &[ValueDef],
    planned: &mut HierarchicalAllocator<'_>,
    program: &Program,
    f: impl Fn(f32, f32) -> f32,
) -> Result<(), ExecError> {
    let a = tensor(op, &args[0], program)?;
    let b = tensor(op, &args[1], program)?;
    let out = tensor(op, &args[2], program)?;
    same_shape(op, &[&a, &b, &out])?;
    for i in 0..out.numel() {
        let v = f(a.get(planned, i)?, b.get(planned, i)?);
        out.set(planned, i, v)?;
    }
    Ok(())
}

/// `out[n, m] = x[n, k] · w[m, k]ᵀ + b[m]`
fn linear(
    args: &[ValueDef],
    planned: &mut HierarchicalAllocator<'_>,
    program: &Program,
) -> Result<(), ExecError> {
    let op = OpKind::Linear;
    let x = tensor(op, &args[0], program)?;
    let w = tensor(op, &args[1], program)?;
    let b = tensor(op, &args[2], program)?;
    let out = tensor(op, &args[3], program)?;

    let (n, k, m) = match (x.dims, w.dims, b.dims, out.dims) {
        (&[n, k], &[m, wk], &[bm], &[on, om]) if wk == k && bm == m && on == n && om == m => {
            (n as usize, k as usize, m as usize)
        }
        _ => {
            return Err(ExecError::ShapeMismatch {
                op,
                detail: format!(
                    "expected x[n,k] w[m,k] b[m] out[n,m], got x{:?} w{:?} b{:?} out{:?}",
                    x.dims, w.dims, b.dims, out.dims
                ),
            })
        }
    };

    for row in 0..n {
        for col in 0..m {
            let mut acc = b.get(planned, col)?;
            for i in 0..k {
                acc += x.get(planned, row * k + i)? * w.get(planned, col * k + i)?;
            }
            out.set(planned, row * m + col, acc)?;
        }
    }
    Ok(())
}
