//! Data types describing a decoded program.

use std::fmt;

use kiln_core::{numel, BufferId, ScalarType, Shape, ValueId};
use smallvec::SmallVec;

/// Where a tensor's bytes live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Inside a memory-planned buffer, at a fixed byte offset.
    Planned {
        /// The planned buffer holding the data.
        mem_id: BufferId,
        /// Byte offset inside that buffer.
        offset: u64,
    },
    /// A read-only entry of the program's constant segment.
    Constant {
        /// Index into the constant segment.
        index: u32,
    },
}

/// Static description of a tensor value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorDef {
    /// Element type.
    pub scalar_type: ScalarType,
    /// Dimensions, outermost first.
    pub dims: Shape,
    /// Backing storage.
    pub storage: Storage,
}

impl TensorDef {
    /// Number of elements.
    pub fn numel(&self) -> usize {
        numel(&self.dims)
    }

    /// Size of the tensor data in bytes, or `None` on overflow.
    pub fn nbytes(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(self.scalar_type.element_size(), |acc, &d| {
                acc.checked_mul(d as usize)
            })
    }
}

/// One entry in a method's value table.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueDef {
    /// No value.
    None,
    /// A 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Double(f64),
    /// A boolean.
    Bool(bool),
    /// A tensor.
    Tensor(TensorDef),
}

impl ValueDef {
    /// On-disk type tag.
    pub fn tag(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Int(_) => 1,
            Self::Double(_) => 2,
            Self::Bool(_) => 3,
            Self::Tensor(_) => 4,
        }
    }

    /// The tensor description, if this value is a tensor.
    pub fn as_tensor(&self) -> Option<&TensorDef> {
        match self {
            Self::Tensor(t) => Some(t),
            _ => None,
        }
    }
}

/// Operator selected by an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpKind {
    /// `out = a + b`, elementwise.
    Add = 0,
    /// `out = a * b`, elementwise.
    Mul = 1,
    /// `out = max(x, 0)`.
    Relu = 2,
    /// `out[n, m] = x[n, k] · w[m, k]ᵀ + b[m]`.
    Linear = 3,
    /// `out = x * s` with `s` a double.
    Scale = 4,
}

impl OpKind {
    /// The on-disk opcode.
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Decode an opcode.
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0 => Some(Self::Add),
            1 => Some(Self::Mul),
            2 => Some(Self::Relu),
            3 => Some(Self::Linear),
            4 => Some(Self::Scale),
            _ => None,
        }
    }

    /// Number of value arguments, output last.
    pub fn arity(self) -> usize {
        match self {
            Self::Relu => 2,
            Self::Add | Self::Mul | Self::Scale => 3,
            Self::Linear => 4,
        }
    }

    /// Operator name as shown in logs and profiles.
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Mul => "mul",
            Self::Relu => "relu",
            Self::Linear => "linear",
            Self::Scale => "scale",
        }
    }

    /// Whether argument `position` must be a tensor. `Scale`'s factor is
    /// the only non-tensor argument.
    pub fn expects_tensor(self, position: usize) -> bool {
        !(self == Self::Scale && position == 1)
    }

    /// Whether output element `i` depends only on element `i` of each
    /// input, so the output may exactly alias an input.
    pub fn is_elementwise(self) -> bool {
        self != Self::Linear
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a method's instruction stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// The operator.
    pub op: OpKind,
    /// Value-table indices, output last.
    pub args: SmallVec<[ValueId; 4]>,
}

impl Instruction {
    /// The value written by this instruction.
    pub fn output(&self) -> Option<ValueId> {
        self.args.last().copied()
    }
}

/// A fully decoded method.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDef {
    /// Method name, unique within the program.
    pub name: String,
    /// Size in bytes of each memory-planned buffer, indexed by buffer id.
    pub planned_sizes: Vec<u64>,
    /// Value table.
    pub values: Vec<ValueDef>,
    /// Value-table indices of the inputs, in call order.
    pub inputs: Vec<ValueId>,
    /// Value-table indices of the outputs, in return order.
    pub outputs: Vec<ValueId>,
    /// Instructions, executed in order.
    pub instructions: Vec<Instruction>,
}

impl MethodDef {
    /// The value at `id`, if in range.
    pub fn value(&self, id: ValueId) -> Option<&ValueDef> {
        self.values.get(id.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn tensor(dims: &[u32]) -> TensorDef {
        TensorDef {
            scalar_type: ScalarType::Float32,
            dims: dims.iter().copied().collect(),
            storage: Storage::Planned {
                mem_id: BufferId(0),
                offset: 0,
            },
        }
    }

    #[test]
    fn opcodes_decode_to_their_kind() {
        for op in [
            OpKind::Add,
            OpKind::Mul,
            OpKind::Relu,
            OpKind::Linear,
            OpKind::Scale,
        ] {
            assert_eq!(OpKind::from_opcode(op.opcode()), Some(op));
        }
        assert_eq!(OpKind::from_opcode(5), None);
    }

    #[test]
    fn arity_counts_the_output() {
        assert_eq!(OpKind::Relu.arity(), 2);
        assert_eq!(OpKind::Add.arity(), 3);
        assert_eq!(OpKind::Linear.arity(), 4);
    }

    #[test]
    fn only_the_scale_factor_is_not_a_tensor() {
        assert!(!OpKind::Scale.expects_tensor(1));
        assert!(OpKind::Scale.expects_tensor(0));
        assert!(OpKind::Mul.expects_tensor(1));
    }

    #[test]
    fn tensor_nbytes_accounts_for_element_size() {
        assert_eq!(tensor(&[2, 3]).nbytes(), Some(24));
        assert_eq!(tensor(&[]).nbytes(), Some(4));
        assert_eq!(tensor(&[2, 0]).nbytes(), Some(0));
        assert_eq!(tensor(&[u32::MAX, u32::MAX, u32::MAX]).nbytes(), None);
    }

    #[test]
    fn instruction_output_is_last_arg() {
        let ins = Instruction {
            op: OpKind::Relu,
            args: smallvec![ValueId(0), ValueId(1)],
        };
        assert_eq!(ins.output(), Some(ValueId(1)));
    }
}
