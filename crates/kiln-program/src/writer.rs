//! Program construction and encoding.
//!
//! [`ProgramWriter`] collects methods and constants and emits the binary
//! format. [`MethodBuilder`] assembles one method's value table and
//! instruction stream, handing back the ids it assigns so callers can
//! wire instructions together.
//!
//! # Examples
//!
//! ```
//! use kiln_program::{MethodBuilder, OpKind, Program, ProgramWriter};
//!
//! let mut m = MethodBuilder::new("forward");
//! let buf = m.planned_buffer(32);
//! let x = m.planned_f32(buf, 0, &[4]);
//! let y = m.planned_f32(buf, 16, &[4]);
//! m.input(x).output(y).instruction(OpKind::Relu, &[x, y]);
//!
//! let mut writer = ProgramWriter::new();
//! writer.add_method(m.build());
//! let bytes = writer.finish().unwrap();
//!
//! let program = Program::from_bytes(&bytes).unwrap();
//! assert_eq!(program.get_method_name(0).unwrap(), "forward");
//! ```

use std::io::Write;

use kiln_core::{BufferId, ScalarType, ValueId};

use crate::codec::{encode_body, encode_header};
use crate::error::ProgramError;
use crate::types::{Instruction, MethodDef, OpKind, Storage, TensorDef, ValueDef};

/// Encode a complete program to `w`.
pub fn encode_program(
    w: &mut dyn Write,
    methods: &[MethodDef],
    constants: &[Vec<u8>],
) -> Result<(), ProgramError> {
    encode_header(w)?;
    encode_body(w, methods, constants)
}

/// Collects methods and constants, then encodes them.
#[derive(Default)]
pub struct ProgramWriter {
    methods: Vec<MethodDef>,
    constants: Vec<Vec<u8>>,
}

impl ProgramWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a method. Methods are listed in the order added.
    pub fn add_method(&mut self, method: MethodDef) -> &mut Self {
        self.methods.push(method);
        self
    }

    /// Append a raw constant and return its index.
    pub fn add_constant(&mut self, bytes: Vec<u8>) -> u32 {
        self.constants.push(bytes);
        (self.constants.len() - 1) as u32
    }

    /// Append a constant holding little-endian `f32`s and return its index.
    pub fn add_constant_f32(&mut self, values: &[f32]) -> u32 {
        self.add_constant(values.iter().flat_map(|v| v.to_le_bytes()).collect())
    }

    /// Write the program to `w`.
    pub fn write_to(&self, w: &mut dyn Write) -> Result<(), ProgramError> {
        encode_program(w, &self.methods, &self.constants)
    }

    /// Encode the program into a fresh buffer.
    pub fn finish(&self) -> Result<Vec<u8>, ProgramError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// Incrementally builds a [`MethodDef`].
pub struct MethodBuilder {
    def: MethodDef,
}

impl MethodBuilder {
    /// Start a method called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            def: MethodDef {
                name: name.into(),
                planned_sizes: Vec::new(),
                values: Vec::new(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                instructions: Vec::new(),
            },
        }
    }

    /// Declare a planned buffer of `size` bytes.
    pub fn planned_buffer(&mut self, size: u64) -> BufferId {
        self.def.planned_sizes.push(size);
        BufferId((self.def.planned_sizes.len() - 1) as u32)
    }

    /// Add any value and return its id.
    pub fn value(&mut self, value: ValueDef) -> ValueId {
        self.def.values.push(value);
        ValueId((self.def.values.len() - 1) as u32)
    }

    /// Add an `f32` tensor stored in planned buffer `mem_id` at `offset`.
    pub fn planned_f32(&mut self, mem_id: BufferId, offset: u64, dims: &[u32]) -> ValueId {
        self.tensor(ScalarType::Float32, dims, Storage::Planned { mem_id, offset })
    }

    /// Add an `i32` tensor stored in planned buffer `mem_id` at `offset`.
    pub fn planned_i32(&mut self, mem_id: BufferId, offset: u64, dims: &[u32]) -> ValueId {
        self.tensor(ScalarType::Int32, dims, Storage::Planned { mem_id, offset })
    }

    /// Add an `f32` tensor backed by constant `index`.
    pub fn constant_f32(&mut self, index: u32, dims: &[u32]) -> ValueId {
        self.tensor(ScalarType::Float32, dims, Storage::Constant { index })
    }

    /// Add a double.
    pub fn double(&mut self, v: f64) -> ValueId {
        self.value(ValueDef::Double(v))
    }

    /// Mark `id` as the next input.
    pub fn input(&mut self, id: ValueId) -> &mut Self {
        self.def.inputs.push(id);
        self
    }

    /// Mark `id` as the next output.
    pub fn output(&mut self, id: ValueId) -> &mut Self {
        self.def.outputs.push(id);
        self
    }

    /// Append an instruction. `args` lists inputs first, output last.
    pub fn instruction(&mut self, op: OpKind, args: &[ValueId]) -> &mut Self {
        self.def.instructions.push(Instruction {
            op,
            args: args.iter().copied().collect(),
        });
        self
    }

    /// Finish the method.
    pub fn build(self) -> MethodDef {
        self.def
    }

    fn tensor(&mut self, scalar_type: ScalarType, dims: &[u32], storage: Storage) -> ValueId {
        self.value(ValueDef::Tensor(TensorDef {
            scalar_type,
            dims: dims.iter().copied().collect(),
            storage,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Program;

    #[test]
    fn builder_assigns_sequential_ids() {
        let mut m = MethodBuilder::new("m");
        assert_eq!(m.planned_buffer(8), BufferId(0));
        assert_eq!(m.planned_buffer(8), BufferId(1));
        assert_eq!(m.double(1.0), ValueId(0));
        assert_eq!(m.planned_f32(BufferId(0), 0, &[2]), ValueId(1));
        let def = m.build();
        assert_eq!(def.planned_sizes, vec![8, 8]);
        assert_eq!(def.values.len(), 2);
    }

    #[test]
    fn constants_are_indexed_in_order() {
        let mut w = ProgramWriter::new();
        assert_eq!(w.add_constant(vec![1]), 0);
        assert_eq!(w.add_constant_f32(&[1.0, 2.0]), 1);
        let program = Program::from_bytes(&w.finish().unwrap()).unwrap();
        assert_eq!(program.num_constants(), 2);
        assert_eq!(program.constant(1).unwrap().len(), 8);
        assert_eq!(
            program.constant(1).unwrap()[4..],
            2.0f32.to_le_bytes()
        );
    }

    #[test]
    fn empty_program_is_valid() {
        let bytes = ProgramWriter::new().finish().unwrap();
        let program = Program::from_bytes(&bytes).unwrap();
        assert_eq!(program.num_methods(), 0);
    }
}
