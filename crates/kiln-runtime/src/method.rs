//! A method bound to bounded memory.
//!
//! [`Method::load`] lays every value descriptor, the input and output
//! index lists and the instruction stream out in the metadata arena, then
//! gives up write access to the arena. From then on the only memory a
//! method mutates is its planned buffers.
//!
//! # Arena layout
//!
//! ```text
//! value index   [ (record offset u64, record len u32) × values ]
//! records       [ encoded value descriptors ... ]
//! inputs        [ value id u32 × inputs ]
//! outputs       [ value id u32 × outputs ]
//! instructions  [ opcode u8, argc u8, value id u32 × argc ]*
//! ```

use std::time::Instant;

use kiln_arena::{
    ArenaError, ArenaSlot, ExecGrant, HierarchicalAllocator, MemoryManager, MetadataArena,
};
use kiln_core::{BufferId, ScalarType, ValueId};
use kiln_program::codec::{
    decode_instruction, decode_value, encode_instruction, encode_value, instruction_encoded_len,
    value_encoded_len,
};
use kiln_program::{MethodDef, MethodMeta, Program, ProgramError, Storage, TensorDef, ValueDef};
use smallvec::SmallVec;
use tracing::{debug, info, trace};

use crate::error::{ExecError, LoadError};
use crate::kernels;
use crate::profile::{InstructionTiming, MethodProfile, ProfileResult};
use crate::value::{EValue, TensorView};

// Compile-time assertion: a bound method can move to another thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Method<'static>>();
    }
};

const INDEX_ENTRY_BYTES: usize = 12;

/// Where each descriptor table lives in the metadata arena.
#[derive(Clone, Copy, Debug)]
struct Layout {
    value_index: ArenaSlot,
    records: ArenaSlot,
    inputs: ArenaSlot,
    outputs: ArenaSlot,
    instructions: ArenaSlot,
    num_values: usize,
    num_inputs: usize,
    num_outputs: usize,
    num_instructions: usize,
}

fn encode_layout(arena: &mut MetadataArena, def: &MethodDef) -> Result<Layout, LoadError> {
    let value_index = arena.allocate_aligned(def.values.len() * INDEX_ENTRY_BYTES, 8)?;
    let records_len = def.values.iter().map(value_encoded_len).sum();
    let records = arena.allocate(records_len)?;

    let mut cursor = 0usize;
    for (i, value) in def.values.iter().enumerate() {
        let len = value_encoded_len(value);
        let mut out = &mut arena.slice_mut(records)[cursor..cursor + len];
        encode_value(&mut out, value)?;

        let entry = &mut arena.slice_mut(value_index)[i * INDEX_ENTRY_BYTES..][..INDEX_ENTRY_BYTES];
        entry[..8].copy_from_slice(&(cursor as u64).to_le_bytes());
        entry[8..].copy_from_slice(&(len as u32).to_le_bytes());
        cursor += len;
    }

    let inputs = encode_ids(arena, &def.inputs)?;
    let outputs = encode_ids(arena, &def.outputs)?;

    let stream_len = def.instructions.iter().map(instruction_encoded_len).sum();
    let instructions = arena.allocate(stream_len)?;
    let mut out: &mut [u8] = arena.slice_mut(instructions);
    for ins in &def.instructions {
        encode_instruction(&mut out, ins)?;
    }

    Ok(Layout {
        value_index,
        records,
        inputs,
        outputs,
        instructions,
        num_values: def.values.len(),
        num_inputs: def.inputs.len(),
        num_outputs: def.outputs.len(),
        num_instructions: def.instructions.len(),
    })
}

fn encode_ids(arena: &mut MetadataArena, ids: &[ValueId]) -> Result<ArenaSlot, ArenaError> {
    let slot = arena.allocate_aligned(ids.len() * 4, 4)?;
    let out = arena.slice_mut(slot);
    for (chunk, id) in out.chunks_exact_mut(4).zip(ids) {
        chunk.copy_from_slice(&id.0.to_le_bytes());
    }
    Ok(slot)
}

fn corrupt(detail: &str) -> ExecError {
    ExecError::Metadata(ProgramError::Malformed {
        detail: detail.into(),
    })
}

// ── Method ─────────────────────────────────────────────────────────

/// A loaded method, ready to execute against its planned memory.
///
/// The method borrows its program, its metadata arena and its planned
/// buffers for `'a`. All of them outlive it, and their addresses stay
/// fixed while it exists. Execution takes `&mut self`: one thread at a
/// time. Run concurrent inferences by binding one method per thread,
/// each with its own arena and buffers, over a shared [`Program`].
#[derive(Debug)]
pub struct Method<'a> {
    program: &'a Program,
    meta: MethodMeta<'a>,
    exec: ExecGrant<'a>,
    layout: Layout,
    executions: u64,
    timings: Option<Vec<InstructionTiming>>,
}

impl<'a> Method<'a> {
    /// Bind method `name` of `program` to the memory in `manager`.
    ///
    /// Fails with [`ArenaError::SizeMismatch`] if the planned view does not
    /// match the method's declared buffers, and with
    /// [`ArenaError::OutOfArenaSpace`] if the arena is too small for the
    /// method's descriptors.
    pub fn load(
        program: &'a Program,
        name: &str,
        mut manager: MemoryManager<'a>,
    ) -> Result<Self, LoadError> {
        let meta = program.method_meta(name)?;
        let def = meta.def();
        manager.planned_memory().check_against(&meta)?;

        let layout = {
            let mut grant = manager.loading();
            encode_layout(grant.arena(), def)?
        };
        let exec = manager.into_execution();

        info!(
            method = %def.name,
            values = layout.num_values,
            instructions = layout.num_instructions,
            arena_used = exec.metadata().used(),
            arena_capacity = exec.metadata().capacity(),
            "method loaded"
        );

        Ok(Self {
            program,
            meta,
            exec,
            layout,
            executions: 0,
            timings: None,
        })
    }

    /// Method name.
    pub fn name(&self) -> &'a str {
        self.meta.name()
    }

    /// Declared metadata of this method.
    pub fn method_meta(&self) -> MethodMeta<'a> {
        self.meta
    }

    /// The program the method was loaded from.
    pub fn program(&self) -> &'a Program {
        self.program
    }

    /// The frozen metadata arena.
    pub fn metadata(&self) -> &'a MetadataArena {
        self.exec.metadata()
    }

    /// The planned-buffer view.
    pub fn planned(&self) -> &HierarchicalAllocator<'a> {
        self.exec.planned()
    }

    /// Number of inputs.
    pub fn inputs_size(&self) -> usize {
        self.layout.num_inputs
    }

    /// Number of outputs.
    pub fn outputs_size(&self) -> usize {
        self.layout.num_outputs
    }

    /// Number of completed executions.
    pub fn executions(&self) -> u64 {
        self.executions
    }

    // ── Execution ──────────────────────────────────────────────────

    /// Run every instruction once, in order.
    ///
    /// A failing instruction aborts the run; planned memory keeps whatever
    /// earlier instructions wrote.
    pub fn execute(&mut self) -> Result<(), ExecError> {
        let started = Instant::now();
        let mut stream: &'a [u8] = self.metadata().slice(self.layout.instructions);

        for n in 0..self.layout.num_instructions {
            let ins_start = self.timings.is_some().then(Instant::now);
            let ins = decode_instruction(&mut stream)?;
            let mut operands: SmallVec<[ValueDef; 4]> = SmallVec::new();
            for &arg in &ins.args {
                operands.push(self.value_def(arg)?);
            }
            trace!(instruction = n, op = %ins.op, "executing");
            kernels::run(ins.op, &operands, self.exec.planned_mut(), self.program)?;

            if let (Some(timings), Some(start)) = (self.timings.as_mut(), ins_start) {
                if let Some(t) = timings.get_mut(n) {
                    t.record(start.elapsed());
                }
            }
        }

        self.executions += 1;
        debug!(
            method = self.name(),
            execution = self.executions,
            elapsed_us = started.elapsed().as_micros() as u64,
            "method executed"
        );
        Ok(())
    }

    // ── Inputs ─────────────────────────────────────────────────────

    /// Input `index`.
    pub fn input(&self, index: usize) -> Result<EValue<'_>, ExecError> {
        let def = self.list_value("input", self.layout.inputs, self.layout.num_inputs, index)?;
        self.to_evalue(def)
    }

    /// Copy `data` into `Float32` input tensor `index`.
    pub fn set_input_f32(&mut self, index: usize, data: &[f32]) -> Result<(), ExecError> {
        let (t, offset) = self.input_tensor(index)?;
        if t.scalar_type != ScalarType::Float32 {
            return Err(ExecError::InputMismatch {
                index,
                detail: format!("expected {} data, tensor is {}", ScalarType::Float32, t.scalar_type),
            });
        }
        if data.len() != t.numel() {
            return Err(ExecError::InputMismatch {
                index,
                detail: format!("got {} elements, tensor has {}", data.len(), t.numel()),
            });
        }
        let (mem_id, base) = offset;
        let planned = self.exec.planned_mut();
        for (i, &v) in data.iter().enumerate() {
            planned.store_f32(mem_id, base + i * 4, v)?;
        }
        Ok(())
    }

    /// Fill every element of input tensor `index` with `value`, converted
    /// to the tensor's element type.
    pub fn fill_input(&mut self, index: usize, value: f32) -> Result<(), ExecError> {
        let (t, (mem_id, base)) = self.input_tensor(index)?;
        let planned = self.exec.planned_mut();
        for i in 0..t.numel() {
            let at = base + i * t.scalar_type.element_size();
            match t.scalar_type {
                ScalarType::Float32 => planned.store_f32(mem_id, at, value)?,
                ScalarType::Int32 => planned.store_i32(mem_id, at, value as i32)?,
            }
        }
        Ok(())
    }

    /// Whether input `index` is a tensor.
    pub fn input_is_tensor(&self, index: usize) -> Result<bool, ExecError> {
        let def = self.list_value("input", self.layout.inputs, self.layout.num_inputs, index)?;
        Ok(matches!(def, ValueDef::Tensor(_)))
    }

    fn input_tensor(
        &self,
        index: usize,
    ) -> Result<(TensorDef, (BufferId, usize)), ExecError> {
        let def = self.list_value("input", self.layout.inputs, self.layout.num_inputs, index)?;
        let ValueDef::Tensor(t) = def else {
            return Err(ExecError::NotATensor {
                what: "input",
                index,
            });
        };
        match t.storage {
            Storage::Planned { mem_id, offset } => Ok((t, (mem_id, offset as usize))),
            Storage::Constant { .. } => Err(corrupt("input tensor is constant")),
        }
    }

    // ── Outputs ────────────────────────────────────────────────────

    /// Output `index`, borrowing tensor data from method memory.
    pub fn output(&self, index: usize) -> Result<EValue<'_>, ExecError> {
        let def = self.list_value("output", self.layout.outputs, self.layout.num_outputs, index)?;
        self.to_evalue(def)
    }

    /// Fill `out` with every output and return how many were written.
    ///
    /// Fails with [`ExecError::OutputBufferTooSmall`] if `out` is shorter
    /// than [`outputs_size`](Self::outputs_size); `out` is left untouched.
    pub fn get_outputs<'s>(&'s self, out: &mut [EValue<'s>]) -> Result<usize, ExecError> {
        let needed = self.outputs_size();
        if out.len() < needed {
            return Err(ExecError::OutputBufferTooSmall {
                needed,
                provided: out.len(),
            });
        }
        for (i, slot) in out.iter_mut().take(needed).enumerate() {
            *slot = self.output(i)?;
        }
        Ok(needed)
    }

    // ── Profiling ──────────────────────────────────────────────────

    /// Start recording per-instruction wall time. The timing table is
    /// sized once, here; execution only updates it.
    pub fn enable_profiling(&mut self) -> Result<(), ExecError> {
        let mut stream: &[u8] = self.metadata().slice(self.layout.instructions);
        let mut table = Vec::with_capacity(self.layout.num_instructions);
        for _ in 0..self.layout.num_instructions {
            table.push(InstructionTiming::new(decode_instruction(&mut stream)?.op));
        }
        self.timings = Some(table);
        Ok(())
    }

    /// Arena statistics and instruction timings recorded so far.
    pub fn profile_result(&self) -> ProfileResult {
        ProfileResult {
            allocators: self.metadata().profile().cloned().into_iter().collect(),
            methods: self
                .timings
                .as_ref()
                .map(|t| MethodProfile {
                    name: self.name().to_string(),
                    executions: self.executions,
                    instructions: t.clone(),
                })
                .into_iter()
                .collect(),
        }
    }

    // ── Descriptor access ──────────────────────────────────────────

    fn value_def(&self, id: ValueId) -> Result<ValueDef, ExecError> {
        let metadata = self.metadata();
        let at = id.index() * INDEX_ENTRY_BYTES;
        let entry = metadata
            .slice(self.layout.value_index)
            .get(at..at + INDEX_ENTRY_BYTES)
            .ok_or_else(|| corrupt("value id past end of index"))?;
        let offset = u64::from_le_bytes([
            entry[0], entry[1], entry[2], entry[3], entry[4], entry[5], entry[6], entry[7],
        ]) as usize;
        let len = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]) as usize;
        let mut record = metadata
            .slice(self.layout.records)
            .get(offset..offset + len)
            .ok_or_else(|| corrupt("value record past end of records"))?;
        Ok(decode_value(&mut record)?)
    }

    fn list_value(
        &self,
        what: &'static str,
        slot: ArenaSlot,
        count: usize,
        index: usize,
    ) -> Result<ValueDef, ExecError> {
        if index >= count {
            return Err(ExecError::IndexOutOfRange { what, index, count });
        }
        let bytes = &self.metadata().slice(slot)[index * 4..index * 4 + 4];
        let id = ValueId(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
        self.value_def(id)
    }

    fn to_evalue(&self, def: ValueDef) -> Result<EValue<'_>, ExecError> {
        Ok(match def {
            ValueDef::None => EValue::None,
            ValueDef::Int(v) => EValue::Int(v),
            ValueDef::Double(v) => EValue::Double(v),
            ValueDef::Bool(v) => EValue::Bool(v),
            ValueDef::Tensor(t) => {
                let nbytes = t.nbytes().ok_or_else(|| corrupt("tensor size overflows"))?;
                let data = match t.storage {
                    Storage::Planned { mem_id, offset } => {
                        self.planned().offset_slice(mem_id, offset as usize, nbytes)?
                    }
                    Storage::Constant { index } => self
                        .program
                        .constant(index)
                        .ok_or_else(|| corrupt("constant index out of range"))?,
                };
                EValue::Tensor(TensorView::new(t.scalar_type, t.dims, data))
            }
        })
    }
}
