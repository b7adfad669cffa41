//! Method metadata available before binding.
//!
//! [`MethodMeta`] is what a caller inspects to size memory: how many
//! planned buffers a method needs and how large each one is. It is the
//! source the planned-buffer builder consumes, through the
//! [`PlannedMemory`] trait.

use kiln_core::{BufferId, PlannedMemory, ScalarType, Shape, ValueId};

use crate::error::ProgramError;
use crate::types::{MethodDef, ValueDef};

/// Element type, shape and byte size of an input or output tensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorInfo {
    scalar_type: ScalarType,
    sizes: Shape,
    nbytes: usize,
}

impl TensorInfo {
    /// Element type.
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Dimensions, outermost first.
    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Size of the tensor data in bytes.
    pub fn nbytes(&self) -> usize {
        self.nbytes
    }
}

/// Read-only view of one method's declared requirements.
#[derive(Clone, Copy, Debug)]
pub struct MethodMeta<'p> {
    def: &'p MethodDef,
}

impl<'p> MethodMeta<'p> {
    pub(crate) fn new(def: &'p MethodDef) -> Self {
        Self { def }
    }

    /// Method name.
    pub fn name(&self) -> &'p str {
        &self.def.name
    }

    /// Number of inputs.
    pub fn num_inputs(&self) -> usize {
        self.def.inputs.len()
    }

    /// Number of outputs.
    pub fn num_outputs(&self) -> usize {
        self.def.outputs.len()
    }

    /// Number of instructions.
    pub fn num_instructions(&self) -> usize {
        self.def.instructions.len()
    }

    /// Number of entries in the value table.
    pub fn num_values(&self) -> usize {
        self.def.values.len()
    }

    /// Tensor metadata of input `index`.
    pub fn input_tensor_meta(&self, index: usize) -> Result<TensorInfo, ProgramError> {
        self.tensor_meta("input", &self.def.inputs, index)
    }

    /// Tensor metadata of output `index`.
    pub fn output_tensor_meta(&self, index: usize) -> Result<TensorInfo, ProgramError> {
        self.tensor_meta("output", &self.def.outputs, index)
    }

    /// Number of memory-planned buffers the method needs.
    pub fn num_memory_planned_buffers(&self) -> usize {
        self.def.planned_sizes.len()
    }

    /// Size in bytes of planned buffer `id`.
    pub fn memory_planned_buffer_size(&self, id: BufferId) -> Result<usize, ProgramError> {
        self.def
            .planned_sizes
            .get(id.index())
            .map(|&s| s as usize)
            .ok_or(ProgramError::IndexOutOfRange {
                what: "planned buffer",
                index: id.index(),
                count: self.def.planned_sizes.len(),
            })
    }

    /// The full method definition.
    pub fn def(&self) -> &'p MethodDef {
        self.def
    }

    fn tensor_meta(
        &self,
        what: &'static str,
        list: &[ValueId],
        index: usize,
    ) -> Result<TensorInfo, ProgramError> {
        let id = list.get(index).ok_or(ProgramError::IndexOutOfRange {
            what,
            index,
            count: list.len(),
        })?;
        match self.def.value(*id) {
            Some(ValueDef::Tensor(t)) => Ok(TensorInfo {
                scalar_type: t.scalar_type,
                sizes: t.dims.clone(),
                nbytes: t.nbytes().unwrap_or(0),
            }),
            _ => Err(ProgramError::NotATensor { what, index }),
        }
    }
}

impl PlannedMemory for MethodMeta<'_> {
    fn num_memory_planned_buffers(&self) -> usize {
        self.def.planned_sizes.len()
    }

    fn memory_planned_buffer_size(&self, id: BufferId) -> Option<usize> {
        MethodMeta::memory_planned_buffer_size(self, id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Storage, TensorDef};
    use smallvec::smallvec;

    fn def() -> MethodDef {
        MethodDef {
            name: "forward".into(),
            planned_sizes: vec![1024, 2048],
            values: vec![
                ValueDef::Tensor(TensorDef {
                    scalar_type: ScalarType::Float32,
                    dims: smallvec![2, 8],
                    storage: Storage::Planned {
                        mem_id: BufferId(0),
                        offset: 0,
                    },
                }),
                ValueDef::Int(3),
            ],
            inputs: vec![ValueId(0), ValueId(1)],
            outputs: vec![ValueId(0)],
            instructions: vec![],
        }
    }

    #[test]
    fn reports_counts_and_sizes() {
        let def = def();
        let meta = MethodMeta::new(&def);
        assert_eq!(meta.name(), "forward");
        assert_eq!(meta.num_inputs(), 2);
        assert_eq!(meta.num_outputs(), 1);
        assert_eq!(meta.num_memory_planned_buffers(), 2);
        assert_eq!(meta.memory_planned_buffer_size(BufferId(1)).unwrap(), 2048);
        assert!(matches!(
            meta.memory_planned_buffer_size(BufferId(2)),
            Err(ProgramError::IndexOutOfRange { index: 2, count: 2, .. })
        ));
    }

    #[test]
    fn tensor_meta_describes_shape() {
        let def = def();
        let meta = MethodMeta::new(&def);
        let info = meta.input_tensor_meta(0).unwrap();
        assert_eq!(info.scalar_type(), ScalarType::Float32);
        assert_eq!(info.sizes(), &[2, 8]);
        assert_eq!(info.nbytes(), 64);
        assert_eq!(meta.output_tensor_meta(0).unwrap(), info);
    }

    #[test]
    fn non_tensor_input_has_no_tensor_meta() {
        let def = def();
        let meta = MethodMeta::new(&def);
        assert!(matches!(
            meta.input_tensor_meta(1),
            Err(ProgramError::NotATensor { what: "input", index: 1 })
        ));
        assert!(matches!(
            meta.output_tensor_meta(4),
            Err(ProgramError::IndexOutOfRange { what: "output", .. })
        ));
    }

    #[test]
    fn planned_memory_trait_matches_inherent_queries() {
        let def = def();
        let meta = MethodMeta::new(&def);
        let planned: &dyn PlannedMemory = &meta;
        assert_eq!(planned.num_memory_planned_buffers(), 2);
        assert_eq!(planned.memory_planned_buffer_size(BufferId(0)), Some(1024));
        assert_eq!(planned.memory_planned_buffer_size(BufferId(5)), None);
        assert_eq!(planned.total_planned_bytes(), Some(3072));
    }
}
