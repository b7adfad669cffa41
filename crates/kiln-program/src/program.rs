//! Parsed, validated, immutable program.

use std::ops::Range;

use indexmap::IndexMap;
use kiln_core::{BufferId, ValueId};
use tracing::{debug, info};

use crate::codec::{decode_body, decode_header};
use crate::error::ProgramError;
use crate::loader::DataLoader;
use crate::meta::MethodMeta;
use crate::types::{MethodDef, Storage, TensorDef, ValueDef};

/// A loaded program: named methods plus a read-only constant segment.
///
/// Every method is validated at load time, so binding and executing a
/// method never has to re-check indices, offsets or arities. A `Program`
/// is `Send + Sync` and is meant to be shared (e.g. in an `Arc`) by
/// threads that each bind their own method.
#[derive(Debug)]
pub struct Program {
    methods: IndexMap<String, MethodDef>,
    constants: Vec<Vec<u8>>,
}

impl Program {
    /// Read and validate a whole program from `loader`.
    pub fn load(loader: &dyn DataLoader) -> Result<Self, ProgramError> {
        let size = loader.size()?;
        let bytes = loader.load(0, size)?;
        Self::from_bytes(&bytes)
    }

    /// Parse and validate a program held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProgramError> {
        let mut r = bytes;
        decode_header(&mut r)?;
        let (defs, constants) = decode_body(&mut r)?;
        if !r.is_empty() {
            return Err(ProgramError::Malformed {
                detail: format!("{} trailing bytes after constant segment", r.len()),
            });
        }

        let mut methods = IndexMap::with_capacity(defs.len());
        for def in defs {
            validate_method(&def, &constants)?;
            debug!(
                method = %def.name,
                values = def.values.len(),
                instructions = def.instructions.len(),
                planned_buffers = def.planned_sizes.len(),
                "method validated"
            );
            let name = def.name.clone();
            if methods.insert(name.clone(), def).is_some() {
                return Err(ProgramError::InvalidMethod {
                    method: name,
                    detail: "duplicate method name".into(),
                });
            }
        }

        info!(
            bytes = bytes.len(),
            methods = methods.len(),
            constants = constants.len(),
            "program loaded"
        );
        Ok(Self { methods, constants })
    }

    /// Number of methods.
    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    /// Name of the method at `index`, in file order.
    pub fn get_method_name(&self, index: usize) -> Result<&str, ProgramError> {
        self.methods
            .get_index(index)
            .map(|(name, _)| name.as_str())
            .ok_or(ProgramError::IndexOutOfRange {
                what: "method",
                index,
                count: self.methods.len(),
            })
    }

    /// Metadata of method `name`, available before binding it.
    pub fn method_meta(&self, name: &str) -> Result<MethodMeta<'_>, ProgramError> {
        self.method(name).map(MethodMeta::new)
    }

    /// Full definition of method `name`.
    pub fn method(&self, name: &str) -> Result<&MethodDef, ProgramError> {
        self.methods
            .get(name)
            .ok_or_else(|| ProgramError::MethodNotFound { name: name.into() })
    }

    /// Number of entries in the constant segment.
    pub fn num_constants(&self) -> usize {
        self.constants.len()
    }

    /// Bytes of constant `index`.
    pub fn constant(&self, index: u32) -> Option<&[u8]> {
        self.constants.get(index as usize).map(Vec::as_slice)
    }
}

// ── Validation ──────────────────────────────────────────────────

fn invalid(def: &MethodDef, detail: String) -> ProgramError {
    ProgramError::InvalidMethod {
        method: def.name.clone(),
        detail,
    }
}

fn lookup<'d>(def: &'d MethodDef, what: &str, id: ValueId) -> Result<&'d ValueDef, ProgramError> {
    def.value(id).ok_or_else(|| {
        invalid(
            def,
            format!(
                "{what} refers to value {id}, out of range (count {})",
                def.values.len()
            ),
        )
    })
}

fn validate_method(def: &MethodDef, constants: &[Vec<u8>]) -> Result<(), ProgramError> {
    let fail = |detail: String| invalid(def, detail);

    let mut sizes = Vec::with_capacity(def.planned_sizes.len());
    for (i, &size) in def.planned_sizes.iter().enumerate() {
        let size = usize::try_from(size)
            .map_err(|_| fail(format!("planned buffer {i} size {size} does not fit in memory")))?;
        sizes.push(size);
    }

    for (i, value) in def.values.iter().enumerate() {
        let ValueDef::Tensor(t) = value else {
            continue;
        };
        let nbytes = t
            .nbytes()
            .ok_or_else(|| fail(format!("value {i}: tensor size overflows")))?;
        match t.storage {
            Storage::Planned { mem_id, offset } => {
                let size = *sizes.get(mem_id.index()).ok_or_else(|| {
                    fail(format!(
                        "value {i}: planned buffer {mem_id} out of range (count {})",
                        sizes.len()
                    ))
                })?;
                let fits = usize::try_from(offset)
                    .ok()
                    .and_then(|o| o.checked_add(nbytes))
                    .is_some_and(|end| end <= size);
                if !fits {
                    return Err(fail(format!(
                        "value {i}: {nbytes} bytes at offset {offset} overrun planned buffer {mem_id} ({size} bytes)"
                    )));
                }
            }
            Storage::Constant { index } => {
                let data = constants.get(index as usize).ok_or_else(|| {
                    fail(format!(
                        "value {i}: constant {index} out of range (count {})",
                        constants.len()
                    ))
                })?;
                if data.len() != nbytes {
                    return Err(fail(format!(
                        "value {i}: constant {index} holds {} bytes, tensor needs {nbytes}",
                        data.len()
                    )));
                }
            }
        }
    }

    for &id in &def.inputs {
        if let ValueDef::Tensor(t) = lookup(def, "input", id)? {
            if !matches!(t.storage, Storage::Planned { .. }) {
                return Err(fail(format!("input value {id} is a constant tensor")));
            }
        }
    }
    for &id in &def.outputs {
        lookup(def, "output", id)?;
    }

    for (n, ins) in def.instructions.iter().enumerate() {
        if ins.args.len() != ins.op.arity() {
            return Err(fail(format!(
                "instruction {n} ({}): expected {} arguments, got {}",
                ins.op,
                ins.op.arity(),
                ins.args.len()
            )));
        }
        for (pos, &arg) in ins.args.iter().enumerate() {
            let ok = match lookup(def, "instruction", arg)? {
                ValueDef::Tensor(_) => ins.op.expects_tensor(pos),
                ValueDef::Double(_) => !ins.op.expects_tensor(pos),
                _ => false,
            };
            if !ok {
                return Err(fail(format!(
                    "instruction {n} ({}): argument {pos} (value {arg}) has the wrong kind",
                    ins.op
                )));
            }
        }
        if let Some(ValueDef::Tensor(t)) = ins.output().and_then(|id| def.value(id)) {
            if !matches!(t.storage, Storage::Planned { .. }) {
                return Err(fail(format!(
                    "instruction {n} ({}): output is a constant tensor",
                    ins.op
                )));
            }
            let Some((out_mem, out_bytes)) = planned_bytes(t) else {
                continue;
            };
            for (pos, &arg) in ins.args[..ins.args.len() - 1].iter().enumerate() {
                let Some(ValueDef::Tensor(input)) = def.value(arg) else {
                    continue;
                };
                let Some((mem, bytes)) = planned_bytes(input) else {
                    continue;
                };
                let overlaps = mem == out_mem
                    && bytes.start < out_bytes.end
                    && out_bytes.start < bytes.end;
                let exact_alias = ins.op.is_elementwise() && bytes == out_bytes;
                if overlaps && !exact_alias {
                    return Err(fail(format!(
                        "instruction {n} ({}): output overlaps argument {pos} (value {arg}) in planned buffer {mem}",
                        ins.op
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Planned buffer and byte range of a tensor. `None` for constants and
/// empty tensors, which cannot alias anything.
fn planned_bytes(t: &TensorDef) -> Option<(BufferId, Range<u64>)> {
    let Storage::Planned { mem_id, offset } = t.storage else {
        return None;
    };
    let len = u64::try_from(t.nbytes()?).ok()?;
    (len > 0).then(|| (mem_id, offset..offset + len))
}
