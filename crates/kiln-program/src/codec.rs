//! Binary encode/decode for the program format.
//!
//! All integers are little-endian. Strings and byte arrays are length-prefixed
//! with a `u32` length. Counts read from the wire only pre-size vectors up
//! to a small bound, so a corrupt count fails on truncation instead of
//! reserving gigabytes.

use std::io::{Read, Write};

use kiln_core::{BufferId, ScalarType, Shape, ValueId};
use smallvec::SmallVec;

use crate::error::ProgramError;
use crate::types::*;
use crate::{FORMAT_VERSION, MAGIC};

/// Upper bound on capacity reserved from an untrusted count.
const MAX_PREALLOC: usize = 1024;

const STORAGE_PLANNED: u8 = 0;
const STORAGE_CONSTANT: u8 = 1;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), ProgramError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), ProgramError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), ProgramError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i64.
pub fn write_i64_le(w: &mut dyn Write, v: i64) -> Result<(), ProgramError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), ProgramError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a collection length as a u32, rejecting lengths that do not fit.
pub fn write_len(w: &mut dyn Write, len: usize) -> Result<(), ProgramError> {
    let len = u32::try_from(len).map_err(|_| ProgramError::Malformed {
        detail: format!("length {len} exceeds u32"),
    })?;
    write_u32_le(w, len)
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), ProgramError> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), ProgramError> {
    write_len(w, b.len())?;
    w.write_all(b)?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, ProgramError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, ProgramError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, ProgramError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian i64.
pub fn read_i64_le(r: &mut dyn Read) -> Result<i64, ProgramError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, ProgramError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, ProgramError> {
    let buf = read_length_prefixed_bytes(r)?;
    String::from_utf8(buf).map_err(|e| ProgramError::Malformed {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

/// Read a length-prefixed byte array.
pub fn read_length_prefixed_bytes(r: &mut dyn Read) -> Result<Vec<u8>, ProgramError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC * 64));
    r.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(ProgramError::Malformed {
            detail: format!("truncated byte array: got {} of {len} bytes", buf.len()),
        });
    }
    Ok(buf)
}

fn read_list<T>(
    r: &mut dyn Read,
    mut item: impl FnMut(&mut dyn Read) -> Result<T, ProgramError>,
) -> Result<Vec<T>, ProgramError> {
    let count = read_u32_le(r)? as usize;
    let mut out = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        out.push(item(r)?);
    }
    Ok(out)
}

// ── Header encode/decode ────────────────────────────────────────

/// Encode the program header (magic, version).
pub fn encode_header(w: &mut dyn Write) -> Result<(), ProgramError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)
}

/// Decode and validate the program header.
pub fn decode_header(r: &mut dyn Read) -> Result<(), ProgramError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(ProgramError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(ProgramError::UnsupportedVersion { found: version });
    }
    Ok(())
}

// ── Value encode/decode ─────────────────────────────────────────

/// Encode one value-table entry.
pub fn encode_value(w: &mut dyn Write, value: &ValueDef) -> Result<(), ProgramError> {
    write_u8(w, value.tag())?;
    match value {
        ValueDef::None => {}
        ValueDef::Int(v) => write_i64_le(w, *v)?,
        ValueDef::Double(v) => write_f64_le(w, *v)?,
        ValueDef::Bool(v) => write_u8(w, u8::from(*v))?,
        ValueDef::Tensor(t) => {
            write_u8(w, t.scalar_type.tag())?;
            let rank = u8::try_from(t.dims.len()).map_err(|_| ProgramError::Malformed {
                detail: format!("tensor rank {} exceeds u8", t.dims.len()),
            })?;
            write_u8(w, rank)?;
            for &d in &t.dims {
                write_u32_le(w, d)?;
            }
            match t.storage {
                Storage::Planned { mem_id, offset } => {
                    write_u8(w, STORAGE_PLANNED)?;
                    write_u32_le(w, mem_id.0)?;
                    write_u64_le(w, offset)?;
                }
                Storage::Constant { index } => {
                    write_u8(w, STORAGE_CONSTANT)?;
                    write_u32_le(w, index)?;
                }
            }
        }
    }
    Ok(())
}

/// Decode one value-table entry.
pub fn decode_value(r: &mut dyn Read) -> Result<ValueDef, ProgramError> {
    match read_u8(r)? {
        0 => Ok(ValueDef::None),
        1 => Ok(ValueDef::Int(read_i64_le(r)?)),
        2 => Ok(ValueDef::Double(read_f64_le(r)?)),
        3 => match read_u8(r)? {
            0 => Ok(ValueDef::Bool(false)),
            1 => Ok(ValueDef::Bool(true)),
            b => Err(ProgramError::Malformed {
                detail: format!("invalid bool byte {b}"),
            }),
        },
        4 => {
            let tag = read_u8(r)?;
            let scalar_type = ScalarType::from_tag(tag).ok_or_else(|| ProgramError::Malformed {
                detail: format!("unknown scalar type {tag}"),
            })?;
            let rank = read_u8(r)? as usize;
            let mut dims = Shape::with_capacity(rank);
            for _ in 0..rank {
                dims.push(read_u32_le(r)?);
            }
            let storage = match read_u8(r)? {
                STORAGE_PLANNED => Storage::Planned {
                    mem_id: BufferId(read_u32_le(r)?),
                    offset: read_u64_le(r)?,
                },
                STORAGE_CONSTANT => Storage::Constant {
                    index: read_u32_le(r)?,
                },
                s => {
                    return Err(ProgramError::Malformed {
                        detail: format!("unknown storage kind {s}"),
                    })
                }
            };
            Ok(ValueDef::Tensor(TensorDef {
                scalar_type,
                dims,
                storage,
            }))
        }
        tag => Err(ProgramError::UnknownValueTag { tag }),
    }
}

/// Exact number of bytes [`encode_value`] writes for `value`.
pub fn value_encoded_len(value: &ValueDef) -> usize {
    1 + match value {
        ValueDef::None => 0,
        ValueDef::Int(_) | ValueDef::Double(_) => 8,
        ValueDef::Bool(_) => 1,
        ValueDef::Tensor(t) => {
            let storage = match t.storage {
                Storage::Planned { .. } => 4 + 8,
                Storage::Constant { .. } => 4,
            };
            1 + 1 + 4 * t.dims.len() + 1 + storage
        }
    }
}

// ── Instruction encode/decode ───────────────────────────────────

/// Encode one instruction: opcode, argument count, argument ids.
pub fn encode_instruction(w: &mut dyn Write, ins: &Instruction) -> Result<(), ProgramError> {
    write_u8(w, ins.op.opcode())?;
    let argc = u8::try_from(ins.args.len()).map_err(|_| ProgramError::Malformed {
        detail: format!("{} arguments exceed u8", ins.args.len()),
    })?;
    write_u8(w, argc)?;
    for arg in &ins.args {
        write_u32_le(w, arg.0)?;
    }
    Ok(())
}

/// Decode one instruction.
pub fn decode_instruction(r: &mut dyn Read) -> Result<Instruction, ProgramError> {
    let opcode = read_u8(r)?;
    let op = OpKind::from_opcode(opcode).ok_or(ProgramError::UnknownOpcode { opcode })?;
    let argc = read_u8(r)? as usize;
    let mut args = SmallVec::with_capacity(argc);
    for _ in 0..argc {
        args.push(ValueId(read_u32_le(r)?));
    }
    Ok(Instruction { op, args })
}

/// Exact number of bytes [`encode_instruction`] writes for `ins`.
pub fn instruction_encoded_len(ins: &Instruction) -> usize {
    2 + 4 * ins.args.len()
}

// ── Method encode/decode ────────────────────────────────────────

/// Encode a full method.
pub fn encode_method(w: &mut dyn Write, method: &MethodDef) -> Result<(), ProgramError> {
    write_length_prefixed_str(w, &method.name)?;

    write_len(w, method.planned_sizes.len())?;
    for &size in &method.planned_sizes {
        write_u64_le(w, size)?;
    }

    write_len(w, method.values.len())?;
    for value in &method.values {
        encode_value(w, value)?;
    }

    for list in [&method.inputs, &method.outputs] {
        write_len(w, list.len())?;
        for id in list {
            write_u32_le(w, id.0)?;
        }
    }

    write_len(w, method.instructions.len())?;
    for ins in &method.instructions {
        encode_instruction(w, ins)?;
    }
    Ok(())
}

/// Decode a full method. Structural validation happens in
/// [`Program::load`](crate::Program::load), not here.
pub fn decode_method(r: &mut dyn Read) -> Result<MethodDef, ProgramError> {
    let name = read_length_prefixed_str(r)?;
    let planned_sizes = read_list(r, read_u64_le)?;
    let values = read_list(r, decode_value)?;
    let inputs = read_list(r, |r| read_u32_le(r).map(ValueId))?;
    let outputs = read_list(r, |r| read_u32_le(r).map(ValueId))?;
    let instructions = read_list(r, decode_instruction)?;

    Ok(MethodDef {
        name,
        planned_sizes,
        values,
        inputs,
        outputs,
        instructions,
    })
}

// ── Program body ────────────────────────────────────────────────

/// Encode the method list and constant segment that follow the header.
pub fn encode_body(
    w: &mut dyn Write,
    methods: &[MethodDef],
    constants: &[Vec<u8>],
) -> Result<(), ProgramError> {
    write_len(w, methods.len())?;
    for m in methods {
        encode_method(w, m)?;
    }
    write_len(w, constants.len())?;
    for c in constants {
        write_length_prefixed_bytes(w, c)?;
    }
    Ok(())
}

/// Decode the method list and constant segment that follow the header.
pub fn decode_body(r: &mut dyn Read) -> Result<(Vec<MethodDef>, Vec<Vec<u8>>), ProgramError> {
    let methods = read_list(r, decode_method)?;
    let constants = read_list(r, read_length_prefixed_bytes)?;
    Ok((methods, constants))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn sample_method() -> MethodDef {
        MethodDef {
            name: "forward".into(),
            planned_sizes: vec![16, 8],
            values: vec![
                ValueDef::Tensor(TensorDef {
                    scalar_type: ScalarType::Float32,
                    dims: smallvec![2, 2],
                    storage: Storage::Planned {
                        mem_id: BufferId(0),
                        offset: 0,
                    },
                }),
                ValueDef::Double(0.5),
                ValueDef::Tensor(TensorDef {
                    scalar_type: ScalarType::Int32,
                    dims: smallvec![2],
                    storage: Storage::Constant { index: 0 },
                }),
                ValueDef::Int(-3),
                ValueDef::Bool(true),
                ValueDef::None,
            ],
            inputs: vec![ValueId(0)],
            outputs: vec![ValueId(0)],
            instructions: vec![Instruction {
                op: OpKind::Scale,
                args: smallvec![ValueId(0), ValueId(1), ValueId(0)],
            }],
        }
    }

    #[test]
    fn method_survives_encode_decode() {
        let method = sample_method();
        let mut buf = Vec::new();
        encode_method(&mut buf, &method).unwrap();
        let decoded = decode_method(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, method);
    }

    #[test]
    fn encoded_lengths_match_the_encoder() {
        let method = sample_method();
        for value in &method.values {
            let mut buf = Vec::new();
            encode_value(&mut buf, value).unwrap();
            assert_eq!(buf.len(), value_encoded_len(value), "{value:?}");
        }
        for ins in &method.instructions {
            let mut buf = Vec::new();
            encode_instruction(&mut buf, ins).unwrap();
            assert_eq!(buf.len(), instruction_encoded_len(ins));
        }
    }

    #[test]
    fn header_rejects_bad_magic() {
        let bytes = b"MURK\x01";
        assert!(matches!(
            decode_header(&mut &bytes[..]),
            Err(ProgramError::InvalidMagic)
        ));
    }

    #[test]
    fn header_rejects_future_version() {
        let mut bytes = MAGIC.to_vec();
        bytes.push(FORMAT_VERSION + 1);
        assert!(matches!(
            decode_header(&mut bytes.as_slice()),
            Err(ProgramError::UnsupportedVersion { found }) if found == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn unknown_value_tag_is_reported() {
        let bytes = [9u8];
        assert!(matches!(
            decode_value(&mut &bytes[..]),
            Err(ProgramError::UnknownValueTag { tag: 9 })
        ));
    }

    #[test]
    fn invalid_bool_byte_is_malformed() {
        let bytes = [3u8, 2];
        assert!(matches!(
            decode_value(&mut &bytes[..]),
            Err(ProgramError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let mut method = sample_method();
        method.instructions.clear();
        let mut buf = Vec::new();
        encode_method(&mut buf, &method).unwrap();
        // Patch the instruction count (last 4 bytes) and append a bogus one.
        let n = buf.len();
        buf[n - 4..].copy_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&[42, 0]);
        assert!(matches!(
            decode_method(&mut buf.as_slice()),
            Err(ProgramError::UnknownOpcode { opcode: 42 })
        ));
    }

    #[test]
    fn truncated_byte_array_is_malformed() {
        let mut bytes = 10u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            read_length_prefixed_bytes(&mut bytes.as_slice()),
            Err(ProgramError::Malformed { .. })
        ));
    }

    #[test]
    fn huge_count_fails_on_truncation_not_allocation() {
        let bytes = u32::MAX.to_le_bytes();
        assert!(matches!(
            read_list(&mut &bytes[..], read_u64_le),
            Err(ProgramError::Io(_))
        ));
    }

    #[test]
    fn body_round_trips_constants() {
        let mut buf = Vec::new();
        let constants = vec![vec![1, 2, 3, 4], vec![]];
        encode_body(&mut buf, &[sample_method()], &constants).unwrap();
        let (methods, decoded) = decode_body(&mut buf.as_slice()).unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(decoded, constants);
    }
}
