//! Binary program format and loading for the Kiln model runtime.
//!
//! A program is a set of named methods plus a segment of read-only
//! constants. Each method declares its memory-planned buffers, its value
//! table, its inputs and outputs, and a flat instruction stream.
//!
//! # Architecture
//!
//! - [`DataLoader`] abstracts where program bytes come from
//!   ([`FileDataLoader`], [`BufferDataLoader`])
//! - [`Program`] parses and validates the whole file once; it is
//!   immutable and shared freely across threads
//! - [`MethodMeta`] answers memory-planning queries before a method is
//!   bound, and implements [`PlannedMemory`](kiln_core::PlannedMemory)
//! - [`ProgramWriter`] and [`MethodBuilder`] produce the same format
//! - All I/O uses a custom binary codec (no serde dependency)
//!
//! # Format
//!
//! ```text
//! [MAGIC "KILN"] [VERSION u8]
//! [method_count u32] [Method 1] ... [Method N]
//! [constant_count u32] [len u32, bytes] ...
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod loader;
pub mod meta;
pub mod program;
pub mod types;
pub mod writer;

pub use error::ProgramError;
pub use loader::{BufferDataLoader, DataLoader, FileDataLoader};
pub use meta::{MethodMeta, TensorInfo};
pub use program::Program;
pub use types::{Instruction, MethodDef, OpKind, Storage, TensorDef, ValueDef};
pub use writer::{encode_program, MethodBuilder, ProgramWriter};

/// Magic bytes at the start of every program file.
pub const MAGIC: [u8; 4] = *b"KILN";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
