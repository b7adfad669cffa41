//! Kiln: a small model runtime with bounded, pre-sized method memory.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Kiln sub-crates. For most users, adding `kiln` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use kiln::prelude::*;
//!
//! // forward(x) = relu(x * -1.0) over four floats.
//! let mut m = MethodBuilder::new("forward");
//! let buf = m.planned_buffer(32);
//! let x = m.planned_f32(buf, 0, &[4]);
//! let out = m.planned_f32(buf, 16, &[4]);
//! let s = m.double(-1.0);
//! m.input(x)
//!     .output(out)
//!     .instruction(OpKind::Scale, &[x, s, out])
//!     .instruction(OpKind::Relu, &[out, out]);
//! let mut writer = ProgramWriter::new();
//! writer.add_method(m.build());
//! let bytes = writer.finish().unwrap();
//!
//! // Parse, then size memory from the method's metadata.
//! let program = Program::load(&BufferDataLoader::new(&bytes)).unwrap();
//! let meta = program.method_meta("forward").unwrap();
//! let mut arena = MetadataArena::new(4096);
//! let mut planned = PlannedBufferSet::from_meta(&meta).unwrap();
//!
//! // Bind, fill inputs, execute.
//! let manager = MemoryManager::new(&mut arena, planned.as_view());
//! let mut method = Method::load(&program, "forward", manager).unwrap();
//! method.set_input_f32(0, &[1.0, -2.0, 3.0, -4.0]).unwrap();
//! method.execute().unwrap();
//!
//! let y = method.output(0).unwrap();
//! assert_eq!(y.as_tensor().unwrap().to_f32_vec(), vec![0.0, 2.0, 0.0, 4.0]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `kiln-core` | IDs, scalar types, the `PlannedMemory` trait |
//! | [`arena`] | `kiln-arena` | Metadata arena, planned buffers, memory manager |
//! | [`program`] | `kiln-program` | Program format, loaders, method metadata |
//! | [`runtime`] | `kiln-runtime` | Method binding, execution, profiling, runner |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core IDs, scalar types and traits (`kiln-core`).
pub use kiln_core as types;

/// Bounded method memory (`kiln-arena`).
///
/// [`arena::MetadataArena`] holds method bookkeeping,
/// [`arena::PlannedBufferSet`] owns the planned buffers, and
/// [`arena::MemoryManager`] hands each to the step that needs it.
pub use kiln_arena as arena;

/// Program format, data loaders and method metadata (`kiln-program`).
pub use kiln_program as program;

/// Method binding, execution and profiling (`kiln-runtime`).
///
/// [`runtime::run_method`] drives one complete load cycle.
pub use kiln_runtime as runtime;

/// Common imports for typical Kiln usage.
///
/// ```rust
/// use kiln::prelude::*;
/// ```
pub mod prelude {
    // Core
    pub use kiln_core::{BufferId, PlannedMemory, ScalarType, ValueId};

    // Memory
    pub use kiln_arena::{ArenaConfig, ArenaError, MemoryManager, MetadataArena, PlannedBufferSet};

    // Programs
    pub use kiln_program::{
        BufferDataLoader, DataLoader, FileDataLoader, MethodBuilder, MethodMeta, OpKind, Program,
        ProgramError, ProgramWriter,
    };

    // Runtime
    pub use kiln_runtime::{
        prepare_input_tensors, run_forward, run_method, runtime_init, EValue, ExecError,
        LoadError, Method, OwnedValue, RuntimeConfig, RuntimeError,
    };
}
