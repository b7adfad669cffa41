//! Method binding, execution and profiling for the Kiln model runtime.
//!
//! Binds a method from a [`Program`](kiln_program::Program) to bounded,
//! pre-sized memory and executes it without further allocation from the
//! metadata arena.
//!
//! # Load cycle
//!
//! ```text
//! Unbuilt → ArenaReserved → BuffersAllocated → ManagerAssembled
//!         → MethodBound → [Executing ⇄ Idle] → Discarded
//! ```
//!
//! [`run_method`] drives one full cycle and hands the bound [`Method`]
//! to a closure. Callers that manage memory themselves build a
//! [`MemoryManager`](kiln_arena::MemoryManager) and call
//! [`Method::load`] directly.
//!
//! # Concurrency
//!
//! A [`Method`] is used from one thread at a time (`execute` takes
//! `&mut self`). Concurrent inference binds one method per thread, each
//! with its own arena and planned buffers, over a shared program.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod inputs;
mod kernels;
pub mod method;
pub mod profile;
pub mod runner;
pub mod value;

pub use config::{ConfigError, InputPolicy, RuntimeConfig};
pub use error::{ExecError, LoadError, RuntimeError};
pub use inputs::prepare_input_tensors;
pub use method::Method;
pub use profile::{InstructionTiming, MethodProfile, ProfileResult};
pub use runner::{is_initialized, run_forward, run_method, runtime_init, ForwardResult};
pub use value::{EValue, EValueDisplay, OwnedTensor, OwnedValue, TensorView};
