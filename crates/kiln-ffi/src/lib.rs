//! C FFI bindings for the Kiln model runtime.
//!
//! Exposes a runner handle API: create from a program file, run a full
//! load cycle with ones-initialised inputs, read back flattened outputs,
//! destroy. The generated header lands in `include/kiln.h`.
//!
//! Every entry point returns a [`KilnStatus`] code as `i32` and catches
//! panics at the boundary.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

#[macro_use]
mod macros;

mod handle;
pub mod runner;
pub mod status;

pub use runner::{
    kiln_runner_create, kiln_runner_destroy, kiln_runner_forward, kiln_runner_num_outputs,
};
pub use status::KilnStatus;
