//! Core types and traits for the Kiln model runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the identifiers, scalar types, and the planned-memory trait shared by
//! the arena, the program parser, and the runtime.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod id;
pub mod scalar;
pub mod traits;

pub use id::{numel, BufferId, Shape, ValueId};
pub use scalar::ScalarType;
pub use traits::PlannedMemory;
