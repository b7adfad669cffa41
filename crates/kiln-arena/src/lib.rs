//! Bounded, pre-sized memory for loading and executing Kiln methods.
//!
//! Nothing in this crate allocates once a method is bound. All memory is
//! carved out up front by the caller and handed to the runtime through a
//! [`MemoryManager`].
//!
//! # Architecture
//!
//! ```text
//! MemoryManager (non-owning composite)
//! ├── &mut MetadataArena      load-time bookkeeping, fixed capacity, bump-allocated
//! └── HierarchicalAllocator   positional view over planned buffers
//!     └── &mut [u8] × k       borrowed from a PlannedBufferSet (owns Box<[u8]> × k)
//! ```
//!
//! # Capability split
//!
//! The manager hands out two grants that never overlap:
//!
//! - **Load:** [`LoadGrant`] exposes the arena mutably and the planned view
//!   read-only, so descriptors can be laid out without touching tensor memory.
//! - **Execute:** [`ExecGrant`] exposes the planned view mutably and the arena
//!   read-only, so execution can never grow the bounded arena.
//!
//! # Safety
//!
//! All storage is `Box<[u8]>` with safe initialisation. No `unsafe`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod hierarchical;
pub mod manager;
pub mod metadata;
pub mod planned;
pub mod profile;
pub mod slot;

// Public re-exports for the primary API surface.
pub use config::ArenaConfig;
pub use error::{ArenaError, Mismatch};
pub use hierarchical::HierarchicalAllocator;
pub use manager::{ExecGrant, LoadGrant, MemoryManager};
pub use metadata::MetadataArena;
pub use planned::PlannedBufferSet;
pub use profile::AllocatorProfile;
pub use slot::ArenaSlot;
