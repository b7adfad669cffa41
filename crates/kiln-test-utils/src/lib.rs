//! Test utilities and program fixtures for Kiln development.
//!
//! Provides a mock [`PlannedMemory`] source and ready-made programs (see
//! [`fixtures`]) for tests and benchmarks across the workspace.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::path::PathBuf;

use kiln_core::{BufferId, PlannedMemory};

pub use fixtures::{
    add_relu_program, mixed_outputs_program, mlp_program, mlp_reference, wide_relu_program,
};

/// Mock implementation of [`PlannedMemory`].
///
/// Holds one optional size per buffer id. A `None` entry models metadata
/// that reports a buffer but cannot size it.
#[derive(Clone, Debug, Default)]
pub struct MockPlannedMemory {
    sizes: Vec<Option<usize>>,
}

impl MockPlannedMemory {
    /// Every buffer declared with a known size.
    pub fn new(sizes: &[usize]) -> Self {
        Self {
            sizes: sizes.iter().map(|&s| Some(s)).collect(),
        }
    }

    /// Buffers with possibly unknown sizes.
    pub fn with_gaps(sizes: &[Option<usize>]) -> Self {
        Self {
            sizes: sizes.to_vec(),
        }
    }
}

impl PlannedMemory for MockPlannedMemory {
    fn num_memory_planned_buffers(&self) -> usize {
        self.sizes.len()
    }

    fn memory_planned_buffer_size(&self, id: BufferId) -> Option<usize> {
        self.sizes.get(id.index()).copied().flatten()
    }
}

/// Write `bytes` to a per-process temporary file and return its path.
pub fn write_temp_program(tag: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("kiln-{tag}-{}.kiln", std::process::id()));
    std::fs::write(&path, bytes).expect("failed to write temporary program");
    path
}
