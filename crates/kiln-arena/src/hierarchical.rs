//! Positional view over memory-planned buffers.
//!
//! The runtime addresses planned memory as `(buffer id, byte offset)`
//! pairs computed ahead of time by the memory planner. Lookup is a plain
//! index into a vector of borrowed slices: O(1), no name resolution.

use std::ops::Range;

use kiln_core::{BufferId, PlannedMemory};

use crate::error::{ArenaError, Mismatch};

/// Non-owning, index-addressable view over planned buffers.
///
/// Built from a [`PlannedBufferSet`](crate::PlannedBufferSet) or from any
/// caller-provided slices (e.g. statically allocated pools). The view is
/// immutable in shape after construction: buffers are never added,
/// removed, or reordered.
#[derive(Debug)]
pub struct HierarchicalAllocator<'a> {
    buffers: Vec<&'a mut [u8]>,
}

impl<'a> HierarchicalAllocator<'a> {
    /// Wrap caller-owned buffers. `buffers[i]` backs `BufferId(i)`.
    pub fn new(buffers: Vec<&'a mut [u8]>) -> Self {
        Self { buffers }
    }

    /// Number of buffers in the view.
    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Size of buffer `id` in bytes.
    pub fn buffer_size(&self, id: BufferId) -> Option<usize> {
        self.buffers.get(id.index()).map(|b| b.len())
    }

    /// Check that this view matches the count and sizes `meta` declares.
    pub fn check_against<M: PlannedMemory + ?Sized>(&self, meta: &M) -> Result<(), ArenaError> {
        let declared = meta.num_memory_planned_buffers();
        if declared != self.buffers.len() {
            return Err(Mismatch::Count {
                declared,
                actual: self.buffers.len(),
            }
            .into());
        }
        let ids = BufferId::first(declared).ok_or(Mismatch::Count {
            declared,
            actual: u32::MAX as usize,
        })?;
        for (id, buf) in ids.zip(self.buffers.iter()) {
            let declared = meta
                .memory_planned_buffer_size(id)
                .ok_or(Mismatch::Undeclared {
                    id,
                    count: self.buffers.len(),
                })?;
            if declared != buf.len() {
                return Err(Mismatch::Size {
                    id,
                    declared,
                    actual: buf.len(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Shared view of `len` bytes at `offset` inside buffer `id`.
    pub fn offset_slice(&self, id: BufferId, offset: usize, len: usize) -> Result<&[u8], ArenaError> {
        let buf = self.buffer(id)?;
        let range = checked_range(id, offset, len, buf.len())?;
        Ok(&buf[range])
    }

    /// Mutable view of `len` bytes at `offset` inside buffer `id`.
    pub fn offset_slice_mut(
        &mut self,
        id: BufferId,
        offset: usize,
        len: usize,
    ) -> Result<&mut [u8], ArenaError> {
        let count = self.buffers.len();
        let buf = self
            .buffers
            .get_mut(id.index())
            .ok_or(ArenaError::UnknownBuffer { id, count })?;
        let range = checked_range(id, offset, len, buf.len())?;
        Ok(&mut buf[range])
    }

    /// Read one little-endian `f32` at a byte offset.
    pub fn load_f32(&self, id: BufferId, offset: usize) -> Result<f32, ArenaError> {
        let bytes = self.offset_slice(id, offset, 4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write one little-endian `f32` at a byte offset.
    pub fn store_f32(&mut self, id: BufferId, offset: usize, value: f32) -> Result<(), ArenaError> {
        self.offset_slice_mut(id, offset, 4)?
            .copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Read one little-endian `i32` at a byte offset.
    pub fn load_i32(&self, id: BufferId, offset: usize) -> Result<i32, ArenaError> {
        let bytes = self.offset_slice(id, offset, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write one little-endian `i32` at a byte offset.
    pub fn store_i32(&mut self, id: BufferId, offset: usize, value: i32) -> Result<(), ArenaError> {
        self.offset_slice_mut(id, offset, 4)?
            .copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Address range of each buffer, in id order.
    pub fn address_ranges(&self) -> Vec<Range<usize>> {
        self.buffers
            .iter()
            .map(|b| {
                let r = b.as_ptr_range();
                r.start as usize..r.end as usize
            })
            .collect()
    }

    fn buffer(&self, id: BufferId) -> Result<&[u8], ArenaError> {
        self.buffers
            .get(id.index())
            .map(|b| &b[..])
            .ok_or(ArenaError::UnknownBuffer {
                id,
                count: self.buffers.len(),
            })
    }
}

fn checked_range(
    id: BufferId,
    offset: usize,
    len: usize,
    size: usize,
) -> Result<Range<usize>, ArenaError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset..end),
        _ => Err(ArenaError::RangeOutOfBounds {
            id,
            offset,
            len,
            size,
        }),
    }
}
