//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use kiln_core::BufferId;

/// Errors that can occur while reserving or addressing method memory.
///
/// None of these are retried internally. Whether to retry with a larger
/// arena is a caller decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// A metadata allocation would exceed the arena's fixed capacity.
    OutOfArenaSpace {
        /// Number of bytes requested (including alignment padding).
        requested: usize,
        /// Bytes still available when the request was made.
        remaining: usize,
        /// Declared capacity of the arena.
        capacity: usize,
    },
    /// The arena's backing block could not be reserved.
    ReserveFailed {
        /// Requested arena capacity in bytes.
        capacity: usize,
    },
    /// A planned buffer could not be obtained at its declared size.
    BufferAllocationFailure {
        /// The buffer that failed.
        id: BufferId,
        /// Declared size in bytes.
        size: usize,
    },
    /// Declared buffer count or sizes disagree with what was provided.
    SizeMismatch(Mismatch),
    /// A planned buffer id outside `[0, count)`.
    UnknownBuffer {
        /// The unrecognised id.
        id: BufferId,
        /// Number of buffers in the view.
        count: usize,
    },
    /// A byte range that does not fit inside its planned buffer.
    RangeOutOfBounds {
        /// The buffer addressed.
        id: BufferId,
        /// Start of the range in bytes.
        offset: usize,
        /// Length of the range in bytes.
        len: usize,
        /// Size of the buffer in bytes.
        size: usize,
    },
}

/// How declared planned-memory metadata disagreed with a built buffer set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mismatch {
    /// Number of buffers differs.
    Count {
        /// Count declared by the metadata.
        declared: usize,
        /// Count actually provided.
        actual: usize,
    },
    /// One buffer's size differs.
    Size {
        /// The buffer that differs.
        id: BufferId,
        /// Size declared by the metadata.
        declared: usize,
        /// Size actually provided.
        actual: usize,
    },
    /// The metadata reports a count but no size for this id.
    Undeclared {
        /// The id with no size.
        id: BufferId,
        /// Count declared by the metadata.
        count: usize,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count { declared, actual } => {
                write!(f, "declared {declared} planned buffers, got {actual}")
            }
            Self::Size {
                id,
                declared,
                actual,
            } => {
                write!(
                    f,
                    "planned buffer {id}: declared {declared} bytes, got {actual} bytes"
                )
            }
            Self::Undeclared { id, count } => {
                write!(f, "no size declared for planned buffer {id} of {count}")
            }
        }
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfArenaSpace {
                requested,
                remaining,
                capacity,
            } => {
                write!(
                    f,
                    "out of arena space: requested {requested} bytes, \
                     {remaining} of {capacity} bytes remaining"
                )
            }
            Self::ReserveFailed { capacity } => {
                write!(f, "could not reserve a {capacity}-byte arena")
            }
            Self::BufferAllocationFailure { id, size } => {
                write!(f, "could not allocate planned buffer {id} ({size} bytes)")
            }
            Self::SizeMismatch(m) => write!(f, "size mismatch: {m}"),
            Self::UnknownBuffer { id, count } => {
                write!(f, "unknown planned buffer {id} (have {count})")
            }
            Self::RangeOutOfBounds {
                id,
                offset,
                len,
                size,
            } => {
                write!(
                    f,
                    "range {offset}..{} out of bounds for planned buffer {id} ({size} bytes)",
                    offset.saturating_add(*len)
                )
            }
        }
    }
}

impl Error for ArenaError {}

impl From<Mismatch> for ArenaError {
    fn from(m: Mismatch) -> Self {
        Self::SizeMismatch(m)
    }
}
