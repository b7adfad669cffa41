//! C-compatible status codes.
//!
//! [`KilnStatus`] is a `repr(i32)` enum covering every failure a runner
//! call can report. `Ok` is zero and every error is negative. Values are
//! ABI-stable.

use kiln_arena::ArenaError;
use kiln_program::ProgramError;
use kiln_runtime::{ConfigError, ExecError, LoadError, RuntimeError};

/// Status code returned by every FFI function.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KilnStatus {
    /// Success.
    Ok = 0,
    /// Handle is invalid or was already destroyed.
    InvalidHandle = -1,
    /// A pointer is null or a string is not UTF-8.
    InvalidArgument = -2,
    /// The program file could not be opened or read.
    Io = -3,
    /// The program bytes are malformed or fail validation.
    InvalidProgram = -4,
    /// The program has no method of the requested name, or no methods.
    MethodNotFound = -5,
    /// The metadata arena is too small for the method.
    OutOfArenaSpace = -6,
    /// The arena or a planned buffer could not be allocated.
    AllocationFailed = -7,
    /// Planned buffers disagree with the method's declared sizes.
    SizeMismatch = -8,
    /// A kernel or output read failed.
    ExecutionFailed = -9,
    /// Caller-provided output buffer is too small.
    BufferTooSmall = -10,
    /// Runtime configuration is invalid.
    ConfigError = -11,
    /// Internal error (a poisoned lock after an earlier panic).
    InternalError = -12,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&ProgramError> for KilnStatus {
    fn from(e: &ProgramError) -> Self {
        match e {
            ProgramError::Io(_) => KilnStatus::Io,
            ProgramError::MethodNotFound { .. } => KilnStatus::MethodNotFound,
            _ => KilnStatus::InvalidProgram,
        }
    }
}

impl From<&ArenaError> for KilnStatus {
    fn from(e: &ArenaError) -> Self {
        match e {
            ArenaError::OutOfArenaSpace { .. } => KilnStatus::OutOfArenaSpace,
            ArenaError::ReserveFailed { .. } | ArenaError::BufferAllocationFailure { .. } => {
                KilnStatus::AllocationFailed
            }
            ArenaError::SizeMismatch(_) => KilnStatus::SizeMismatch,
            ArenaError::UnknownBuffer { .. } | ArenaError::RangeOutOfBounds { .. } => {
                KilnStatus::ExecutionFailed
            }
        }
    }
}

impl From<&ExecError> for KilnStatus {
    fn from(e: &ExecError) -> Self {
        match e {
            ExecError::Arena(a) => KilnStatus::from(a),
            ExecError::Metadata(p) => KilnStatus::from(p),
            ExecError::OutputBufferTooSmall { .. } => KilnStatus::BufferTooSmall,
            _ => KilnStatus::ExecutionFailed,
        }
    }
}

impl From<&LoadError> for KilnStatus {
    fn from(e: &LoadError) -> Self {
        match e {
            LoadError::Program(p) => KilnStatus::from(p),
            LoadError::Arena(a) => KilnStatus::from(a),
        }
    }
}

impl From<&ConfigError> for KilnStatus {
    fn from(_e: &ConfigError) -> Self {
        KilnStatus::ConfigError
    }
}

impl From<&RuntimeError> for KilnStatus {
    fn from(e: &RuntimeError) -> Self {
        match e {
            RuntimeError::Config(c) => KilnStatus::from(c),
            RuntimeError::Program(p) => KilnStatus::from(p),
            RuntimeError::Arena(a) => KilnStatus::from(a),
            RuntimeError::Exec(x) => KilnStatus::from(x),
        }
    }
}
