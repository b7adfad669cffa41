//! Error types for binding and executing methods.

use std::error::Error;
use std::fmt;

use kiln_arena::ArenaError;
use kiln_core::ScalarType;
use kiln_program::{OpKind, ProgramError};

use crate::config::ConfigError;

// ── LoadError ──────────────────────────────────────────────────────

/// Errors from [`Method::load`](crate::Method::load).
#[derive(Debug)]
pub enum LoadError {
    /// The method could not be found or queried.
    Program(ProgramError),
    /// The arena ran out of space or the planned view did not match.
    Arena(ArenaError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program(e) => write!(f, "program: {e}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Program(e) => Some(e),
            Self::Arena(e) => Some(e),
        }
    }
}

impl From<ProgramError> for LoadError {
    fn from(e: ProgramError) -> Self {
        Self::Program(e)
    }
}

impl From<ArenaError> for LoadError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

// ── ExecError ──────────────────────────────────────────────────────

/// Errors from executing a bound method or accessing its values.
#[derive(Debug)]
pub enum ExecError {
    /// Operand shapes are incompatible with the operator.
    ShapeMismatch {
        /// The operator that rejected its operands.
        op: OpKind,
        /// Which shapes disagreed.
        detail: String,
    },
    /// The operator has no kernel for this element type.
    UnsupportedScalarType {
        /// The operator.
        op: OpKind,
        /// The element type found.
        found: ScalarType,
    },
    /// A planned-memory access failed.
    Arena(ArenaError),
    /// A descriptor stored in the metadata arena could not be decoded.
    Metadata(ProgramError),
    /// An input or output index past the end of its list.
    IndexOutOfRange {
        /// `"input"` or `"output"`.
        what: &'static str,
        /// The requested index.
        index: usize,
        /// Length of the list.
        count: usize,
    },
    /// Tensor access was requested on a non-tensor value.
    NotATensor {
        /// `"input"` or `"output"`.
        what: &'static str,
        /// Position in that list.
        index: usize,
    },
    /// Caller data does not match an input tensor.
    InputMismatch {
        /// Input position.
        index: usize,
        /// What disagreed.
        detail: String,
    },
    /// The caller's output slice cannot hold every output.
    OutputBufferTooSmall {
        /// Number of outputs the method produces.
        needed: usize,
        /// Length of the slice provided.
        provided: usize,
    },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { op, detail } => write!(f, "{op}: shape mismatch: {detail}"),
            Self::UnsupportedScalarType { op, found } => {
                write!(f, "{op}: unsupported scalar type {found}")
            }
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::Metadata(e) => write!(f, "corrupt method metadata: {e}"),
            Self::IndexOutOfRange { what, index, count } => {
                write!(f, "{what} index {index} out of range (count {count})")
            }
            Self::NotATensor { what, index } => write!(f, "{what} {index} is not a tensor"),
            Self::InputMismatch { index, detail } => write!(f, "input {index}: {detail}"),
            Self::OutputBufferTooSmall { needed, provided } => {
                write!(f, "output buffer holds {provided} values, method has {needed}")
            }
        }
    }
}

impl Error for ExecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            Self::Metadata(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for ExecError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<ProgramError> for ExecError {
    fn from(e: ProgramError) -> Self {
        Self::Metadata(e)
    }
}

// ── RuntimeError ───────────────────────────────────────────────────

/// Any failure of a full load cycle run by [`run_method`](crate::run_method).
#[derive(Debug)]
pub enum RuntimeError {
    /// The runtime configuration is invalid.
    Config(ConfigError),
    /// The program or method could not be read.
    Program(ProgramError),
    /// Memory could not be reserved or did not match the method.
    Arena(ArenaError),
    /// Execution failed.
    Exec(ExecError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Program(e) => write!(f, "program: {e}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::Exec(e) => write!(f, "execution: {e}"),
        }
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Program(e) => Some(e),
            Self::Arena(e) => Some(e),
            Self::Exec(e) => Some(e),
        }
    }
}

impl From<ConfigError> for RuntimeError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ProgramError> for RuntimeError {
    fn from(e: ProgramError) -> Self {
        Self::Program(e)
    }
}

impl From<ArenaError> for RuntimeError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<ExecError> for RuntimeError {
    fn from(e: ExecError) -> Self {
        Self::Exec(e)
    }
}

impl From<LoadError> for RuntimeError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Program(e) => Self::Program(e),
            LoadError::Arena(e) => Self::Arena(e),
        }
    }
}
