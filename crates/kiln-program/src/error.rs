//! Error types for program loading and metadata queries.

use std::fmt;
use std::io;

/// Errors that can occur while reading, validating, or querying a program.
#[derive(Debug)]
pub enum ProgramError {
    /// An I/O error occurred while reading program bytes.
    Io(io::Error),
    /// The data does not start with the expected `b"KILN"` magic bytes.
    InvalidMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the file.
        found: u8,
    },
    /// The program could not be decoded (truncated or corrupt data).
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// An instruction opcode is not recognised.
    UnknownOpcode {
        /// The unrecognised opcode.
        opcode: u8,
    },
    /// A value type tag is not recognised.
    UnknownValueTag {
        /// The unrecognised tag.
        tag: u8,
    },
    /// A method decoded cleanly but is internally inconsistent.
    InvalidMethod {
        /// Name of the offending method.
        method: String,
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// No method with this name exists in the program.
    MethodNotFound {
        /// The requested name.
        name: String,
    },
    /// An index query past the end of a list.
    IndexOutOfRange {
        /// Which list was indexed (e.g. `"method"`, `"input"`).
        what: &'static str,
        /// The requested index.
        index: usize,
        /// Length of the list.
        count: usize,
    },
    /// Tensor metadata was requested for a non-tensor value.
    NotATensor {
        /// Which list was indexed (`"input"` or `"output"`).
        what: &'static str,
        /// Position in that list.
        index: usize,
    },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"KILN\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {found}")
            }
            Self::Malformed { detail } => write!(f, "malformed program: {detail}"),
            Self::UnknownOpcode { opcode } => write!(f, "unknown opcode {opcode}"),
            Self::UnknownValueTag { tag } => write!(f, "unknown value tag {tag}"),
            Self::InvalidMethod { method, detail } => {
                write!(f, "invalid method '{method}': {detail}")
            }
            Self::MethodNotFound { name } => write!(f, "method '{name}' not found"),
            Self::IndexOutOfRange { what, index, count } => {
                write!(f, "{what} index {index} out of range (count {count})")
            }
            Self::NotATensor { what, index } => write!(f, "{what} {index} is not a tensor"),
        }
    }
}

impl std::error::Error for ProgramError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ProgramError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn io_error_is_exposed_as_source() {
        let err = ProgramError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn display_names_the_method() {
        let err = ProgramError::InvalidMethod {
            method: "forward".into(),
            detail: "value 9 out of range".into(),
        };
        assert_eq!(err.to_string(), "invalid method 'forward': value 9 out of range");
    }
}
