//! Tensor element types.

use std::fmt;

/// Element type of a tensor.
///
/// The discriminant is the on-disk tag used by the program format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScalarType {
    /// 32-bit IEEE float.
    Float32 = 0,
    /// 32-bit signed integer.
    Int32 = 1,
}

impl ScalarType {
    /// Size of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            Self::Float32 | Self::Int32 => 4,
        }
    }

    /// The on-disk tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Decode an on-disk tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Float32),
            1 => Some(Self::Int32),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float32 => write!(f, "float32"),
            Self::Int32 => write!(f, "int32"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for st in [ScalarType::Float32, ScalarType::Int32] {
            assert_eq!(ScalarType::from_tag(st.tag()), Some(st));
        }
    }

    #[test]
    fn unknown_tag_is_none() {
        assert_eq!(ScalarType::from_tag(9), None);
    }

    #[test]
    fn element_sizes() {
        assert_eq!(ScalarType::Float32.element_size(), 4);
        assert_eq!(ScalarType::Int32.element_size(), 4);
    }
}
