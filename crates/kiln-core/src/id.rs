//! Strongly-typed identifiers and the [`Shape`] type alias.

use smallvec::SmallVec;
use std::fmt;

/// Identifies a memory-planned buffer within a method.
///
/// Planned buffers are addressed positionally: `BufferId(n)` is the n-th
/// buffer reported by the method's metadata, in `[0, num_memory_planned_buffers)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl BufferId {
    /// The id as a positional index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Ids `0..count` in order, or `None` if `count` is too large for
    /// every index to fit in a `BufferId`.
    pub fn first(count: usize) -> Option<impl Iterator<Item = BufferId>> {
        let n = u32::try_from(count).ok()?;
        Some((0..n).map(BufferId))
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for BufferId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a value slot (tensor, scalar, or none) within a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    /// The id as a positional index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ValueId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Tensor dimensions.
///
/// `SmallVec<[u32; 4]>` keeps shapes up to rank 4 on the stack, so
/// decoding a tensor descriptor during execution never touches the heap.
pub type Shape = SmallVec<[u32; 4]>;

/// Number of elements described by a shape. A rank-0 shape is a scalar.
pub fn numel(shape: &[u32]) -> usize {
    shape.iter().map(|&d| d as usize).product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn numel_of_scalar_is_one() {
        assert_eq!(numel(&[]), 1);
    }

    #[test]
    fn numel_multiplies_dims() {
        let s: Shape = smallvec![2, 3, 4];
        assert_eq!(numel(&s), 24);
    }

    #[test]
    fn zero_dim_gives_empty_tensor() {
        assert_eq!(numel(&[3, 0, 2]), 0);
    }

    #[test]
    fn ids_display_as_bare_numbers() {
        assert_eq!(BufferId(7).to_string(), "7");
        assert_eq!(ValueId::from(3).to_string(), "3");
        assert_eq!(BufferId(2).index(), 2);
    }

    #[test]
    fn first_yields_ids_in_order() {
        let ids: Vec<_> = BufferId::first(3).unwrap().collect();
        assert_eq!(ids, vec![BufferId(0), BufferId(1), BufferId(2)]);
        assert_eq!(BufferId::first(0).unwrap().count(), 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn first_rejects_counts_beyond_u32() {
        assert!(BufferId::first(u32::MAX as usize).is_some());
        assert!(BufferId::first(u32::MAX as usize + 1).is_none());
    }
}
