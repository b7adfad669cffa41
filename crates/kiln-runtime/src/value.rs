//! Runtime values and their printed form.
//!
//! [`EValue`] borrows tensor data straight out of planned memory or the
//! program's constant segment; nothing is copied to read an output.
//! [`OwnedValue`] is the detached copy used when a value has to outlive
//! the method, e.g. across a C ABI.

use std::fmt;

use kiln_core::{numel, ScalarType, Shape};

/// Edge items printed by the plain `Display` impl.
pub const DEFAULT_EDGE_ITEMS: usize = 6;

// ── TensorView ─────────────────────────────────────────────────────

/// Borrowed tensor: element type, shape and raw little-endian bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorView<'m> {
    scalar_type: ScalarType,
    sizes: Shape,
    data: &'m [u8],
}

impl<'m> TensorView<'m> {
    pub(crate) fn new(scalar_type: ScalarType, sizes: Shape, data: &'m [u8]) -> Self {
        debug_assert_eq!(data.len(), numel(&sizes) * scalar_type.element_size());
        Self {
            scalar_type,
            sizes,
            data,
        }
    }

    /// Element type.
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Dimensions, outermost first.
    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        numel(&self.sizes)
    }

    /// Size of the data in bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// Raw little-endian element bytes.
    pub fn data(&self) -> &'m [u8] {
        self.data
    }

    /// Element `i` as `f32`, if this is a `Float32` tensor and `i` is in range.
    pub fn f32_at(&self, i: usize) -> Option<f32> {
        (self.scalar_type == ScalarType::Float32)
            .then(|| self.word(i).map(f32::from_le_bytes))
            .flatten()
    }

    /// Element `i` as `i32`, if this is an `Int32` tensor and `i` is in range.
    pub fn i32_at(&self, i: usize) -> Option<i32> {
        (self.scalar_type == ScalarType::Int32)
            .then(|| self.word(i).map(i32::from_le_bytes))
            .flatten()
    }

    /// Every element widened to `f32`.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        (0..self.numel())
            .filter_map(|i| match self.scalar_type {
                ScalarType::Float32 => self.f32_at(i),
                ScalarType::Int32 => self.i32_at(i).map(|v| v as f32),
            })
            .collect()
    }

    fn word(&self, i: usize) -> Option<[u8; 4]> {
        let start = i.checked_mul(4)?;
        let bytes = self.data.get(start..start.checked_add(4)?)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, edge_items: usize) -> fmt::Result {
        write!(f, "tensor(sizes=[")?;
        for (i, d) in self.sizes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "], [")?;
        let n = self.numel();
        let item = |f: &mut fmt::Formatter<'_>, i: usize| match self.scalar_type {
            ScalarType::Float32 => write!(f, "{:?}", self.f32_at(i).unwrap_or(f32::NAN)),
            ScalarType::Int32 => write!(f, "{}", self.i32_at(i).unwrap_or_default()),
        };
        if n > edge_items.saturating_mul(2) {
            for i in 0..edge_items {
                item(f, i)?;
                write!(f, ", ")?;
            }
            write!(f, "...")?;
            for i in n - edge_items..n {
                write!(f, ", ")?;
                item(f, i)?;
            }
        } else {
            for i in 0..n {
                if i > 0 {
                    write!(f, ", ")?;
                }
                item(f, i)?;
            }
        }
        write!(f, "])")
    }
}

// ── EValue ─────────────────────────────────────────────────────────

/// A value read from a bound method.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EValue<'m> {
    /// No value.
    #[default]
    None,
    /// A 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Double(f64),
    /// A boolean.
    Bool(bool),
    /// A tensor borrowed from method memory.
    Tensor(TensorView<'m>),
}

impl<'m> EValue<'m> {
    /// The tensor, if this value is one.
    pub fn as_tensor(&self) -> Option<&TensorView<'m>> {
        match self {
            Self::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Printable form that shows at most `edge_items` leading and trailing
    /// elements of long tensors.
    pub fn display(&self, edge_items: usize) -> EValueDisplay<'_, 'm> {
        EValueDisplay {
            value: self,
            edge_items,
        }
    }

    /// Detached copy of this value.
    pub fn to_owned_value(&self) -> OwnedValue {
        match self {
            Self::None => OwnedValue::None,
            Self::Int(v) => OwnedValue::Int(*v),
            Self::Double(v) => OwnedValue::Double(*v),
            Self::Bool(v) => OwnedValue::Bool(*v),
            Self::Tensor(t) => OwnedValue::Tensor(OwnedTensor {
                scalar_type: t.scalar_type,
                sizes: t.sizes.to_vec(),
                data: t.data.to_vec(),
            }),
        }
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, edge_items: usize) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v:?}"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Tensor(t) => t.fmt_with(f, edge_items),
        }
    }
}

impl fmt::Display for EValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with(f, DEFAULT_EDGE_ITEMS)
    }
}

/// [`EValue`] paired with an edge-item limit. See [`EValue::display`].
pub struct EValueDisplay<'v, 'm> {
    value: &'v EValue<'m>,
    edge_items: usize,
}

impl fmt::Display for EValueDisplay<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt_with(f, self.edge_items)
    }
}

// ── OwnedValue ─────────────────────────────────────────────────────

/// Tensor data copied out of method memory.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedTensor {
    /// Element type.
    pub scalar_type: ScalarType,
    /// Dimensions, outermost first.
    pub sizes: Vec<u32>,
    /// Raw little-endian element bytes.
    pub data: Vec<u8>,
}

impl OwnedTensor {
    /// Borrow as a [`TensorView`].
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            scalar_type: self.scalar_type,
            sizes: self.sizes.iter().copied().collect(),
            data: &self.data,
        }
    }
}

/// A value that owns its data.
#[derive(Clone, Debug, PartialEq)]
pub enum OwnedValue {
    /// No value.
    None,
    /// A 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Double(f64),
    /// A boolean.
    Bool(bool),
    /// A tensor.
    Tensor(OwnedTensor),
}

impl OwnedValue {
    /// Borrow as an [`EValue`].
    pub fn as_evalue(&self) -> EValue<'_> {
        match self {
            Self::None => EValue::None,
            Self::Int(v) => EValue::Int(*v),
            Self::Double(v) => EValue::Double(*v),
            Self::Bool(v) => EValue::Bool(*v),
            Self::Tensor(t) => EValue::Tensor(t.view()),
        }
    }
}

impl fmt::Display for OwnedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_evalue(), f)
    }
}
