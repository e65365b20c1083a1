//! Narrow integer storage for index arrays.
//!
//! Index arrays (features, child offsets, tree offsets, condition codes) are
//! stored in the smallest signed width holding all their values. Only signed
//! widths are used so that offsets keep their sign.

use crate::core::error::{ForestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage width of a [`CompactArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntWidth {
    /// 8-bit signed
    I8,
    /// 16-bit signed
    I16,
    /// 32-bit signed
    I32,
}

impl IntWidth {
    /// Candidate widths, narrowest first.
    pub const CANDIDATES: [IntWidth; 3] = [IntWidth::I8, IntWidth::I16, IntWidth::I32];

    /// Smallest representable value.
    pub fn min_value(self) -> i64 {
        match self {
            IntWidth::I8 => i8::MIN as i64,
            IntWidth::I16 => i16::MIN as i64,
            IntWidth::I32 => i32::MIN as i64,
        }
    }

    /// Largest representable value.
    pub fn max_value(self) -> i64 {
        match self {
            IntWidth::I8 => i8::MAX as i64,
            IntWidth::I16 => i16::MAX as i64,
            IntWidth::I32 => i32::MAX as i64,
        }
    }

    /// Size of one element in bytes.
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::I8 => 1,
            IntWidth::I16 => 2,
            IntWidth::I32 => 4,
        }
    }

    fn holds(self, min: i64, max: i64) -> bool {
        min >= self.min_value() && max <= self.max_value()
    }
}

impl fmt::Display for IntWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntWidth::I8 => write!(f, "i8"),
            IntWidth::I16 => write!(f, "i16"),
            IntWidth::I32 => write!(f, "i32"),
        }
    }
}

/// Selects the narrowest width holding every value.
pub fn compact_width(values: &[i64]) -> Result<IntWidth> {
    let (min, max) = min_max(values)
        .ok_or_else(|| ForestError::invalid_parameter("values", "[]", "no values provided"))?;
    IntWidth::CANDIDATES
        .into_iter()
        .find(|width| width.holds(min, max))
        .ok_or(ForestError::ArrayWidthOverflow { min, max })
}

fn min_max(values: &[i64]) -> Option<(i64, i64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Read-only integer array stored in a narrow width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompactArray {
    /// 8-bit storage
    I8(Vec<i8>),
    /// 16-bit storage
    I16(Vec<i16>),
    /// 32-bit storage
    I32(Vec<i32>),
}

impl CompactArray {
    /// Stores `values`, in the narrowest width if `compact` is set and in
    /// `i32` otherwise.
    ///
    /// An empty input becomes the single element `[0]`, so that no array read
    /// by the router is empty.
    pub fn from_values(values: &[i64], compact: bool) -> Result<Self> {
        if values.is_empty() {
            return Ok(CompactArray::I32(vec![0]));
        }

        let width = if compact {
            compact_width(values)?
        } else {
            let (min, max) = min_max(values).unwrap_or((0, 0));
            if !IntWidth::I32.holds(min, max) {
                return Err(ForestError::ArrayWidthOverflow { min, max });
            }
            IntWidth::I32
        };
        log::trace!("{} values stored as {}", values.len(), width);

        Ok(match width {
            IntWidth::I8 => CompactArray::I8(values.iter().map(|&v| v as i8).collect()),
            IntWidth::I16 => CompactArray::I16(values.iter().map(|&v| v as i16).collect()),
            IntWidth::I32 => CompactArray::I32(values.iter().map(|&v| v as i32).collect()),
        })
    }

    /// Value at `index`, widened to `i32`.
    ///
    /// Panics if `index` is out of bounds, like slice indexing.
    #[inline]
    pub fn get(&self, index: usize) -> i32 {
        match self {
            CompactArray::I8(v) => v[index] as i32,
            CompactArray::I16(v) => v[index] as i32,
            CompactArray::I32(v) => v[index],
        }
    }

    /// Value at `index`, or `None` when out of bounds.
    #[inline]
    pub fn try_get(&self, index: usize) -> Option<i32> {
        match self {
            CompactArray::I8(v) => v.get(index).map(|&x| x as i32),
            CompactArray::I16(v) => v.get(index).map(|&x| x as i32),
            CompactArray::I32(v) => v.get(index).copied(),
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        match self {
            CompactArray::I8(v) => v.len(),
            CompactArray::I16(v) => v.len(),
            CompactArray::I32(v) => v.len(),
        }
    }

    /// Always false: compact arrays hold at least one element.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage width.
    pub fn width(&self) -> IntWidth {
        match self {
            CompactArray::I8(_) => IntWidth::I8,
            CompactArray::I16(_) => IntWidth::I16,
            CompactArray::I32(_) => IntWidth::I32,
        }
    }

    /// Values widened to `i32`.
    pub fn to_vec(&self) -> Vec<i32> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Heap size of the values in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.width().bytes()
    }
}
