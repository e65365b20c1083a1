//! Node addressing.
//!
//! A node is addressed by a signed offset relative to the first node of the
//! same kind in its tree. The sign carries the kind:
//!
//! | offset | node |
//! |---|---|
//! | `v >= 0` | non-leaf `begin_non_leaf + v` |
//! | `v < 0` | leaf `begin_leaf + (-v - 1)` |
//!
//! Offset `0` is always the first non-leaf of the tree; leaves start at `-1`.

use serde::{Deserialize, Serialize};

/// Index of the first leaf and first non-leaf node of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginNodeIdx {
    /// Forest-wide index of the tree's first leaf
    pub leaf: usize,
    /// Forest-wide index of the tree's first non-leaf
    pub non_leaf: usize,
}

/// Forest-wide index of a leaf or a non-leaf node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeIdx {
    /// Index in the leaf arrays
    Leaf(usize),
    /// Index in the non-leaf arrays
    NonLeaf(usize),
}

impl NodeIdx {
    /// Offset of this node relative to `begin`.
    ///
    /// The node must belong to the tree starting at `begin`.
    pub fn offset(self, begin: BeginNodeIdx) -> i64 {
        match self {
            NodeIdx::NonLeaf(idx) => {
                debug_assert!(idx >= begin.non_leaf);
                (idx - begin.non_leaf) as i64
            }
            NodeIdx::Leaf(idx) => {
                debug_assert!(idx >= begin.leaf);
                -((idx - begin.leaf) as i64) - 1
            }
        }
    }

    /// Decodes an offset relative to `begin`.
    pub fn from_offset(offset: i64, begin: BeginNodeIdx) -> Self {
        if offset >= 0 {
            NodeIdx::NonLeaf(begin.non_leaf + offset as usize)
        } else {
            NodeIdx::Leaf(begin.leaf + (-offset - 1) as usize)
        }
    }

    /// Returns true for leaves.
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeIdx::Leaf(_))
    }
}

/// Forest-wide leaf index reached by a negative offset.
#[inline]
pub fn leaf_index(begin_leaf: usize, offset: i32) -> usize {
    debug_assert!(offset < 0);
    begin_leaf + (-(offset as i64) - 1) as usize
}
