//! Condition type densification.
//!
//! Raw condition tags are sparse over [`ConditionType::ALL`]. Densification
//! renumbers the tags occurring in a forest to `0..n`, so that the router
//! dispatches over exactly the kinds it can meet. A forest with a single kind
//! needs no per-node codes at all.

use crate::core::types::ConditionType;
use serde::{Deserialize, Serialize};

/// Dispatch table from a stored condition code to its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionTable {
    kinds: Vec<ConditionType>,
}

impl ConditionTable {
    /// Table indexed by raw tags.
    pub fn raw() -> Self {
        ConditionTable {
            kinds: ConditionType::ALL.to_vec(),
        }
    }

    /// Kind stored under `code`.
    #[inline]
    pub fn kind(&self, code: i32) -> Option<ConditionType> {
        usize::try_from(code)
            .ok()
            .and_then(|code| self.kinds.get(code))
            .copied()
    }

    /// Code of `kind`, if the table holds it.
    pub fn code(&self, kind: ConditionType) -> Option<usize> {
        self.kinds.iter().position(|&k| k == kind)
    }

    /// Kinds in code order.
    pub fn kinds(&self) -> &[ConditionType] {
        &self.kinds
    }

    /// Number of dispatch entries.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// True when the table has no entry.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// The only kind of a single-entry table.
    pub fn single(&self) -> Option<ConditionType> {
        match self.kinds.as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }
}

/// Result of densifying the condition tags of a forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseConditions {
    /// Dispatch table, in increasing raw tag order
    pub table: ConditionTable,
    /// Per-node dense codes; `None` when the forest holds a single kind
    pub codes: Option<Vec<i64>>,
}

/// Maps the distinct tags of `conditions` to `0..n` in increasing raw tag
/// order, and rewrites every node's tag.
pub fn densify_conditions(conditions: &[ConditionType]) -> DenseConditions {
    let mut kinds = conditions.to_vec();
    kinds.sort_unstable();
    kinds.dedup();
    log::debug!(
        "Densified {} condition kind(s): {:?}",
        kinds.len(),
        kinds
    );

    let table = ConditionTable { kinds };
    if table.len() <= 1 {
        return DenseConditions { table, codes: None };
    }

    let codes = conditions
        .iter()
        .map(|&kind| table.code(kind).map_or(-1, |code| code as i64))
        .collect();
    DenseConditions {
        table,
        codes: Some(codes),
    }
}

/// Keeps raw tags and the full dispatch table.
pub fn raw_conditions(conditions: &[ConditionType]) -> DenseConditions {
    DenseConditions {
        table: ConditionTable::raw(),
        codes: Some(conditions.iter().map(|kind| kind.tag() as i64).collect()),
    }
}
