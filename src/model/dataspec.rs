//! Column metadata of a trained model.

use crate::core::types::{ColumnIndex, Semantic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trained vocabulary of a categorical column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoricalSpec {
    /// String value to integer code
    pub items: BTreeMap<String, i32>,
    /// Number of codes, including the out-of-dictionary code
    pub number_of_unique_values: usize,
    /// Values are fed as integer codes and need no string encoding
    pub is_already_integerized: bool,
}

impl CategoricalSpec {
    /// Vocabulary from string items. Codes are assigned in the given order,
    /// starting at 1; code 0 is the out-of-dictionary item.
    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        let mut next = 1;
        for item in items {
            map.insert(item.into(), next);
            next += 1;
        }
        CategoricalSpec {
            items: map,
            number_of_unique_values: next as usize,
            is_already_integerized: false,
        }
    }

    /// Vocabulary of a column already holding integer codes in `[0, size)`.
    pub fn integerized(size: usize) -> Self {
        CategoricalSpec {
            items: BTreeMap::new(),
            number_of_unique_values: size,
            is_already_integerized: true,
        }
    }
}

/// One column of the data specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Semantic of the column
    pub semantic: Semantic,
    /// Vocabulary, for categorical and categorical-set columns
    pub categorical: Option<CategoricalSpec>,
}

impl Column {
    /// Numerical column.
    pub fn numerical<S: Into<String>>(name: S) -> Self {
        Column {
            name: name.into(),
            semantic: Semantic::Numerical,
            categorical: None,
        }
    }

    /// Boolean column.
    pub fn boolean<S: Into<String>>(name: S) -> Self {
        Column {
            name: name.into(),
            semantic: Semantic::Boolean,
            categorical: None,
        }
    }

    /// Categorical column with the given vocabulary.
    pub fn categorical<S: Into<String>>(name: S, spec: CategoricalSpec) -> Self {
        Column {
            name: name.into(),
            semantic: Semantic::Categorical,
            categorical: Some(spec),
        }
    }

    /// Number of categorical codes, or 0 for non-categorical columns.
    pub fn vocabulary_size(&self) -> usize {
        self.categorical
            .as_ref()
            .map(|c| c.number_of_unique_values)
            .unwrap_or(0)
    }
}

/// Column metadata for every column seen during training.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSpec {
    /// Columns, indexed by [`ColumnIndex`]
    pub columns: Vec<Column>,
}

impl DataSpec {
    /// Creates a data specification from its columns.
    pub fn new(columns: Vec<Column>) -> Self {
        DataSpec { columns }
    }

    /// Column at `index`.
    pub fn column(&self, index: ColumnIndex) -> Option<&Column> {
        self.columns.get(index)
    }
}
