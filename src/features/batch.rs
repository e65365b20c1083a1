//! Named feature batches supplied by callers at prediction time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values of one feature for every example of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureColumn {
    /// Floating point values
    Float(Vec<f32>),
    /// Integer values, including categorical codes
    Int(Vec<i32>),
    /// Boolean values
    Bool(Vec<bool>),
    /// Raw categorical strings
    Str(Vec<String>),
}

impl FeatureColumn {
    /// Number of examples in the column.
    pub fn len(&self) -> usize {
        match self {
            FeatureColumn::Float(v) => v.len(),
            FeatureColumn::Int(v) => v.len(),
            FeatureColumn::Bool(v) => v.len(),
            FeatureColumn::Str(v) => v.len(),
        }
    }

    /// Returns true if the column holds no value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the value kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FeatureColumn::Float(_) => "float",
            FeatureColumn::Int(_) => "integer",
            FeatureColumn::Bool(_) => "boolean",
            FeatureColumn::Str(_) => "string",
        }
    }
}

impl From<Vec<f32>> for FeatureColumn {
    fn from(values: Vec<f32>) -> Self {
        FeatureColumn::Float(values)
    }
}

impl From<Vec<i32>> for FeatureColumn {
    fn from(values: Vec<i32>) -> Self {
        FeatureColumn::Int(values)
    }
}

impl From<Vec<bool>> for FeatureColumn {
    fn from(values: Vec<bool>) -> Self {
        FeatureColumn::Bool(values)
    }
}

impl From<Vec<String>> for FeatureColumn {
    fn from(values: Vec<String>) -> Self {
        FeatureColumn::Str(values)
    }
}

impl From<Vec<&str>> for FeatureColumn {
    fn from(values: Vec<&str>) -> Self {
        FeatureColumn::Str(values.into_iter().map(str::to_string).collect())
    }
}

/// A batch of examples as one column per feature name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureBatch {
    columns: BTreeMap<String, FeatureColumn>,
}

impl FeatureBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column, builder style.
    pub fn with<S, C>(mut self, name: S, column: C) -> Self
    where
        S: Into<String>,
        C: Into<FeatureColumn>,
    {
        self.insert(name, column);
        self
    }

    /// Adds or replaces a column.
    pub fn insert<S, C>(&mut self, name: S, column: C)
    where
        S: Into<String>,
        C: Into<FeatureColumn>,
    {
        self.columns.insert(name.into(), column.into());
    }

    /// Column of the given feature.
    pub fn get(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.get(name)
    }

    /// Feature names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Iterates over `(name, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureColumn)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of features.
    pub fn num_features(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the batch has no feature.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Leading length of the first column, if any.
    pub fn batch_size(&self) -> Option<usize> {
        self.columns.values().next().map(FeatureColumn::len)
    }

    pub(crate) fn into_columns(self) -> BTreeMap<String, FeatureColumn> {
        self.columns
    }

    pub(crate) fn from_columns(columns: BTreeMap<String, FeatureColumn>) -> Self {
        FeatureBatch { columns }
    }
}
