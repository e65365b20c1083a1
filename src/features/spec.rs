//! Internal feature indexing.
//!
//! Features sharing a semantic are packed into one dense group. A model with
//! input features `[a: numerical, b: categorical, c: numerical]` has the
//! numerical group `[a, c]` and the categorical group `[b]`; a condition on
//! column `c` then reads `numerical[1]`.

use crate::core::error::{ForestError, Result};
use crate::core::types::{ColumnIndex, FeatureIndex, Semantic};
use crate::features::batch::{FeatureBatch, FeatureColumn};
use crate::model::InputFeature;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Feature values of a batch in the internal layout.
///
/// Each array has shape `[batch_size, group_size]`; groups without any
/// feature have zero columns.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalFeatureValues {
    /// Numerical group
    pub numerical: Array2<f32>,
    /// Categorical group (integer codes)
    pub categorical: Array2<i32>,
    /// Boolean group
    pub boolean: Array2<bool>,
}

impl InternalFeatureValues {
    /// Number of examples.
    pub fn num_examples(&self) -> usize {
        self.numerical.nrows()
    }
}

/// Mapping between model columns and internal feature indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    numerical: Vec<String>,
    categorical: Vec<String>,
    boolean: Vec<String>,
    inv_numerical: HashMap<ColumnIndex, FeatureIndex>,
    inv_categorical: HashMap<ColumnIndex, FeatureIndex>,
    inv_boolean: HashMap<ColumnIndex, FeatureIndex>,
    feature_names: BTreeSet<String>,
}

impl FeatureSpec {
    /// Indexes the input features, preserving their order within each group.
    pub fn new(input_features: &[InputFeature]) -> Result<Self> {
        let mut spec = FeatureSpec {
            numerical: Vec::new(),
            categorical: Vec::new(),
            boolean: Vec::new(),
            inv_numerical: HashMap::new(),
            inv_categorical: HashMap::new(),
            inv_boolean: HashMap::new(),
            feature_names: BTreeSet::new(),
        };

        for feature in input_features {
            let (names, inverse) = match feature.semantic {
                Semantic::Numerical => (&mut spec.numerical, &mut spec.inv_numerical),
                Semantic::Categorical => (&mut spec.categorical, &mut spec.inv_categorical),
                Semantic::Boolean => (&mut spec.boolean, &mut spec.inv_boolean),
                other => {
                    return Err(ForestError::UnsupportedSemantic {
                        feature: feature.name.clone(),
                        semantic: other.to_string(),
                    })
                }
            };
            inverse.insert(feature.column_idx, names.len());
            names.push(feature.name.clone());
            spec.feature_names.insert(feature.name.clone());
        }

        Ok(spec)
    }

    /// Internal index of a numerical column.
    pub fn numerical_index(&self, column: ColumnIndex) -> Option<FeatureIndex> {
        self.inv_numerical.get(&column).copied()
    }

    /// Internal index of a categorical column.
    pub fn categorical_index(&self, column: ColumnIndex) -> Option<FeatureIndex> {
        self.inv_categorical.get(&column).copied()
    }

    /// Internal index of a boolean column.
    pub fn boolean_index(&self, column: ColumnIndex) -> Option<FeatureIndex> {
        self.inv_boolean.get(&column).copied()
    }

    /// Semantic group and internal index of a column.
    pub fn lookup(&self, column: ColumnIndex) -> Option<(Semantic, FeatureIndex)> {
        self.numerical_index(column)
            .map(|i| (Semantic::Numerical, i))
            .or_else(|| self.categorical_index(column).map(|i| (Semantic::Categorical, i)))
            .or_else(|| self.boolean_index(column).map(|i| (Semantic::Boolean, i)))
    }

    /// Numerical feature names in internal order.
    pub fn numerical(&self) -> &[String] {
        &self.numerical
    }

    /// Categorical feature names in internal order.
    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    /// Boolean feature names in internal order.
    pub fn boolean(&self) -> &[String] {
        &self.boolean
    }

    /// Names of all the input features.
    pub fn feature_names(&self) -> &BTreeSet<String> {
        &self.feature_names
    }

    /// Converts a named batch into the internal layout.
    ///
    /// The batch must hold exactly the model's input features, all with the
    /// same number of examples.
    pub fn convert_features(&self, batch: &FeatureBatch) -> Result<InternalFeatureValues> {
        let mismatch = || ForestError::FeatureBatchMismatch {
            expected: self.feature_names.iter().cloned().collect(),
            actual: batch.names().map(str::to_string).collect(),
        };

        let batch_size = batch.batch_size().ok_or_else(mismatch)?;
        if !batch.names().eq(self.feature_names.iter().map(String::as_str)) {
            return Err(mismatch());
        }
        for (name, column) in batch.iter() {
            if column.len() != batch_size {
                return Err(ForestError::BatchSizeMismatch {
                    feature: name.to_string(),
                    expected: batch_size,
                    actual: column.len(),
                });
            }
        }

        Ok(InternalFeatureValues {
            numerical: stack(batch, &self.numerical, batch_size, to_numerical)?,
            categorical: stack(batch, &self.categorical, batch_size, to_categorical)?,
            boolean: stack(batch, &self.boolean, batch_size, to_boolean)?,
        })
    }

    /// Checks that caller-built `values` have the shape of this layout: one
    /// column per feature of each group, and the same number of rows in
    /// every group.
    pub fn check_values(&self, values: &InternalFeatureValues) -> Result<()> {
        let groups = [
            ("numerical", &self.numerical, values.numerical.dim()),
            ("categorical", &self.categorical, values.categorical.dim()),
            ("boolean", &self.boolean, values.boolean.dim()),
        ];
        let batch_size = values.num_examples();
        for (group, names, (rows, cols)) in groups {
            if cols != names.len() {
                return Err(ForestError::FeatureBatchMismatch {
                    expected: names.clone(),
                    actual: (0..cols).map(|i| format!("{}[{}]", group, i)).collect(),
                });
            }
            if rows != batch_size {
                return Err(ForestError::BatchSizeMismatch {
                    feature: group.to_string(),
                    expected: batch_size,
                    actual: rows,
                });
            }
        }
        Ok(())
    }
}

fn stack<T, F>(
    batch: &FeatureBatch,
    names: &[String],
    batch_size: usize,
    convert: F,
) -> Result<Array2<T>>
where
    T: Copy + Default,
    F: Fn(&str, &FeatureColumn) -> Result<Vec<T>>,
{
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        // presence was checked by the caller
        let column = batch.get(name).ok_or_else(|| ForestError::FeatureBatchMismatch {
            expected: names.to_vec(),
            actual: batch.names().map(str::to_string).collect(),
        })?;
        columns.push(convert(name, column)?);
    }
    Ok(Array2::from_shape_fn((batch_size, names.len()), |(row, col)| {
        columns[col][row]
    }))
}

fn to_numerical(name: &str, column: &FeatureColumn) -> Result<Vec<f32>> {
    match column {
        FeatureColumn::Float(v) => Ok(v.clone()),
        FeatureColumn::Int(v) => Ok(v.iter().map(|&x| x as f32).collect()),
        FeatureColumn::Bool(v) => Ok(v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect()),
        FeatureColumn::Str(_) => Err(ForestError::feature_type_mismatch(
            name,
            "numerical",
            column.kind_name(),
        )),
    }
}

fn to_categorical(name: &str, column: &FeatureColumn) -> Result<Vec<i32>> {
    match column {
        FeatureColumn::Int(v) => Ok(v.clone()),
        FeatureColumn::Float(v) => Ok(v.iter().map(|&x| x as i32).collect()),
        FeatureColumn::Bool(v) => Ok(v.iter().map(|&x| i32::from(x)).collect()),
        FeatureColumn::Str(_) => Err(ForestError::feature_type_mismatch(
            name,
            "categorical codes (encode strings first)",
            column.kind_name(),
        )),
    }
}

fn to_boolean(name: &str, column: &FeatureColumn) -> Result<Vec<bool>> {
    match column {
        FeatureColumn::Bool(v) => Ok(v.clone()),
        FeatureColumn::Int(v) => Ok(v.iter().map(|&x| x != 0).collect()),
        FeatureColumn::Float(v) => Ok(v.iter().map(|&x| x != 0.0).collect()),
        FeatureColumn::Str(_) => Err(ForestError::feature_type_mismatch(
            name,
            "boolean",
            column.kind_name(),
        )),
    }
}
