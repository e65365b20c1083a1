//! String to integer encoding of categorical features.

use crate::core::constants::DEFAULT_OUT_OF_VOCABULARY_CODE;
use crate::core::types::{CategoryCode, Semantic};
use crate::features::batch::{FeatureBatch, FeatureColumn};
use crate::model::{DataSpec, InputFeature};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Encodes categorical strings into the codes used during training.
///
/// Unseen strings map to the out-of-vocabulary code, so an `IsIn` condition
/// on an unseen value is false unless that code is itself in the condition's
/// set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoding {
    categorical: BTreeMap<String, HashMap<String, CategoryCode>>,
    out_of_vocabulary_code: CategoryCode,
}

impl FeatureEncoding {
    /// Builds the encoder of a model.
    ///
    /// Returns `None` when no input feature needs encoding, in which case
    /// batches can be fed to the model as they are.
    pub fn build(input_features: &[InputFeature], data_spec: &DataSpec) -> Option<Self> {
        Self::build_with_code(input_features, data_spec, DEFAULT_OUT_OF_VOCABULARY_CODE)
    }

    /// Same as [`FeatureEncoding::build`] with a custom out-of-vocabulary code.
    pub fn build_with_code(
        input_features: &[InputFeature],
        data_spec: &DataSpec,
        out_of_vocabulary_code: CategoryCode,
    ) -> Option<Self> {
        let mut categorical = BTreeMap::new();
        for feature in input_features {
            if !matches!(
                feature.semantic,
                Semantic::Categorical | Semantic::CategoricalSet
            ) {
                continue;
            }
            let vocabulary = data_spec
                .column(feature.column_idx)
                .and_then(|column| column.categorical.as_ref());
            if let Some(vocabulary) = vocabulary {
                if !vocabulary.is_already_integerized {
                    let map = vocabulary
                        .items
                        .iter()
                        .map(|(key, &code)| (key.clone(), code))
                        .collect();
                    categorical.insert(feature.name.clone(), map);
                }
            }
        }

        if categorical.is_empty() {
            None
        } else {
            log::debug!("Categorical encoding for {} feature(s)", categorical.len());
            Some(FeatureEncoding {
                categorical,
                out_of_vocabulary_code,
            })
        }
    }

    /// Code of `value` for `feature`, or the out-of-vocabulary code.
    ///
    /// Returns `None` if the feature is not encoded.
    pub fn encode_value(&self, feature: &str, value: &str) -> Option<CategoryCode> {
        self.categorical.get(feature).map(|map| {
            map.get(value)
                .copied()
                .unwrap_or(self.out_of_vocabulary_code)
        })
    }

    /// Names of the encoded features.
    pub fn encoded_features(&self) -> impl Iterator<Item = &str> {
        self.categorical.keys().map(String::as_str)
    }

    /// Code used for unseen values.
    pub fn out_of_vocabulary_code(&self) -> CategoryCode {
        self.out_of_vocabulary_code
    }

    /// Replaces the string columns of encoded features with their codes.
    ///
    /// Every other column is passed through unchanged.
    pub fn encode(&self, batch: FeatureBatch) -> FeatureBatch {
        let columns = batch
            .into_columns()
            .into_iter()
            .map(|(name, column)| {
                let column = match (self.categorical.get(&name), column) {
                    (Some(map), FeatureColumn::Str(values)) => FeatureColumn::Int(
                        values
                            .iter()
                            .map(|v| map.get(v).copied().unwrap_or(self.out_of_vocabulary_code))
                            .collect(),
                    ),
                    (_, column) => column,
                };
                (name, column)
            })
            .collect();
        FeatureBatch::from_columns(columns)
    }
}
