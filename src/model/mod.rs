//! Trained decision forest models, as produced by a training library.
//!
//! This is the input of the converter: an already materialized forest, the
//! model's input features and the data spec holding their
//! semantics and vocabularies.

pub mod dataspec;
pub mod tree;

pub use dataspec::{CategoricalSpec, Column, DataSpec};
pub use tree::{Condition, LeafValue, Node, Tree};

use crate::core::error::Result;
use crate::core::types::{Activation, ColumnIndex, Semantic};
use serde::{Deserialize, Serialize};

/// An input feature of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFeature {
    /// Feature name, as used in feature batches
    pub name: String,
    /// Semantic of the feature
    pub semantic: Semantic,
    /// Column in the data spec
    pub column_idx: ColumnIndex,
}

/// Family of the forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Boosted trees: outputs are summed onto an initial prediction
    GradientBoostedTrees {
        initial_predictions: Vec<f32>,
        activation: Activation,
    },
    /// Bagged trees
    RandomForest,
}

/// A trained decision forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    /// Input features in model order
    pub input_features: Vec<InputFeature>,
    /// Column metadata
    pub data_spec: DataSpec,
    /// Trees in evaluation order
    pub trees: Vec<Tree>,
    /// Model family
    pub kind: ModelKind,
}

impl ForestModel {
    /// Gradient boosted trees model using every column of `data_spec` as an
    /// input feature, in column order.
    pub fn gradient_boosted(
        data_spec: DataSpec,
        trees: Vec<Tree>,
        initial_predictions: Vec<f32>,
        activation: Activation,
    ) -> Self {
        let input_features = data_spec
            .columns
            .iter()
            .enumerate()
            .map(|(column_idx, column)| InputFeature {
                name: column.name.clone(),
                semantic: column.semantic,
                column_idx,
            })
            .collect();
        ForestModel {
            input_features,
            data_spec,
            trees,
            kind: ModelKind::GradientBoostedTrees {
                initial_predictions,
                activation,
            },
        }
    }

    /// Activation declared by the model; identity for non-boosted forests.
    pub fn activation(&self) -> Activation {
        match &self.kind {
            ModelKind::GradientBoostedTrees { activation, .. } => *activation,
            ModelKind::RandomForest => Activation::Identity,
        }
    }

    /// Base prediction; `[0.0]` for non-boosted forests.
    pub fn initial_predictions(&self) -> Vec<f32> {
        match &self.kind {
            ModelKind::GradientBoostedTrees {
                initial_predictions,
                ..
            } => initial_predictions.clone(),
            ModelKind::RandomForest => vec![0.0],
        }
    }

    /// Parses a model from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump_model() -> ForestModel {
        let spec = DataSpec::new(vec![Column::numerical("x")]);
        let tree = Tree::new(Node::non_leaf(
            Condition::NumericalGreaterEqual {
                attribute: 0,
                threshold: 0.5,
            },
            Node::leaf(1.0),
            Node::leaf(2.0),
        ));
        ForestModel::gradient_boosted(spec, vec![tree], vec![0.0], Activation::Sigmoid)
    }

    #[test]
    fn test_gradient_boosted_constructor() {
        let model = stump_model();
        assert_eq!(model.input_features.len(), 1);
        assert_eq!(model.input_features[0].name, "x");
        assert_eq!(model.input_features[0].semantic, Semantic::Numerical);
        assert_eq!(model.activation(), Activation::Sigmoid);
        assert_eq!(model.initial_predictions(), vec![0.0]);
    }

    #[test]
    fn test_random_forest_defaults() {
        let mut model = stump_model();
        model.kind = ModelKind::RandomForest;
        assert_eq!(model.activation(), Activation::Identity);
        assert_eq!(model.initial_predictions(), vec![0.0]);
    }

    #[test]
    fn test_json_round_trip() {
        let model = stump_model();
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(ForestModel::from_json_str(&json).unwrap(), model);
    }
}
