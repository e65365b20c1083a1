//! Core data types for the flat forest representation.
//!
//! This module defines the scalar aliases shared by the flattener and the
//! router, together with the small closed enumerations (semantics,
//! activations, condition kinds) that cross module boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prediction value type. Leaf outputs, thresholds and scores are all `f32`.
pub type Score = f32;

/// Signed node address relative to the first node of the same kind in a tree.
///
/// `v >= 0` is the non-leaf `begin_non_leaf + v`, `v < 0` is the leaf
/// `begin_leaf + (-v - 1)`.
pub type NodeOffset = i32;

/// Dense index of a feature inside its semantic group.
pub type FeatureIndex = usize;

/// Index of a column in the model's data spec.
pub type ColumnIndex = usize;

/// Integer code of a categorical value.
pub type CategoryCode = i32;

/// Semantic of an input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semantic {
    /// Real valued feature
    Numerical,
    /// Single categorical value per example
    Categorical,
    /// True/false feature
    Boolean,
    /// Set of categorical values per example
    CategoricalSet,
    /// Numerical feature pre-discretized into buckets
    DiscretizedNumerical,
    /// Hashed string feature
    Hash,
}

impl fmt::Display for Semantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Semantic::Numerical => write!(f, "numerical"),
            Semantic::Categorical => write!(f, "categorical"),
            Semantic::Boolean => write!(f, "boolean"),
            Semantic::CategoricalSet => write!(f, "categorical_set"),
            Semantic::DiscretizedNumerical => write!(f, "discretized_numerical"),
            Semantic::Hash => write!(f, "hash"),
        }
    }
}

/// Activation (a.k.a. link) function applied on the summed forest output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Raw score is returned unchanged
    Identity,
    /// Logistic function, applied elementwise
    Sigmoid,
    /// Normalized exponential over the output vector
    Softmax,
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Identity
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Identity => write!(f, "identity"),
            Activation::Sigmoid => write!(f, "sigmoid"),
            Activation::Softmax => write!(f, "softmax"),
        }
    }
}

/// Kind of condition stored in a flattened non-leaf node.
///
/// The discriminant is the raw tag written by the flattener before
/// densification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConditionType {
    /// `numerical[feature] >= threshold`
    GreaterEqual = 0,
    /// `categorical_mask[offset + categorical[feature]]`
    IsIn = 1,
}

impl ConditionType {
    /// All condition kinds the router knows how to evaluate, in tag order.
    pub const ALL: [ConditionType; 2] = [ConditionType::GreaterEqual, ConditionType::IsIn];

    /// Raw tag value.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionType::GreaterEqual => write!(f, "greater_equal"),
            ConditionType::IsIn => write!(f, "is_in"),
        }
    }
}

/// Strategy used by the router to walk a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingMode {
    /// Scalar evaluation with real branches; leaves short-circuit.
    Branching,
    /// Lane-style evaluation: every iteration reads a node for every lane and
    /// the inactive result is discarded afterwards.
    Unified,
}

impl Default for RoutingMode {
    fn default() -> Self {
        RoutingMode::Branching
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMode::Branching => write!(f, "branching"),
            RoutingMode::Unified => write!(f, "unified"),
        }
    }
}
