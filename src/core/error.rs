//! Error handling and error types for flat forests.
//!
//! Every model-related error is detected while converting a model, before
//! any inference call. Inference itself only fails on batches that do not
//! match the model's feature layout.

use std::io;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum ForestError {
    /// A leaf carries something other than a single regression value
    #[error("Unsupported leaf type: {value}")]
    UnsupportedLeafType { value: String },

    /// A non-leaf carries a condition the flattener cannot express
    #[error("Unsupported condition type: {condition}")]
    UnsupportedConditionType { condition: String },

    /// An input feature has a semantic outside numerical/categorical/boolean
    #[error("The semantic {semantic} of feature {feature:?} is not supported")]
    UnsupportedSemantic { feature: String, semantic: String },

    /// The forest has no tree or no decision at all
    #[error("Empty forest: {reason}")]
    EmptyForest { reason: String },

    /// Multi-output forest with a non-zero base prediction
    #[error("Non-zero multi-dimensional initial predictions are not supported: {values:?}")]
    UnsupportedInitialPrediction { values: Vec<f32> },

    /// The named features of a batch differ from the model's input features
    #[error("Feature batch mismatch: expected {expected:?}, got {actual:?}")]
    FeatureBatchMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// A categorical condition references a code outside the vocabulary
    #[error("Invalid categorical item {item} for column {column:?} with vocabulary size {vocabulary_size}")]
    InvalidCategoricalValue {
        item: i64,
        column: String,
        vocabulary_size: usize,
    },

    /// The model type cannot be compiled
    #[error("Unsupported model: {kind}")]
    UnsupportedModel { kind: String },

    /// A condition references a column that is not an input feature
    #[error("Column {column} is not an input feature of the expected semantic")]
    UnknownFeature { column: usize },

    /// A batch column holds values that cannot be cast to the feature semantic
    #[error("Feature {feature:?} expects {expected} values, got {actual} values")]
    FeatureTypeMismatch {
        feature: String,
        expected: String,
        actual: String,
    },

    /// Batch columns of unequal length
    #[error("Feature {feature:?} has {actual} values, expected {expected}")]
    BatchSizeMismatch {
        feature: String,
        expected: usize,
        actual: usize,
    },

    /// An index array holds values wider than 32 bits
    #[error("No supported compact width for values in [{min}, {max}]")]
    ArrayWidthOverflow { min: i64, max: i64 },

    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Persistence errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Bincode serialization errors
    #[error("Bincode error: {source}")]
    Bincode {
        #[from]
        source: bincode::Error,
    },
}

/// Type alias for Results using ForestError
pub type Result<T> = std::result::Result<T, ForestError>;

impl ForestError {
    /// Create an unsupported leaf error
    pub fn unsupported_leaf<S: Into<String>>(value: S) -> Self {
        ForestError::UnsupportedLeafType {
            value: value.into(),
        }
    }

    /// Create an unsupported condition error
    pub fn unsupported_condition<S: Into<String>>(condition: S) -> Self {
        ForestError::UnsupportedConditionType {
            condition: condition.into(),
        }
    }

    /// Create an empty forest error
    pub fn empty_forest<S: Into<String>>(reason: S) -> Self {
        ForestError::EmptyForest {
            reason: reason.into(),
        }
    }

    /// Create an unsupported model error
    pub fn unsupported_model<S: Into<String>>(kind: S) -> Self {
        ForestError::UnsupportedModel { kind: kind.into() }
    }

    /// Create a feature type mismatch error
    pub fn feature_type_mismatch<F, E, A>(feature: F, expected: E, actual: A) -> Self
    where
        F: Into<String>,
        E: Into<String>,
        A: Into<String>,
    {
        ForestError::FeatureTypeMismatch {
            feature: feature.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ForestError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        ForestError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        ForestError::Serialization {
            message: message.into(),
        }
    }

    /// True for errors raised while converting a model, before inference.
    pub fn is_conversion_error(&self) -> bool {
        matches!(
            self,
            ForestError::UnsupportedLeafType { .. }
                | ForestError::UnsupportedConditionType { .. }
                | ForestError::UnsupportedSemantic { .. }
                | ForestError::EmptyForest { .. }
                | ForestError::UnsupportedInitialPrediction { .. }
                | ForestError::InvalidCategoricalValue { .. }
                | ForestError::UnsupportedModel { .. }
                | ForestError::UnknownFeature { .. }
                | ForestError::ArrayWidthOverflow { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ForestError::UnsupportedLeafType { .. } => "unsupported_leaf_type",
            ForestError::UnsupportedConditionType { .. } => "unsupported_condition_type",
            ForestError::UnsupportedSemantic { .. } => "unsupported_semantic",
            ForestError::EmptyForest { .. } => "empty_forest",
            ForestError::UnsupportedInitialPrediction { .. } => "unsupported_initial_prediction",
            ForestError::FeatureBatchMismatch { .. } => "feature_batch_mismatch",
            ForestError::InvalidCategoricalValue { .. } => "invalid_categorical_value",
            ForestError::UnsupportedModel { .. } => "unsupported_model",
            ForestError::UnknownFeature { .. } => "unknown_feature",
            ForestError::FeatureTypeMismatch { .. } => "feature_type_mismatch",
            ForestError::BatchSizeMismatch { .. } => "batch_size_mismatch",
            ForestError::ArrayWidthOverflow { .. } => "array_width_overflow",
            ForestError::Config { .. } => "config",
            ForestError::InvalidParameter { .. } => "invalid_parameter",
            ForestError::Serialization { .. } => "serialization",
            ForestError::Io { .. } => "io",
            ForestError::Json { .. } => "json",
            ForestError::Bincode { .. } => "bincode",
        }
    }
}

/// Convenience macro for configuration errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::ForestError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::ForestError::config(format!($fmt, $($arg)*))
    };
}

/// Returns early with the given error when the condition does not hold
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
