//! # flat-forest
//!
//! Converts a trained decision forest into dense, index-addressed arrays and
//! evaluates it with a fixed-iteration batched router.
//!
//! ## Features
//!
//! - **Flat layout**: every tree is laid out in contiguous leaf and non-leaf
//!   arrays addressed by signed tree-relative offsets. No pointers, no
//!   recursion at inference time.
//! - **Fixed iteration count**: every example walks every tree for exactly
//!   `max_depth` steps; leaves absorb, so the control flow does not depend on
//!   the data.
//! - **Compact storage**: index arrays use the narrowest signed integer width
//!   that holds their values, and condition kinds are renumbered densely.
//! - **Parallel prediction**: batches are split over examples with Rayon.
//!
//! ## Quick Start
//!
//! ```rust
//! use flat_forest::{compile, ConverterConfig, FeatureBatch};
//! use flat_forest::core::types::Activation;
//! use flat_forest::model::{CategoricalSpec, Column, Condition, DataSpec, ForestModel, Node, Tree};
//!
//! # fn main() -> flat_forest::Result<()> {
//! let data_spec = DataSpec::new(vec![
//!     Column::numerical("age"),
//!     Column::categorical("color", CategoricalSpec::from_items(["red", "green", "blue"])),
//! ]);
//!
//! // age >= 30 ? (color in {green} ? 2.0 : 1.0) : 0.0
//! let tree = Tree::new(Node::non_leaf(
//!     Condition::NumericalGreaterEqual { attribute: 0, threshold: 30.0 },
//!     Node::leaf(0.0),
//!     Node::non_leaf(
//!         Condition::CategoricalIsIn { attribute: 1, mask: vec![2] },
//!         Node::leaf(1.0),
//!         Node::leaf(2.0),
//!     ),
//! ));
//! let model = ForestModel::gradient_boosted(data_spec, vec![tree], vec![0.0], Activation::Identity);
//!
//! let compiled = compile(&model, &ConverterConfig::default())?;
//! let batch = FeatureBatch::new()
//!     .with("age", vec![25.0f32, 42.0, 42.0])
//!     .with("color", vec!["green", "green", "purple"]);
//! let predictions = compiled.encode_and_predict(batch)?;
//!
//! assert_eq!(predictions.as_scalar().unwrap().to_vec(), vec![0.0, 2.0, 1.0]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: scalar types, constants, error handling and initialisation
//! - [`config`]: converter configuration, from files, environment or builder
//! - [`model`]: the trained forest given as input
//! - [`features`]: feature indexing, categorical encoding and caller batches
//! - [`flatten`]: tree flattening, condition densification, compact arrays
//! - [`inference`]: routing, summation, activation and batched prediction
//! - [`persist`]: JSON and bincode storage of compiled forests

#![doc(html_root_url = "https://docs.rs/flat-forest/")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module - always available
pub mod core;

// Configuration management module
pub mod config;

// Input model
pub mod model;

// Feature layout and encoding
pub mod features;

// Forest flattening
pub mod flatten;

// Batched prediction
pub mod inference;

// Storage of compiled forests
pub mod persist;

pub use crate::core::{
    error::{ForestError, Result},
    types::*,
};

pub use config::{ConfigBuilder, ConverterConfig};

pub use features::{FeatureBatch, FeatureColumn, FeatureEncoding, FeatureSpec, InternalFeatureValues};

pub use flatten::{flatten, FlattenedForest, InternalForest};

pub use inference::{compile, CompiledForest, Predictions};

pub use model::ForestModel;

// Version information
pub use crate::core::constants::FLAT_FOREST_VERSION as VERSION;

/// Initialize the library.
///
/// Installs `env_logger` unless the host application already installed a
/// logger. Optional: nothing else in the crate depends on it.
///
/// # Examples
///
/// ```rust
/// fn main() -> flat_forest::Result<()> {
///     flat_forest::init()?;
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    crate::core::initialize_core()
}

/// Check if the library has been initialized.
pub fn is_initialized() -> bool {
    crate::core::is_core_initialized()
}
