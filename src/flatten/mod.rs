//! Flattening of a decision forest into dense arrays.
//!
//! The flattener walks every tree of a [`ForestModel`] and lays its nodes out
//! in parallel arrays ([`InternalForest`]), which are then frozen into a
//! read-only [`FlattenedForest`]:
//!
//! - [`offset`]: signed tree-relative node addressing
//! - [`mask`]: categorical set to bitmap conversion
//! - [`densify`]: renumbering of condition kinds
//! - [`compact`]: narrow integer storage of index arrays
//!
//! ```rust
//! use flat_forest::config::ConverterConfig;
//! use flat_forest::core::types::Activation;
//! use flat_forest::flatten::flatten;
//! use flat_forest::model::{Column, Condition, DataSpec, ForestModel, Node, Tree};
//!
//! let data_spec = DataSpec::new(vec![Column::numerical("x")]);
//! let tree = Tree::new(Node::non_leaf(
//!     Condition::NumericalGreaterEqual { attribute: 0, threshold: 1.0 },
//!     Node::leaf(-1.0),
//!     Node::leaf(1.0),
//! ));
//! let model = ForestModel::gradient_boosted(data_spec, vec![tree], vec![0.0], Activation::Identity);
//!
//! let forest = flatten(&model, &ConverterConfig::default())?;
//! assert_eq!(forest.num_non_leaf_nodes(), 1);
//! assert_eq!(forest.num_leaf_nodes(), 2);
//! assert_eq!(forest.max_depth(), 1);
//! # Ok::<(), flat_forest::ForestError>(())
//! ```

pub mod compact;
pub mod densify;
pub mod flattened;
pub mod forest;
pub mod mask;
pub mod offset;

pub use compact::{CompactArray, IntWidth};
pub use densify::ConditionTable;
pub use flattened::FlattenedForest;
pub use forest::InternalForest;
pub use offset::{BeginNodeIdx, NodeIdx};

use crate::config::ConverterConfig;
use crate::core::error::Result;
use crate::features::FeatureSpec;
use crate::model::ForestModel;

/// Flattens and freezes every tree of `model`.
pub fn flatten(model: &ForestModel, config: &ConverterConfig) -> Result<FlattenedForest> {
    let feature_spec = FeatureSpec::new(&model.input_features)?;
    InternalForest::build(model, &feature_spec)?.freeze(config)
}
