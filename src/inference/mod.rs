//! Batched prediction over flattened forests.
//!
//! [`compile`] turns a [`ForestModel`](crate::model::ForestModel) into a
//! [`CompiledForest`], which routes every example through every tree for a
//! fixed number of iterations, sums the leaf outputs and applies the model's
//! activation.

pub mod activation;
pub mod compiled;
pub mod router;

pub use activation::{apply_activation, sigmoid};
pub use compiled::{compile, CompiledForest, Predictions, LANE_BLOCK_SIZE};
pub use router::{route_lanes, route_tree, ExampleRef};
