//! Feature layout: named caller batches, internal dense indexing and
//! categorical string encoding.

pub mod batch;
pub mod encoding;
pub mod spec;

pub use batch::{FeatureBatch, FeatureColumn};
pub use encoding::FeatureEncoding;
pub use spec::{FeatureSpec, InternalFeatureValues};
