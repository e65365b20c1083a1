//! Configuration management.
//!
//! [`ConverterConfig`] can be built programmatically with [`ConfigBuilder`],
//! read from a TOML or JSON file, or read from `FLAT_FOREST_*` environment
//! variables.

pub mod core;

pub use self::core::{ConfigBuilder, ConverterConfig};
