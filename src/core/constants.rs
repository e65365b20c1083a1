//! System constants and configuration defaults.

/// Code substituted for categorical strings not seen during training.
///
/// Trained vocabularies reserve index 0 for the out-of-dictionary item.
pub const DEFAULT_OUT_OF_VOCABULARY_CODE: i32 = 0;

/// Minimum number of examples before prediction switches to rayon.
pub const DEFAULT_MIN_PARALLEL_BATCH: usize = 256;

/// Number of threads for parallel prediction; 0 uses the global pool.
pub const DEFAULT_NUM_THREADS: usize = 0;

/// Prefix of the environment variables read by
/// [`ConverterConfig::load_from_environment`](crate::config::ConverterConfig::load_from_environment).
pub const ENV_PREFIX: &str = "FLAT_FOREST_";

/// Placeholder child offset written before a node's children are flattened.
///
/// Never a valid offset, so a leftover placeholder is detectable.
pub const UNRESOLVED_CHILD: i64 = i64::MIN;

/// Library version string.
pub const FLAT_FOREST_VERSION: &str = env!("CARGO_PKG_VERSION");
