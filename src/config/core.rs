//! Converter configuration and builder.
//!
//! Controls how a model is turned into a flat forest (condition
//! densification, compact index widths) and how the compiled forest is
//! evaluated (routing mode, parallelism).

use crate::core::constants::*;
use crate::core::error::{ForestError, Result};
use crate::core::types::RoutingMode;
use crate::{config_error, ensure};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for model conversion and batched prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Re-code the condition kinds present in the forest onto a dense range
    pub densify_conditions: bool,
    /// Store index arrays in the narrowest signed integer width
    pub compact_arrays: bool,
    /// How the router walks each tree
    pub routing: RoutingMode,
    /// Evaluate large batches with rayon
    pub parallel: bool,
    /// Minimum batch size for the parallel path
    pub min_parallel_batch: usize,
    /// Threads for parallel prediction (0 = rayon global pool)
    pub num_threads: usize,
    /// Code substituted for unseen categorical strings
    pub out_of_vocabulary_code: i32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            densify_conditions: true,
            compact_arrays: true,
            routing: RoutingMode::Branching,
            parallel: true,
            min_parallel_batch: DEFAULT_MIN_PARALLEL_BATCH,
            num_threads: DEFAULT_NUM_THREADS,
            out_of_vocabulary_code: DEFAULT_OUT_OF_VOCABULARY_CODE,
        }
    }
}

impl ConverterConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_parallel_batch > 0,
            ForestError::invalid_parameter("min_parallel_batch", "0", "must be positive")
        );
        ensure!(
            self.out_of_vocabulary_code >= 0,
            ForestError::invalid_parameter(
                "out_of_vocabulary_code",
                self.out_of_vocabulary_code.to_string(),
                "must be non-negative",
            )
        );

        if self.num_threads > num_cpus::get() * 2 {
            log::warn!(
                "num_threads ({}) is much larger than available cores ({})",
                self.num_threads,
                num_cpus::get()
            );
        }

        Ok(())
    }

    /// Load configuration from a `.toml` or `.json` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error!("Failed to read config file: {}", e))?;

        let config: ConverterConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| config_error!("Failed to parse JSON config: {}", e))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| config_error!("Failed to parse TOML config: {}", e))?,
            _ => {
                return Err(ForestError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.toml` or `.json` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| config_error!("Failed to serialize to JSON: {}", e))?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| config_error!("Failed to serialize to TOML: {}", e))?,
            _ => {
                return Err(ForestError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)
            .map_err(|e| config_error!("Failed to write config file: {}", e))?;
        Ok(())
    }

    /// Load configuration from `FLAT_FOREST_*` environment variables.
    ///
    /// Unset variables keep their default value.
    pub fn load_from_environment() -> Result<Self> {
        Self::load_from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn load_from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ConverterConfig::default();
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(val) = var("DENSIFY_CONDITIONS") {
            config.densify_conditions = parse_bool("DENSIFY_CONDITIONS", &val)?;
        }
        if let Some(val) = var("COMPACT_ARRAYS") {
            config.compact_arrays = parse_bool("COMPACT_ARRAYS", &val)?;
        }
        if let Some(val) = var("ROUTING") {
            config.routing = match val.to_lowercase().as_str() {
                "branching" => RoutingMode::Branching,
                "unified" => RoutingMode::Unified,
                _ => return Err(config_error!("Invalid {}ROUTING", ENV_PREFIX)),
            };
        }
        if let Some(val) = var("PARALLEL") {
            config.parallel = parse_bool("PARALLEL", &val)?;
        }
        if let Some(val) = var("MIN_PARALLEL_BATCH") {
            config.min_parallel_batch = val.parse().map_err(|_| {
                config_error!("Invalid {}MIN_PARALLEL_BATCH", ENV_PREFIX)
            })?;
        }
        if let Some(val) = var("NUM_THREADS") {
            config.num_threads = val
                .parse()
                .map_err(|_| config_error!("Invalid {}NUM_THREADS", ENV_PREFIX))?;
        }
        if let Some(val) = var("OUT_OF_VOCABULARY_CODE") {
            config.out_of_vocabulary_code = val.parse().map_err(|_| {
                config_error!("Invalid {}OUT_OF_VOCABULARY_CODE", ENV_PREFIX)
            })?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(config_error!("Invalid {}{}", ENV_PREFIX, name)),
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: ConverterConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        ConfigBuilder {
            config: ConverterConfig::default(),
        }
    }

    /// Enable or disable condition densification
    pub fn densify_conditions(mut self, enabled: bool) -> Self {
        self.config.densify_conditions = enabled;
        self
    }

    /// Enable or disable compact index arrays
    pub fn compact_arrays(mut self, enabled: bool) -> Self {
        self.config.compact_arrays = enabled;
        self
    }

    /// Set the routing mode
    pub fn routing(mut self, routing: RoutingMode) -> Self {
        self.config.routing = routing;
        self
    }

    /// Enable or disable parallel prediction
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.config.parallel = enabled;
        self
    }

    /// Set the minimum batch size for parallel prediction
    pub fn min_parallel_batch(mut self, size: usize) -> Self {
        self.config.min_parallel_batch = size;
        self
    }

    /// Set the number of prediction threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Set the out-of-vocabulary code
    pub fn out_of_vocabulary_code(mut self, code: i32) -> Self {
        self.config.out_of_vocabulary_code = code;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<ConverterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
