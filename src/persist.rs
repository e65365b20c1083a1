//! Persistence of compiled forests.
//!
//! A compiled forest is stored with everything needed to predict again: the
//! flat arrays, the internal feature layout, the categorical encoder and the
//! configuration. Two formats are supported, JSON for inspection and bincode
//! for compact storage. Loaded forests are validated before use.

use crate::config::ConverterConfig;
use crate::core::constants::FLAT_FOREST_VERSION;
use crate::core::error::{ForestError, Result};
use crate::features::{FeatureEncoding, FeatureSpec};
use crate::flatten::FlattenedForest;
use crate::inference::CompiledForest;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// On-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistFormat {
    /// Human readable JSON
    Json,
    /// Compact bincode
    Bincode,
}

impl PersistFormat {
    /// Format matching the extension of `path`: `.json`, or `.bin`/`.bincode`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(PersistFormat::Json),
            Some("bin") | Some("bincode") => Ok(PersistFormat::Bincode),
            other => Err(ForestError::invalid_parameter(
                "path",
                path.display().to_string(),
                format!("unsupported extension {:?}, expected json, bin or bincode", other),
            )),
        }
    }
}

impl fmt::Display for PersistFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistFormat::Json => write!(f, "json"),
            PersistFormat::Bincode => write!(f, "bincode"),
        }
    }
}

#[derive(Serialize)]
struct SavedForestRef<'a> {
    version: &'a str,
    config: &'a ConverterConfig,
    feature_spec: &'a FeatureSpec,
    feature_encoding: Option<&'a FeatureEncoding>,
    forest: &'a FlattenedForest,
}

#[derive(Deserialize)]
struct SavedForest {
    version: String,
    config: ConverterConfig,
    feature_spec: FeatureSpec,
    feature_encoding: Option<FeatureEncoding>,
    forest: FlattenedForest,
}

impl<'a> SavedForestRef<'a> {
    fn new(compiled: &'a CompiledForest) -> Self {
        SavedForestRef {
            version: FLAT_FOREST_VERSION,
            config: compiled.config(),
            feature_spec: compiled.feature_spec(),
            feature_encoding: compiled.feature_encoding(),
            forest: compiled.forest(),
        }
    }
}

impl SavedForest {
    fn into_compiled(self) -> Result<CompiledForest> {
        if self.version != FLAT_FOREST_VERSION {
            log::warn!(
                "Loading a forest saved by version {} with version {}",
                self.version,
                FLAT_FOREST_VERSION
            );
        }
        CompiledForest::from_parts(
            self.forest,
            self.feature_spec,
            self.feature_encoding,
            self.config,
        )
    }
}

/// Saves `compiled` in the format matching the extension of `path`.
pub fn save<P: AsRef<Path>>(compiled: &CompiledForest, path: P) -> Result<()> {
    match PersistFormat::from_path(&path)? {
        PersistFormat::Json => save_json(compiled, path),
        PersistFormat::Bincode => save_bincode(compiled, path),
    }
}

/// Loads a forest in the format matching the extension of `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<CompiledForest> {
    match PersistFormat::from_path(&path)? {
        PersistFormat::Json => load_json(path),
        PersistFormat::Bincode => load_bincode(path),
    }
}

/// Saves `compiled` as JSON.
pub fn save_json<P: AsRef<Path>>(compiled: &CompiledForest, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, &SavedForestRef::new(compiled))?;
    writer.flush()?;
    log::debug!("Saved forest to {} as json", path.as_ref().display());
    Ok(())
}

/// Loads a forest saved with [`save_json`].
pub fn load_json<P: AsRef<Path>>(path: P) -> Result<CompiledForest> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let saved: SavedForest = serde_json::from_reader(reader)?;
    log::debug!("Loaded forest from {}", path.as_ref().display());
    saved.into_compiled()
}

/// Saves `compiled` as bincode.
pub fn save_bincode<P: AsRef<Path>>(compiled: &CompiledForest, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    bincode::serialize_into(&mut writer, &SavedForestRef::new(compiled))?;
    writer.flush()?;
    log::debug!("Saved forest to {} as bincode", path.as_ref().display());
    Ok(())
}

/// Loads a forest saved with [`save_bincode`].
pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<CompiledForest> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let saved: SavedForest = bincode::deserialize_from(reader)?;
    log::debug!("Loaded forest from {}", path.as_ref().display());
    saved.into_compiled()
}
