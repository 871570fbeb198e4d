//! rulesync configuration
//!
//! Versioned YAML file, every field optional:
//!
//! ```yaml
//! version: 1
//! database:
//!   path: data/rules.db
//!   page_size: 500
//! index:
//!   dir: data/index
//!   writer_heap_bytes: 50000000
//! sync:
//!   batch_size: 500
//!   boundary: inclusive
//!   interval_secs: 60
//!   checkpoint_path: data/checkpoint.json
//! ```

pub mod error;

pub use error::{ConfigError, ConfigResult};

use rulesync_index::{DEFAULT_WRITER_HEAP_BYTES, MIN_WRITER_HEAP_BYTES};
use rulesync_storage::infrastructure::sqlite::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ports::Boundary;
use crate::synchronizer::{SyncOptions, DEFAULT_BATCH_SIZE};

pub const CONFIG_VERSION: u32 = 1;

const MAX_PAGE_SIZE: usize = 100_000;
const MAX_BATCH_SIZE: usize = 100_000;
const MAX_WRITER_HEAP_BYTES: usize = 4_000_000_000;
const MAX_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesyncConfig {
    /// Schema version (always 1)
    pub version: u32,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Rows per cursor page
    pub page_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/rules.db"),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub dir: PathBuf,
    pub writer_heap_bytes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/index"),
            writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Upserts per flush
    pub batch_size: usize,
    pub boundary: Boundary,
    /// Seconds between passes in watch mode
    pub interval_secs: u64,
    pub checkpoint_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            boundary: Boundary::Inclusive,
            interval_secs: 60,
            checkpoint_path: PathBuf::from("data/checkpoint.json"),
        }
    }
}

impl Default for RulesyncConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            database: DatabaseConfig::default(),
            index: IndexConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl RulesyncConfig {
    /// Load `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Ok(Self::from_yaml(path)?),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;

        // Version check before the typed parse, for a precise error
        let version = match value.get("version") {
            None | Some(serde_yaml::Value::Null) => return Err(ConfigError::MissingVersion),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| ConfigError::validation(format!("'version' must be an integer, got {:?}", v)))?,
        };
        if version != u64::from(CONFIG_VERSION) {
            return Err(ConfigError::UnsupportedVersion {
                found: u32::try_from(version).unwrap_or(u32::MAX),
                supported: vec![CONFIG_VERSION],
            });
        }

        let config: Self = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.database.page_size) {
            return Err(ConfigError::range_with_hint(
                "database.page_size",
                self.database.page_size,
                1,
                MAX_PAGE_SIZE,
                "Rows fetched per cursor page; memory grows with it",
            ));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.sync.batch_size) {
            return Err(ConfigError::range_with_hint(
                "sync.batch_size",
                self.sync.batch_size,
                1,
                MAX_BATCH_SIZE,
                "Documents upserted between two index commits",
            ));
        }
        if !(MIN_WRITER_HEAP_BYTES..=MAX_WRITER_HEAP_BYTES).contains(&self.index.writer_heap_bytes)
        {
            return Err(ConfigError::range_with_hint(
                "index.writer_heap_bytes",
                self.index.writer_heap_bytes,
                MIN_WRITER_HEAP_BYTES,
                MAX_WRITER_HEAP_BYTES,
                "Tantivy needs at least 15MB of writer heap",
            ));
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.sync.interval_secs) {
            return Err(ConfigError::range_with_hint(
                "sync.interval_secs",
                self.sync.interval_secs,
                1,
                MAX_INTERVAL_SECS,
                "Watch interval between one second and one day",
            ));
        }
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.sync.batch_size,
            boundary: self.sync.boundary,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }
}
