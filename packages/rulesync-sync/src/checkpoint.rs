use chrono::Utc;
use parking_lot::Mutex;
use rulesync_storage::EpochMillis;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Last-indexed-at timestamp per index
pub trait CheckpointStore: Send + Sync {
    /// `None` when the index was never synchronized
    fn load(&self, index: &str) -> Result<Option<EpochMillis>>;

    fn save(&self, index: &str, checkpoint: EpochMillis) -> Result<()>;
}

impl<C: CheckpointStore + ?Sized> CheckpointStore for Arc<C> {
    fn load(&self, index: &str) -> Result<Option<EpochMillis>> {
        (**self).load(index)
    }

    fn save(&self, index: &str, checkpoint: EpochMillis) -> Result<()> {
        (**self).save(index, checkpoint)
    }
}

/// Process-local checkpoints (tests, one-shot runs)
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<Mutex<HashMap<String, EpochMillis>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self, index: &str) -> Result<Option<EpochMillis>> {
        Ok(self.checkpoints.lock().get(index).copied())
    }

    fn save(&self, index: &str, checkpoint: EpochMillis) -> Result<()> {
        self.checkpoints.lock().insert(index.to_string(), checkpoint);
        Ok(())
    }
}

/// One entry of the checkpoint file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCheckpoint {
    pub index: String,
    pub updated_at_ms: EpochMillis,
    pub saved_at_unix_ms: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    checkpoints: BTreeMap<String, PersistedCheckpoint>,
}

/// JSON checkpoint file, rewritten atomically (temp file + rename)
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
    // Serializes read-modify-write of the file within this process
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<CheckpointFile> {
        if !self.path.exists() {
            return Ok(CheckpointFile::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| {
            SyncError::checkpoint(format!(
                "corrupt checkpoint file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_file(&self, file: &CheckpointFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(file)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, index: &str) -> Result<Option<EpochMillis>> {
        Ok(self
            .read_file()?
            .checkpoints
            .get(index)
            .map(|c| c.updated_at_ms))
    }

    fn save(&self, index: &str, checkpoint: EpochMillis) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = self.read_file()?;
        file.checkpoints.insert(
            index.to_string(),
            PersistedCheckpoint {
                index: index.to_string(),
                updated_at_ms: checkpoint,
                saved_at_unix_ms: Utc::now().timestamp_millis(),
            },
        );
        self.write_file(&file)?;
        debug!(
            "Saved checkpoint {} for '{}' to {}",
            checkpoint,
            index,
            self.path.display()
        );
        Ok(())
    }
}
