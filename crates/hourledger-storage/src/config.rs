use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the ledger store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the WAL and snapshot; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    /// WAL file name inside `data_dir`
    pub wal_file: String,
    /// Snapshot file name inside `data_dir`
    pub snapshot_file: String,
    /// How long a writer waits for the store lock before reporting a conflict
    pub lock_timeout_ms: u64,
    /// `fsync` the WAL on every commit
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            wal_file: "hourledger.wal".to_string(),
            snapshot_file: "snapshot.bin".to_string(),
            lock_timeout_ms: 2_000,
            sync_writes: true,
        }
    }
}

impl StorageConfig {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: Some(dir.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn wal_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join(&self.wal_file))
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join(&self.snapshot_file))
    }
}
