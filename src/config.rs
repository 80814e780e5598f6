//! Configuration for OffsetDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{OffsetDbError, Result};

/// Main configuration for an OffsetDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── records.jsonl    (append-only record log)
    ///     └── records.idx      (position index snapshot)
    pub data_dir: PathBuf,

    /// Initial number of bytes over-read when fetching a record.
    /// Reads grow past this when a record is longer.
    pub read_chunk_size: usize,

    /// How often to fsync the record log
    pub sync_strategy: LogSyncStrategy,

    // -------------------------------------------------------------------------
    // Snapshot Configuration
    // -------------------------------------------------------------------------
    /// How often the position index is persisted to the snapshot file
    pub snapshot_policy: SnapshotPolicy,

    // -------------------------------------------------------------------------
    // Bootstrap Configuration
    // -------------------------------------------------------------------------
    /// Number of demo records to bulk-load when a brand-new log is created
    pub seed_on_create: Option<u64>,
}

/// Record log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N appends (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Snapshot persistence policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Rewrite the snapshot after every insert/update
    EveryWrite,

    /// Rewrite the snapshot once N writes have accumulated.
    /// Writes not yet covered are replayed from the log tail on open.
    EveryNWrites { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./offsetdb_data"),
            read_chunk_size: 4096,
            sync_strategy: LogSyncStrategy::EveryNEntries { count: 100 },
            snapshot_policy: SnapshotPolicy::EveryNWrites { count: 100 },
            seed_on_create: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(OffsetDbError::Config(
                "read_chunk_size must be greater than zero".to_string(),
            ));
        }
        if let LogSyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(OffsetDbError::Config(
                "sync_strategy entry count must be greater than zero".to_string(),
            ));
        }
        if let SnapshotPolicy::EveryNWrites { count: 0 } = self.snapshot_policy {
            return Err(OffsetDbError::Config(
                "snapshot_policy write count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the initial read chunk size (in bytes)
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: LogSyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the snapshot policy
    pub fn snapshot_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.config.snapshot_policy = policy;
        self
    }

    /// Bulk-load `count` demo records when creating a fresh log
    pub fn seed_on_create(mut self, count: u64) -> Self {
        self.config.seed_on_create = Some(count);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
