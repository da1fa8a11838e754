//! Configuration for the WAL store
//!
//! Centralized configuration with sensible defaults.

use crate::error::{Result, WalError};
use crate::wal::RecoveryMode;

/// Default number of persisted log files tolerated before a snapshot is due
pub const DEFAULT_SNAPSHOT_THRESHOLD: usize = 4;

/// Default size at which the current log file is rolled over (16 MB)
pub const DEFAULT_MAX_LOG_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Main configuration for a WAL store instance
#[derive(Debug, Clone)]
pub struct WalConfig {
    // -------------------------------------------------------------------------
    // Layout
    // -------------------------------------------------------------------------
    /// Name of the WAL subdirectory created under every volume
    /// Internal structure:
    ///   {volume}/
    ///     └── wal/
    ///           ├── log_1_0
    ///           ├── log_2_1        (checkpoint: starts with a snapshot)
    ///           └── .temp.log_3_1  (checkpoint being written)
    pub wal_dir_name: String,

    // -------------------------------------------------------------------------
    // Write Path
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the current log
    pub sync_strategy: WalSyncStrategy,

    /// Roll over to a new log file once the current one reaches this size
    pub max_log_file_size: u64,

    // -------------------------------------------------------------------------
    // Compaction
    // -------------------------------------------------------------------------
    /// `FilesSnapshot::need_save` fires when more than this many
    /// persisted log files have accumulated
    pub snapshot_threshold: usize,

    // -------------------------------------------------------------------------
    // Recovery
    // -------------------------------------------------------------------------
    /// Corruption tolerance applied while replaying existing logs
    pub recovery_mode: RecoveryMode,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every record (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNEntries { count: usize },

    /// Only flush to the OS per record; fsync when the log is retired,
    /// on checkpoints, or on explicit `sync`
    Manual,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            wal_dir_name: "wal".to_string(),
            sync_strategy: WalSyncStrategy::EveryWrite,
            max_log_file_size: DEFAULT_MAX_LOG_FILE_SIZE,
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
            recovery_mode: RecoveryMode::default(),
        }
    }
}

impl WalConfig {
    /// Create a new config builder
    pub fn builder() -> WalConfigBuilder {
        WalConfigBuilder::default()
    }

    /// Reject values the store cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.wal_dir_name.is_empty()
            || self.wal_dir_name.contains(std::path::MAIN_SEPARATOR)
        {
            return Err(WalError::Config(format!(
                "invalid WAL directory name {:?}",
                self.wal_dir_name
            )));
        }
        if self.max_log_file_size == 0 {
            return Err(WalError::Config(
                "max_log_file_size must be non-zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(WalError::Config(
                "EveryNEntries requires a non-zero count".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for WalConfig
#[derive(Default)]
pub struct WalConfigBuilder {
    config: WalConfig,
}

impl WalConfigBuilder {
    /// Set the WAL subdirectory name
    pub fn wal_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.wal_dir_name = name.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the rollover size for log files (in bytes)
    pub fn max_log_file_size(mut self, size: u64) -> Self {
        self.config.max_log_file_size = size;
        self
    }

    /// Set the persisted-file count above which a snapshot is due
    pub fn snapshot_threshold(mut self, count: usize) -> Self {
        self.config.snapshot_threshold = count;
        self
    }

    /// Set the recovery mode used when replaying existing logs
    pub fn recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.config.recovery_mode = mode;
        self
    }

    pub fn build(self) -> WalConfig {
        self.config
    }
}
