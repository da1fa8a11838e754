//! Path Delegator
//!
//! Decides which volume receives each new log file and remembers which
//! volume every live log file occupies.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::env::FileProvider;
use crate::error::{Result, WalError};
use crate::wal::{scan_log_files, LogFileStage, LogFilename, LogFilenameSet, LogNumber};

/// Volume selection and bookkeeping for WAL files
pub trait PathDelegator: Send + Sync {
    /// Root paths of every volume that may hold WAL files
    fn list_paths(&self) -> Vec<PathBuf>;

    /// Pick the volume for the next log file
    ///
    /// `cursor` is the store's volume-selection cursor; it advances on
    /// every new log so the default spreads files round robin.
    fn choose_path(&self, cursor: usize) -> Result<PathBuf> {
        let paths = self.list_paths();
        if paths.is_empty() {
            return Err(WalError::ExhaustedVolumes(
                "delegator reports no volumes".to_string(),
            ));
        }
        Ok(paths[cursor % paths.len()].clone())
    }

    /// Record that `log` now occupies its volume
    fn add_path(&self, log: &LogFilename);

    /// Forget `log` (it has been removed)
    fn remove_path(&self, log: &LogFilename);

    /// Every log file of any stage across all volumes, sorted
    ///
    /// `WALStore::create` enumerates through this, so temporary files left
    /// by an interrupted checkpoint must be included.
    fn list_all_log_files(
        &self,
        provider: &dyn FileProvider,
        wal_dir_name: &str,
    ) -> Result<Vec<LogFilename>> {
        scan_log_files(provider, &self.list_paths(), wal_dir_name)
    }

    /// Every completed log file across all volumes, ordered by LogNumber
    fn list_all_existing_logs(
        &self,
        provider: &dyn FileProvider,
        wal_dir_name: &str,
    ) -> Result<LogFilenameSet> {
        let all = self.list_all_log_files(provider, wal_dir_name)?;
        Ok(all
            .into_iter()
            .filter(|f| f.stage == LogFileStage::Normal)
            .collect())
    }
}

/// Round-robin delegator over a fixed list of volumes
///
/// ## Concurrency:
/// - `usage`: Protected by RwLock (bookkeeping only, never held across I/O)
pub struct MultiVolumeDelegator {
    paths: Vec<PathBuf>,

    /// (log_num, level_num) → volume root
    usage: RwLock<BTreeMap<(LogNumber, u32), PathBuf>>,
}

impl MultiVolumeDelegator {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            usage: RwLock::new(BTreeMap::new()),
        }
    }

    /// Convenience for the common single-volume deployment
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self::new(vec![path.into()])
    }

    /// Volume currently recorded for `log`, if any
    pub fn volume_of(&self, log: &LogFilename) -> Option<PathBuf> {
        self.usage.read().get(&(log.log_num, log.level_num)).cloned()
    }

    /// Number of live log files recorded on `volume`
    pub fn files_on(&self, volume: &Path) -> usize {
        self.usage.read().values().filter(|v| v.as_path() == volume).count()
    }

    /// Number of live log files across all volumes
    pub fn tracked_files(&self) -> usize {
        self.usage.read().len()
    }

    /// The volume root a log's parent directory belongs to
    fn volume_for(&self, log: &LogFilename) -> PathBuf {
        self.paths
            .iter()
            .find(|p| log.parent_path.starts_with(p))
            .cloned()
            .unwrap_or_else(|| log.parent_path.clone())
    }
}

impl PathDelegator for MultiVolumeDelegator {
    fn list_paths(&self) -> Vec<PathBuf> {
        self.paths.clone()
    }

    fn add_path(&self, log: &LogFilename) {
        let volume = self.volume_for(log);
        self.usage.write().insert((log.log_num, log.level_num), volume);
    }

    fn remove_path(&self, log: &LogFilename) {
        self.usage.write().remove(&(log.log_num, log.level_num));
    }
}
