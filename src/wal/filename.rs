//! Log file naming
//!
//! Every log file's identity is encoded in its name, so a directory
//! listing alone yields the full replay order and the highest LogNumber.
//!
//! ```text
//! {volume}/{wal_dir}/log_{log_num}_{level_num}
//! {volume}/{wal_dir}/.temp.log_{log_num}_{level_num}
//! ```

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::env::FileProvider;
use crate::error::{Result, WalError};

/// Monotonic log file ordinal; never reused
pub type LogNumber = u64;

/// Level of an ordinary log file
pub const LEVEL_LOG: u32 = 0;

/// Level of a checkpoint log (first record is a directory snapshot)
pub const LEVEL_CHECKPOINT: u32 = 1;

const LOG_PREFIX: &str = "log_";
const TEMP_PREFIX: &str = ".temp.";

/// Whether a file is complete or still being written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogFileStage {
    /// Checkpoint under construction; garbage if found at startup
    Temporary,
    Normal,
}

/// Identity of one on-disk log file
///
/// Equality and ordering only consider `(log_num, level_num)`.
#[derive(Debug, Clone)]
pub struct LogFilename {
    /// The WAL directory on the volume holding this file
    pub parent_path: PathBuf,
    pub log_num: LogNumber,
    pub level_num: u32,
    pub stage: LogFileStage,
}

/// Log files ordered by LogNumber ascending
pub type LogFilenameSet = BTreeSet<LogFilename>;

impl LogFilename {
    pub fn new(
        parent_path: impl Into<PathBuf>,
        log_num: LogNumber,
        level_num: u32,
        stage: LogFileStage,
    ) -> Self {
        Self {
            parent_path: parent_path.into(),
            log_num,
            level_num,
            stage,
        }
    }

    /// Parse a file name found in `parent`
    ///
    /// "log_12_0" → Some(Normal 12/0), ".temp.log_13_1" → Some(Temporary 13/1)
    pub fn parse(parent: &Path, name: &str) -> Option<Self> {
        let (stage, rest) = match name.strip_prefix(TEMP_PREFIX) {
            Some(rest) => (LogFileStage::Temporary, rest),
            None => (LogFileStage::Normal, name),
        };
        let rest = rest.strip_prefix(LOG_PREFIX)?;
        let (num, level) = rest.split_once('_')?;
        let log_num = num.parse().ok()?;
        let level_num = level.parse().ok()?;
        Some(Self::new(parent, log_num, level_num, stage))
    }

    /// File name at the given stage
    pub fn filename(&self, stage: LogFileStage) -> String {
        let base = format!("{}{}_{}", LOG_PREFIX, self.log_num, self.level_num);
        match stage {
            LogFileStage::Temporary => format!("{}{}", TEMP_PREFIX, base),
            LogFileStage::Normal => base,
        }
    }

    /// Full path at the given stage
    pub fn fullname(&self, stage: LogFileStage) -> PathBuf {
        self.parent_path.join(self.filename(stage))
    }

    /// Full path at this file's own stage
    pub fn path(&self) -> PathBuf {
        self.fullname(self.stage)
    }

    pub fn is_checkpoint(&self) -> bool {
        self.level_num >= LEVEL_CHECKPOINT
    }

    /// Same identity, moved to another stage
    pub fn with_stage(&self, stage: LogFileStage) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }
}

impl PartialEq for LogFilename {
    fn eq(&self, other: &Self) -> bool {
        self.log_num == other.log_num && self.level_num == other.level_num
    }
}

impl Eq for LogFilename {}

impl PartialOrd for LogFilename {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogFilename {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.log_num, self.level_num).cmp(&(other.log_num, other.level_num))
    }
}

/// Collect every log file (any stage) under each volume's WAL directory
///
/// Missing directories count as empty. Unrelated files are ignored.
pub fn scan_log_files(
    provider: &dyn FileProvider,
    volumes: &[PathBuf],
    wal_dir_name: &str,
) -> Result<Vec<LogFilename>> {
    let mut found = Vec::new();
    for volume in volumes {
        let dir = volume.join(wal_dir_name);
        let names = match provider.list_dir(&dir) {
            Ok(names) => names,
            Err(WalError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        for name in names {
            match LogFilename::parse(&dir, &name) {
                Some(log) => found.push(log),
                None => tracing::debug!(dir = %dir.display(), %name, "ignoring non-log file"),
            }
        }
    }
    found.sort();
    Ok(found)
}
