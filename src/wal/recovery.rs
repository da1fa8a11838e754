//! WAL Recovery
//!
//! Recovery modes and the policy table the replay driver consults.

use std::fmt;
use std::str::FromStr;

use crate::error::WalError;

use super::LogNumber;

/// How much corruption replay tolerates
///
/// A mode is picked once when the store is created and applied uniformly
/// to every log file of the replay pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RecoveryMode {
    /// Tolerate an incomplete last record in any log (a crash while
    /// appending it) and trailing zeros left by preallocation. Any other
    /// corruption refuses recovery.
    ///
    /// Updates that were applied stay applied across a crash, as long as
    /// appends were durable.
    #[default]
    TolerateCorruptedTailRecords = 0x00,

    /// Recover from a clean shutdown: no corruption or torn tail expected
    /// anywhere. Suited to tests and to deployments that need the strongest
    /// consistency guarantee.
    AbsoluteConsistency = 0x01,

    /// Replay up to the first corrupted or incomplete record and stop there, discarding
    /// everything after it including later log files. Suited to disks with
    /// volatile write caches where a consistent prefix is the best outcome.
    PointInTimeRecovery = 0x02,

    /// Skip every corrupted record and keep going, salvaging as much as
    /// possible. Last-ditch recovery.
    SkipAnyCorruptedRecords = 0x03,
}

/// Anomaly classes the reader reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// Final record of a file cut short
    IncompleteTail,
    /// Trailing zeros
    ZeroPadding,
    /// A damaged record whose extent is known
    CorruptedRecord,
    /// A damaged record whose extent is unknown
    CorruptedUnbounded,
}

/// What the replay driver does about an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayAction {
    /// Treat the anomaly as the end of this file and continue with the next
    EndFile,
    /// Drop the damaged record and continue in the same file
    SkipRecord,
    /// End the whole replay; later files are discarded
    Stop,
    /// Abort recovery with a corruption error
    Fail,
}

impl RecoveryMode {
    /// The policy table
    ///
    /// | Mode        | IncompleteTail | ZeroPadding | CorruptedRecord | CorruptedUnbounded |
    /// |-------------|----------------|-------------|-----------------|--------------------|
    /// | Tolerate    | EndFile        | EndFile     | Fail            | Fail               |
    /// | Absolute    | Fail           | Fail        | Fail            | Fail               |
    /// | PointInTime | Stop           | Stop        | Stop            | Stop               |
    /// | SkipAny     | EndFile        | EndFile     | SkipRecord      | EndFile            |
    ///
    /// Point-in-time recovery never replays past a hole: an incomplete tail
    /// may sit in front of later logs that reached disk first. On the last
    /// file `Stop` ends replay exactly where `EndFile` would.
    pub fn action_for(self, anomaly: Anomaly) -> ReplayAction {
        use Anomaly::*;
        use RecoveryMode::*;
        use ReplayAction::*;

        match (self, anomaly) {
            (AbsoluteConsistency, _) => Fail,

            (TolerateCorruptedTailRecords, IncompleteTail | ZeroPadding) => EndFile,
            (TolerateCorruptedTailRecords, CorruptedRecord | CorruptedUnbounded) => Fail,

            (PointInTimeRecovery, _) => Stop,

            (SkipAnyCorruptedRecords, CorruptedRecord) => SkipRecord,
            (SkipAnyCorruptedRecords, _) => EndFile,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(RecoveryMode::TolerateCorruptedTailRecords),
            0x01 => Some(RecoveryMode::AbsoluteConsistency),
            0x02 => Some(RecoveryMode::PointInTimeRecovery),
            0x03 => Some(RecoveryMode::SkipAnyCorruptedRecords),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecoveryMode::TolerateCorruptedTailRecords => "tolerate-corrupted-tail-records",
            RecoveryMode::AbsoluteConsistency => "absolute-consistency",
            RecoveryMode::PointInTimeRecovery => "point-in-time",
            RecoveryMode::SkipAnyCorruptedRecords => "skip-any-corrupted-records",
        }
    }
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecoveryMode {
    type Err = WalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s {
            "tolerate-corrupted-tail-records" | "tolerate" => RecoveryMode::TolerateCorruptedTailRecords,
            "absolute-consistency" | "absolute" => RecoveryMode::AbsoluteConsistency,
            "point-in-time" | "pitr" => RecoveryMode::PointInTimeRecovery,
            "skip-any-corrupted-records" | "skip" => RecoveryMode::SkipAnyCorruptedRecords,
            other => match other.parse::<u8>().ok().and_then(RecoveryMode::from_u8) {
                Some(mode) => mode,
                None => {
                    return Err(WalError::Config(format!("unknown recovery mode {:?}", s)));
                }
            },
        };
        Ok(mode)
    }
}

/// A position inside the replayed log sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPosition {
    pub log_num: LogNumber,
    pub level_num: u32,
    pub offset: u64,
}

/// Summary of one replay pass
#[derive(Debug, Default, Clone)]
pub struct ReplayReport {
    /// Log files opened for replay
    pub files_read: u64,

    /// Log files skipped because a checkpoint subsumes them
    pub files_skipped: u64,

    /// Log files never read because replay stopped early
    pub files_discarded: u64,

    /// Records handed to the caller
    pub records_recovered: u64,

    /// Corrupted records dropped
    pub records_skipped: u64,

    /// Files whose tail was cut off (torn record or zero padding)
    pub truncated_tails: u64,

    /// Where point-in-time replay stopped, if it did
    pub stopped_at: Option<ReplayPosition>,

    /// Position of the last record handed out
    pub last_position: Option<ReplayPosition>,
}

impl ReplayReport {
    /// True if replay saw no anomaly at all
    pub fn is_clean(&self) -> bool {
        self.records_skipped == 0 && self.truncated_tails == 0 && self.stopped_at.is_none()
    }
}
