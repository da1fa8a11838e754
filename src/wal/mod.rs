//! Write-Ahead Log (WAL) Module
//!
//! Durably records every page directory edit before it counts as committed.
//!
//! ## Responsibilities
//! - Append edit batches to the current log file
//! - Roll over to numbered log files; never reuse a number
//! - Fold accumulated logs into a checkpoint and retire them
//! - Replay logs on restart under a configurable recovery mode
//!
//! ## Record Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ CRC (4) │ Len (4) │ Payload (Len)   │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ CRC (4) │ Len (4) │ Payload (Len)   │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! CRC32 covers the length field and the payload. The payload is a
//! bincode-encoded `WalRecord`. A checkpoint log (`log_N_1`) starts with a
//! `Snapshot` record.

mod entry;
mod filename;
mod reader;
mod recovery;
mod store;
mod store_reader;
mod writer;

pub use entry::{frame, record_crc, RecordKind, WalRecord, HEADER_SIZE, MAX_RECORD_SIZE};
pub use filename::{
    scan_log_files, LogFileStage, LogFilename, LogFilenameSet, LogNumber, LEVEL_CHECKPOINT,
    LEVEL_LOG,
};
pub use reader::{LogReader, ReadEvent};
pub use recovery::{Anomaly, RecoveryMode, ReplayAction, ReplayPosition, ReplayReport};
pub use store::{FilesSnapshot, WALStore};
pub use store_reader::WALStoreReader;
pub use writer::LogWriter;
