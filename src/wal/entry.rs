//! WAL Record definitions
//!
//! Defines the payload carried by one log record and its on-disk framing.

use serde::{Deserialize, Serialize};

use crate::edit::{PageEntriesEdit, PageVersion};
use crate::error::{Result, WalError};

use super::LogNumber;

/// Header size: CRC (4) + Length (4)
pub const HEADER_SIZE: usize = 8;

/// Largest payload a single record may carry (64 MB)
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// What a record represents during replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// An incremental batch passed to `apply`
    Edit,

    /// A consolidated directory snapshot. Logs numbered at or below
    /// `base_log_num` are fully contained in it.
    Snapshot { base_log_num: LogNumber },
}

/// A single record in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    pub kind: RecordKind,

    /// Absent for edits that take no part in version ordering
    pub version: Option<PageVersion>,

    pub edit: PageEntriesEdit,
}

impl WalRecord {
    /// An incremental edit record
    pub fn new(edit: PageEntriesEdit, version: Option<PageVersion>) -> Self {
        Self {
            kind: RecordKind::Edit,
            version,
            edit,
        }
    }

    /// A consolidated snapshot record
    pub fn snapshot(edit: PageEntriesEdit, base_log_num: LogNumber) -> Self {
        Self {
            kind: RecordKind::Snapshot { base_log_num },
            version: None,
            edit,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self.kind, RecordKind::Snapshot { .. })
    }

    /// Encode just the payload (no framing)
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        encode_record(self.kind, self.version, &self.edit)
    }

    /// Decode a payload whose checksum has already been verified
    pub fn decode_payload(payload: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(payload)?)
    }

    /// Encode the record with its header, ready to append
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(frame(&self.encode_payload()?))
    }
}

/// Borrowing twin of `WalRecord`; serializes to identical bytes
#[derive(Serialize)]
struct WalRecordRef<'a> {
    kind: RecordKind,
    version: Option<PageVersion>,
    edit: &'a PageEntriesEdit,
}

/// Encode a record payload without taking ownership of the edit
pub(crate) fn encode_record(
    kind: RecordKind,
    version: Option<PageVersion>,
    edit: &PageEntriesEdit,
) -> Result<Vec<u8>> {
    let payload = bincode::serialize(&WalRecordRef { kind, version, edit })?;
    if payload.len() > MAX_RECORD_SIZE {
        return Err(WalError::WalWrite(format!(
            "record of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_RECORD_SIZE
        )));
    }
    Ok(payload)
}

/// Checksum over the length field and the payload
pub fn record_crc(len_bytes: &[u8; 4], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(len_bytes);
    hasher.update(payload);
    hasher.finalize()
}

/// Frame a payload: CRC (4, LE) | Length (4, LE) | payload
///
/// Callers keep `payload` within `MAX_RECORD_SIZE`.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let len_bytes = (payload.len() as u32).to_le_bytes();
    let crc = record_crc(&len_bytes, payload);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&len_bytes);
    buf.extend_from_slice(payload);
    buf
}
