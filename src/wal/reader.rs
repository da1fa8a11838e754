//! Log Reader
//!
//! Decodes the records of one log file. The reader never decides what an
//! anomaly means; it classifies it and leaves the verdict to the recovery
//! mode applied by `WALStoreReader`.

use std::io::Read;

use bytes::Bytes;

use crate::env::FileProvider;
use crate::error::Result;

use super::entry::{record_crc, HEADER_SIZE, MAX_RECORD_SIZE};
use super::{LogFilename, WalRecord};

/// Outcome of decoding at the current position
#[derive(Debug)]
pub enum ReadEvent {
    /// A valid record starting at `offset`
    Record { offset: u64, record: WalRecord },

    /// Clean end of file
    Eof,

    /// The final record is cut short (crash mid-append)
    TruncatedTail { offset: u64, reason: String },

    /// Only zero bytes remain (preallocated space)
    ZeroPadding { offset: u64 },

    /// A damaged record. If its length was usable the reader has already
    /// moved past it (`skippable`); otherwise the rest of the file is lost.
    Corrupted {
        offset: u64,
        skippable: bool,
        reason: String,
    },
}

/// Reads records from a single log file
pub struct LogReader {
    filename: LogFilename,
    data: Bytes,
    pos: usize,
}

impl LogReader {
    /// Load a log file through the provider
    pub fn open(provider: &dyn FileProvider, filename: LogFilename) -> Result<Self> {
        let mut file = provider.open_file(&filename.path())?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Self::from_bytes(filename, Bytes::from(buf)))
    }

    /// Read from an in-memory image of a log file
    pub fn from_bytes(filename: LogFilename, data: Bytes) -> Self {
        Self {
            filename,
            data,
            pos: 0,
        }
    }

    pub fn filename(&self) -> &LogFilename {
        &self.filename
    }

    /// Offset of the next undecoded byte
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Decode the next record or classify why there is none
    pub fn next_event(&mut self) -> ReadEvent {
        let offset = self.pos as u64;
        let remaining = &self.data[self.pos..];

        if remaining.is_empty() {
            return ReadEvent::Eof;
        }

        if remaining.len() < HEADER_SIZE {
            let event = if is_all_zero(remaining) {
                ReadEvent::ZeroPadding { offset }
            } else {
                ReadEvent::TruncatedTail {
                    offset,
                    reason: format!("{} byte partial header", remaining.len()),
                }
            };
            self.pos = self.data.len();
            return event;
        }

        let crc = u32::from_le_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]);
        let len_bytes = [remaining[4], remaining[5], remaining[6], remaining[7]];
        let len = u32::from_le_bytes(len_bytes) as usize;

        if crc == 0 && len == 0 {
            self.pos = self.data.len();
            if is_all_zero(remaining) {
                return ReadEvent::ZeroPadding { offset };
            }
            return ReadEvent::Corrupted {
                offset,
                skippable: false,
                reason: "zeroed header followed by data".to_string(),
            };
        }

        if len == 0 || len > MAX_RECORD_SIZE {
            self.pos = self.data.len();
            return ReadEvent::Corrupted {
                offset,
                skippable: false,
                reason: format!("implausible record length {}", len),
            };
        }

        let body = &remaining[HEADER_SIZE..];
        if body.len() < len {
            self.pos = self.data.len();
            return ReadEvent::TruncatedTail {
                offset,
                reason: format!("record needs {} bytes, {} left", len, body.len()),
            };
        }

        let payload = &body[..len];
        self.pos += HEADER_SIZE + len;

        let actual = record_crc(&len_bytes, payload);
        if actual != crc {
            return ReadEvent::Corrupted {
                offset,
                skippable: true,
                reason: format!("checksum mismatch: stored {:#010x}, computed {:#010x}", crc, actual),
            };
        }

        match WalRecord::decode_payload(payload) {
            Ok(record) => ReadEvent::Record { offset, record },
            Err(e) => ReadEvent::Corrupted {
                offset,
                skippable: true,
                reason: format!("undecodable payload: {}", e),
            },
        }
    }

    /// Decode the first record, if the file starts with a valid one
    pub fn first_record(&mut self) -> Option<WalRecord> {
        self.pos = 0;
        match self.next_event() {
            ReadEvent::Record { record, .. } => Some(record),
            _ => None,
        }
    }
}

fn is_all_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}
