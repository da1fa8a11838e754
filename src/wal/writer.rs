//! Log Writer
//!
//! Appends framed records to one log file.

use std::io::{BufWriter, Write};

use crate::config::WalSyncStrategy;
use crate::env::{FileProvider, WritableFile};
use crate::error::{Result, WalError};

use super::entry::{frame, MAX_RECORD_SIZE};
use super::LogFilename;

/// Writes records to a single log file
///
/// With `manual_flush` the writer only buffers; the owner decides when to
/// `flush`/`sync`. Otherwise every record is handed to the OS immediately
/// and fsynced according to the sync strategy.
pub struct LogWriter {
    filename: LogFilename,

    /// Dropped (with its buffer) after a failed write; the file tail is
    /// then unknown and nothing more may reach it
    file: Option<BufWriter<Box<dyn WritableFile>>>,
    sync_strategy: WalSyncStrategy,
    manual_flush: bool,

    /// Bytes appended so far (header + payload of every record)
    written_bytes: u64,
    records: u64,

    /// Records appended since the last fsync
    unsynced: usize,
}

impl LogWriter {
    /// Create the file described by `filename` at its stage
    pub fn create(
        provider: &dyn FileProvider,
        filename: LogFilename,
        sync_strategy: WalSyncStrategy,
        manual_flush: bool,
    ) -> Result<Self> {
        let file = provider.create_file(&filename.path())?;
        Ok(Self {
            filename,
            file: Some(BufWriter::new(file)),
            sync_strategy,
            manual_flush,
            written_bytes: 0,
            records: 0,
            unsynced: 0,
        })
    }

    /// Append one payload as a framed record
    ///
    /// Returns the offset the record starts at.
    pub fn add_record(&mut self, payload: &[u8]) -> Result<u64> {
        if payload.is_empty() {
            return Err(WalError::WalWrite("refusing to append an empty record".to_string()));
        }
        if payload.len() > MAX_RECORD_SIZE {
            return Err(WalError::WalWrite(format!(
                "record of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_RECORD_SIZE
            )));
        }

        let bytes = frame(payload);
        let offset = self.written_bytes;

        if let Err(e) = self.write_through(&bytes) {
            self.poison();
            tracing::error!(
                file = %self.filename.path().display(),
                offset,
                error = %e,
                "log append failed"
            );
            return Err(e);
        }

        self.written_bytes += bytes.len() as u64;
        self.records += 1;
        Ok(offset)
    }

    fn write_through(&mut self, bytes: &[u8]) -> Result<()> {
        let manual_flush = self.manual_flush;
        let file = self.file_mut()?;
        file.write_all(bytes)?;
        if manual_flush {
            return Ok(());
        }

        file.flush()?;
        self.unsynced += 1;
        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
            WalSyncStrategy::Manual => false,
        };
        if due {
            self.file_mut()?.get_mut().sync()?;
            self.unsynced = 0;
        }
        Ok(())
    }

    fn file_mut(&mut self) -> Result<&mut BufWriter<Box<dyn WritableFile>>> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(WalError::WalWrite(format!(
                "{} is unusable after an earlier write failure",
                self.filename.path().display()
            ))),
        }
    }

    /// Drop the handle without flushing what is still buffered
    fn poison(&mut self) {
        if let Some(file) = self.file.take() {
            let (_inner, _unflushed) = file.into_parts();
        }
    }

    /// Hand buffered records to the OS
    pub fn flush(&mut self) -> Result<()> {
        self.file_mut()?.flush()?;
        Ok(())
    }

    /// Flush and fsync
    pub fn sync(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.flush()?;
        file.get_mut().sync()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Sync and release the file
    pub fn close(mut self) -> Result<()> {
        if self.is_failed() {
            return Ok(());
        }
        self.sync()
    }

    pub fn filename(&self) -> &LogFilename {
        &self.filename
    }

    /// Update the identity after the owner renamed the file
    pub(crate) fn set_filename(&mut self, filename: LogFilename) {
        self.filename = filename;
    }

    /// Switch between owner-driven and per-record flushing
    pub(crate) fn set_manual_flush(&mut self, manual_flush: bool) {
        self.manual_flush = manual_flush;
    }

    pub fn written_bytes(&self) -> u64 {
        self.written_bytes
    }

    pub fn record_count(&self) -> u64 {
        self.records
    }

    pub fn is_failed(&self) -> bool {
        self.file.is_none()
    }
}
