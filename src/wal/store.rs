//! WAL Store
//!
//! Owns the current log file, the log numbering and the checkpoint
//! protocol that bounds how many log files accumulate.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::WalConfig;
use crate::edit::{PageEntriesEdit, PageVersion};
use crate::env::{FileProvider, PathDelegator, WriteLimiter};
use crate::error::{Result, WalError};

use super::entry::{encode_record, HEADER_SIZE};
use super::filename::{LEVEL_CHECKPOINT, LEVEL_LOG};
use super::{
    LogFileStage, LogFilename, LogFilenameSet, LogNumber, LogWriter, RecordKind, WALStoreReader,
};

/// Point-in-time view of the store's log files
///
/// A copy: it does not follow the store after capture.
#[derive(Debug, Clone)]
pub struct FilesSnapshot {
    /// Log number of the file being appended to at capture
    pub current_writing_log_num: LogNumber,

    /// Bytes already written to that file at capture
    pub current_writing_bytes: u64,

    /// Closed log files at capture
    pub persisted_log_files: LogFilenameSet,

    /// `need_save` fires above this many persisted files
    pub snapshot_threshold: usize,
}

impl FilesSnapshot {
    /// Whether enough log files piled up to be worth a snapshot
    pub fn need_save(&self) -> bool {
        self.persisted_log_files.len() > self.snapshot_threshold
    }
}

/// State guarded by the log-file lock
struct LogFileState {
    log_file: LogWriter,
    last_log_num: LogNumber,

    /// Volume-selection cursor handed to the delegator
    wal_paths_index: usize,

    /// Closed log files still on disk
    persisted: LogFilenameSet,

    /// Set while a checkpoint log number is reserved but not yet current.
    /// Size-based rotation waits so the checkpoint stays the newest log.
    checkpoint_pending: bool,

    /// Number of the newest published checkpoint log, 0 if none
    latest_checkpoint: LogNumber,
}

/// The write-ahead log of one page directory
///
/// ## Concurrency Model
///
/// - `state`: every append, rotation and cutover takes this lock. Record
///   encoding and write-limiter waits happen before it is taken.
/// - `compaction_lock`: serializes `save_snapshot` and `rotate`; never
///   held by `apply`.
///
/// Lock order: `compaction_lock` → `state`.
pub struct WALStore {
    storage_name: String,
    provider: Arc<dyn FileProvider>,
    delegator: Arc<dyn PathDelegator>,
    config: WalConfig,
    state: Mutex<LogFileState>,
    compaction_lock: Mutex<()>,
}

impl WALStore {
    /// Open the WAL of `storage_name`
    ///
    /// On startup:
    /// 1. Create the WAL directory on every volume
    /// 2. Discover existing logs; remove interrupted checkpoints
    /// 3. Open a new current log numbered above everything found
    /// 4. Hand back a reader that replays the existing logs
    pub fn create(
        storage_name: impl Into<String>,
        provider: Arc<dyn FileProvider>,
        delegator: Arc<dyn PathDelegator>,
        config: WalConfig,
    ) -> Result<(WALStore, WALStoreReader)> {
        config.validate()?;
        let storage_name = storage_name.into();

        let volumes = delegator.list_paths();
        if volumes.is_empty() {
            return Err(WalError::ExhaustedVolumes(format!(
                "no volume configured for {}",
                storage_name
            )));
        }
        for volume in &volumes {
            provider.create_dir_all(&volume.join(&config.wal_dir_name))?;
        }

        let found = delegator.list_all_log_files(provider.as_ref(), &config.wal_dir_name)?;
        let latest_checkpoint = found
            .iter()
            .filter(|f| f.stage == LogFileStage::Normal && f.is_checkpoint())
            .map(|f| f.log_num)
            .max()
            .unwrap_or(0);

        // Temporary files still count so their numbers are never reused
        let max_log_num = found.iter().map(|f| f.log_num).max().unwrap_or(0);

        let mut existing = LogFilenameSet::new();
        for file in found {
            match file.stage {
                LogFileStage::Temporary => {
                    tracing::warn!(
                        storage = %storage_name,
                        file = %file.path().display(),
                        "removing interrupted checkpoint"
                    );
                    if let Err(e) = provider.delete_file(&file.path()) {
                        tracing::warn!(
                            storage = %storage_name,
                            file = %file.path().display(),
                            error = %e,
                            "failed to remove interrupted checkpoint"
                        );
                    }
                }
                LogFileStage::Normal => {
                    delegator.add_path(&file);
                    existing.insert(file);
                }
            }
        }

        let volume = delegator.choose_path(0)?;
        let filename = LogFilename::new(
            volume.join(&config.wal_dir_name),
            max_log_num + 1,
            LEVEL_LOG,
            LogFileStage::Normal,
        );
        let log_file = LogWriter::create(provider.as_ref(), filename, config.sync_strategy, false)?;
        delegator.add_path(log_file.filename());

        tracing::info!(
            storage = %storage_name,
            existing_logs = existing.len(),
            max_log_num,
            current = %log_file.filename().path().display(),
            mode = %config.recovery_mode,
            "WAL store opened"
        );

        let reader = WALStoreReader::new(Arc::clone(&provider), existing.clone(), config.recovery_mode);

        let store = WALStore {
            storage_name,
            provider,
            delegator,
            state: Mutex::new(LogFileState {
                log_file,
                last_log_num: max_log_num + 1,
                wal_paths_index: 1,
                persisted: existing,
                checkpoint_pending: false,
                latest_checkpoint,
            }),
            compaction_lock: Mutex::new(()),
            config,
        };

        Ok((store, reader))
    }

    /// Log an edit stamped with `version`
    ///
    /// Every record of `edit` is stamped in place before it is written.
    pub fn apply(
        &self,
        edit: &mut PageEntriesEdit,
        version: PageVersion,
        write_limiter: Option<&dyn WriteLimiter>,
    ) -> Result<()> {
        edit.set_version(version);
        let payload = encode_record(RecordKind::Edit, Some(version), edit)?;
        self.append(&payload, write_limiter)
    }

    /// Log an edit that takes no part in version ordering
    pub fn apply_unversioned(
        &self,
        edit: &PageEntriesEdit,
        write_limiter: Option<&dyn WriteLimiter>,
    ) -> Result<()> {
        let payload = encode_record(RecordKind::Edit, None, edit)?;
        self.append(&payload, write_limiter)
    }

    fn append(&self, payload: &[u8], write_limiter: Option<&dyn WriteLimiter>) -> Result<()> {
        if let Some(limiter) = write_limiter {
            limiter.request((HEADER_SIZE + payload.len()) as u64);
        }

        let mut state = self.state.lock();
        state.log_file.add_record(payload)?;

        if !state.checkpoint_pending
            && state.log_file.written_bytes() >= self.config.max_log_file_size
        {
            // The record is already durable per the sync strategy; a failed
            // rollover only means we keep appending to the current file.
            if let Err(e) = self.roll_log_file(&mut state) {
                tracing::warn!(
                    storage = %self.storage_name,
                    error = %e,
                    "log rollover failed, staying on current log"
                );
            }
        }
        Ok(())
    }

    /// Close the current log and start a new one
    ///
    /// Also the way to resume writing after an append failure.
    pub fn rotate(&self) -> Result<LogNumber> {
        let _compaction = self.compaction_lock.lock();
        let mut state = self.state.lock();
        self.roll_log_file(&mut state)?;
        Ok(state.log_file.filename().log_num)
    }

    /// Called with the state lock held
    fn roll_log_file(&self, state: &mut LogFileState) -> Result<()> {
        let filename = self.next_log_filename(state, LEVEL_LOG, LogFileStage::Normal)?;
        self.provider.create_dir_all(&filename.parent_path)?;
        let writer = LogWriter::create(
            self.provider.as_ref(),
            filename,
            self.config.sync_strategy,
            false,
        )?;
        self.delegator.add_path(writer.filename());

        let old = mem::replace(&mut state.log_file, writer);
        let old_name = old.filename().clone();
        if let Err(e) = old.close() {
            tracing::error!(
                storage = %self.storage_name,
                file = %old_name.path().display(),
                error = %e,
                "failed to sync retired log"
            );
        }

        tracing::debug!(
            storage = %self.storage_name,
            from = old_name.log_num,
            to = state.log_file.filename().log_num,
            "rolled over to new log"
        );
        state.persisted.insert(old_name);
        Ok(())
    }

    /// Reserve the next log number and pick its volume
    fn next_log_filename(
        &self,
        state: &mut LogFileState,
        level_num: u32,
        stage: LogFileStage,
    ) -> Result<LogFilename> {
        let volume = self.delegator.choose_path(state.wal_paths_index)?;
        state.wal_paths_index = state.wal_paths_index.wrapping_add(1);
        state.last_log_num += 1;
        Ok(LogFilename::new(
            volume.join(&self.config.wal_dir_name),
            state.last_log_num,
            level_num,
            stage,
        ))
    }

    /// Capture which log is current and which are closed
    pub fn get_files_snapshot(&self) -> FilesSnapshot {
        let state = self.state.lock();
        FilesSnapshot {
            current_writing_log_num: state.log_file.filename().log_num,
            current_writing_bytes: state.log_file.written_bytes(),
            persisted_log_files: state.persisted.clone(),
            snapshot_threshold: self.config.snapshot_threshold,
        }
    }

    /// Write `directory_snap` as a checkpoint log and retire the logs it covers
    ///
    /// `directory_snap` must hold every edit whose `apply` returned before
    /// `files_snap` was captured. Edits applied after the capture land
    /// either in a log that is kept and replayed, or after the snapshot in
    /// the checkpoint log.
    ///
    /// A `files_snap` captured before the newest checkpoint is stale: its
    /// snapshot would replay after newer state, so nothing is written.
    ///
    /// Returns whether any log file was retired.
    pub fn save_snapshot(
        &self,
        files_snap: FilesSnapshot,
        directory_snap: PageEntriesEdit,
        write_limiter: Option<&dyn WriteLimiter>,
    ) -> Result<bool> {
        let _compaction = self.compaction_lock.lock();

        let latest_checkpoint = self.state.lock().latest_checkpoint;
        if files_snap.current_writing_log_num < latest_checkpoint {
            tracing::info!(
                storage = %self.storage_name,
                captured = files_snap.current_writing_log_num,
                latest_checkpoint,
                "ignoring snapshot captured before the latest checkpoint"
            );
            return Ok(false);
        }

        // Everything below the captured current log is covered unconditionally
        let base_log_num = files_snap.current_writing_log_num.saturating_sub(1);
        let payload = encode_record(RecordKind::Snapshot { base_log_num }, None, &directory_snap)?;

        let temp_name = {
            let mut state = self.state.lock();
            let name = self.next_log_filename(&mut state, LEVEL_CHECKPOINT, LogFileStage::Temporary)?;
            state.checkpoint_pending = true;
            name
        };

        let checkpoint = match self.write_checkpoint(&temp_name, &payload, write_limiter) {
            Ok(writer) => writer,
            Err(e) => {
                self.state.lock().checkpoint_pending = false;
                tracing::error!(
                    storage = %self.storage_name,
                    file = %temp_name.path().display(),
                    error = %e,
                    "checkpoint failed, keeping current log"
                );
                return Err(e);
            }
        };
        let checkpoint_name = checkpoint.filename().clone();
        self.delegator.add_path(&checkpoint_name);

        // Cutover: from here on every apply lands after the snapshot
        let (old_writer, retired) = {
            let mut state = self.state.lock();
            state.checkpoint_pending = false;
            state.latest_checkpoint = checkpoint_name.log_num;

            let old = mem::replace(&mut state.log_file, checkpoint);
            let old_name = old.filename().clone();
            let pristine = old_name.log_num == files_snap.current_writing_log_num
                && old.written_bytes() == files_snap.current_writing_bytes;

            let mut retired: Vec<LogFilename> = files_snap
                .persisted_log_files
                .iter()
                .filter_map(|f| state.persisted.take(f))
                .collect();
            if pristine {
                retired.push(old_name);
            } else {
                state.persisted.insert(old_name);
            }
            (old, retired)
        };

        let mut first_error = None;
        let old_name = old_writer.filename().clone();
        if let Err(e) = old_writer.close() {
            tracing::error!(
                storage = %self.storage_name,
                file = %old_name.path().display(),
                error = %e,
                "failed to sync log replaced by checkpoint"
            );
            first_error.get_or_insert(e);
        }

        for file in &retired {
            match self.provider.delete_file(&file.path()) {
                Ok(()) => self.delegator.remove_path(file),
                Err(e) => {
                    // Left behind, it is skipped by replay and retried next time
                    tracing::warn!(
                        storage = %self.storage_name,
                        file = %file.path().display(),
                        error = %e,
                        "failed to remove retired log"
                    );
                    self.state.lock().persisted.insert(file.clone());
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::info!(
            storage = %self.storage_name,
            checkpoint = %checkpoint_name.path().display(),
            base_log_num,
            retired = retired.len(),
            records = directory_snap.len(),
            "saved directory snapshot"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(!retired.is_empty()),
        }
    }

    /// Write, sync and publish a checkpoint log; the writer comes back
    /// positioned after the snapshot record, ready to take appends
    fn write_checkpoint(
        &self,
        temp_name: &LogFilename,
        payload: &[u8],
        write_limiter: Option<&dyn WriteLimiter>,
    ) -> Result<LogWriter> {
        if let Some(limiter) = write_limiter {
            limiter.request((HEADER_SIZE + payload.len()) as u64);
        }

        self.provider.create_dir_all(&temp_name.parent_path)?;
        let mut writer = LogWriter::create(
            self.provider.as_ref(),
            temp_name.clone(),
            self.config.sync_strategy,
            true,
        )?;

        let published = writer
            .add_record(payload)
            .and_then(|_| writer.sync())
            .and_then(|_| {
                let normal = temp_name.with_stage(LogFileStage::Normal);
                self.provider.rename_file(&temp_name.path(), &normal.path())?;
                Ok(normal)
            });

        match published {
            Ok(normal) => {
                writer.set_filename(normal);
                writer.set_manual_flush(false);
                Ok(writer)
            }
            Err(e) => {
                drop(writer);
                if let Err(cleanup) = self.provider.delete_file(&temp_name.path()) {
                    tracing::debug!(
                        file = %temp_name.path().display(),
                        error = %cleanup,
                        "could not remove temporary checkpoint"
                    );
                }
                Err(e)
            }
        }
    }

    /// Flush and fsync the current log
    pub fn sync(&self) -> Result<()> {
        self.state.lock().log_file.sync()
    }

    /// Sync the current log and release it
    pub fn close(self) -> Result<()> {
        let state = self.state.into_inner();
        state.log_file.close()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    /// Log number of the file currently appended to
    pub fn current_log_num(&self) -> LogNumber {
        self.state.lock().log_file.filename().log_num
    }

    /// Identity of the file currently appended to
    pub fn current_log_file(&self) -> LogFilename {
        self.state.lock().log_file.filename().clone()
    }

    /// Number of closed log files still on disk
    pub fn persisted_log_count(&self) -> usize {
        self.state.lock().persisted.len()
    }
}
