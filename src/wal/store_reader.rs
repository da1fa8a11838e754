//! WAL Store Reader
//!
//! Replays an ordered set of log files under one recovery mode.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::env::FileProvider;
use crate::error::{Result, WalError};

use super::reader::{LogReader, ReadEvent};
use super::recovery::{Anomaly, RecoveryMode, ReplayAction, ReplayPosition, ReplayReport};
use super::{LogFilename, LogFilenameSet, RecordKind, WalRecord};

/// Which records of a file a replay step covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilePart {
    Whole,
    /// Only the leading snapshot record of a checkpoint
    Head,
    /// Everything after the leading snapshot record
    Tail,
}

#[derive(Debug, Clone)]
struct ReplayStep {
    filename: LogFilename,
    part: FilePart,

    /// The file was already opened by an earlier step
    resumed: bool,
}

impl ReplayStep {
    fn new(filename: LogFilename, part: FilePart) -> Self {
        Self {
            filename,
            part,
            resumed: false,
        }
    }

    fn whole(filename: LogFilename) -> Self {
        Self::new(filename, FilePart::Whole)
    }
}

/// Lazily replays every record of a set of log files, oldest first
///
/// Files are opened one at a time. Logs subsumed by the newest checkpoint
/// are dropped up front; logs it did not subsume but that are numbered
/// below it replay between its snapshot record and the rest of it. A fatal
/// error is yielded once; afterwards the reader is exhausted.
pub struct WALStoreReader {
    provider: Arc<dyn FileProvider>,
    mode: RecoveryMode,
    steps: VecDeque<ReplayStep>,
    current: Option<(LogReader, FilePart)>,
    report: ReplayReport,
    /// The open file's first record is not replayed
    skip_head: bool,
    finished: bool,
}

impl WALStoreReader {
    pub fn new(provider: Arc<dyn FileProvider>, files: LogFilenameSet, mode: RecoveryMode) -> Self {
        let mut report = ReplayReport::default();
        let steps = plan_replay(provider.as_ref(), files, &mut report);
        Self {
            provider,
            mode,
            steps,
            current: None,
            report,
            skip_head: false,
            finished: false,
        }
    }

    pub fn recovery_mode(&self) -> RecoveryMode {
        self.mode
    }

    /// Files not yet opened, in replay order
    ///
    /// A checkpoint that brackets kept older logs shows up twice.
    pub fn remaining_files(&self) -> impl Iterator<Item = &LogFilename> {
        self.steps.iter().map(|step| &step.filename)
    }

    /// Progress so far; complete once the reader is exhausted
    pub fn report(&self) -> &ReplayReport {
        &self.report
    }

    /// The next record, `Ok(None)` once replay is over
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if self.current.is_none() {
                let Some(step) = self.steps.pop_front() else {
                    self.finished = true;
                    return Ok(None);
                };
                match LogReader::open(self.provider.as_ref(), step.filename) {
                    Ok(reader) => {
                        // The snapshot record was handed out by the head
                        // step or is superseded; damage to it still counts
                        self.skip_head = step.part == FilePart::Tail;
                        if !step.resumed {
                            self.report.files_read += 1;
                        }
                        self.current = Some((reader, step.part));
                    }
                    Err(e) => {
                        self.finished = true;
                        return Err(e);
                    }
                }
            }

            let Some((reader, part)) = self.current.as_mut() else {
                continue;
            };
            let part = *part;
            let (log_num, level_num) = (reader.filename().log_num, reader.filename().level_num);

            let skip_head = std::mem::take(&mut self.skip_head);
            let (anomaly, offset, reason) = match reader.next_event() {
                ReadEvent::Record { .. } if skip_head => continue,
                ReadEvent::Record { offset, record } => {
                    if part == FilePart::Head {
                        self.current = None;
                    }
                    self.report.records_recovered += 1;
                    self.report.last_position = Some(ReplayPosition {
                        log_num,
                        level_num,
                        offset,
                    });
                    return Ok(Some(record));
                }
                ReadEvent::Eof => {
                    self.current = None;
                    continue;
                }
                ReadEvent::TruncatedTail { offset, reason } => {
                    (Anomaly::IncompleteTail, offset, reason)
                }
                ReadEvent::ZeroPadding { offset } => {
                    (Anomaly::ZeroPadding, offset, "trailing zero padding".to_string())
                }
                ReadEvent::Corrupted {
                    offset,
                    skippable,
                    reason,
                } => {
                    let anomaly = if skippable {
                        Anomaly::CorruptedRecord
                    } else {
                        Anomaly::CorruptedUnbounded
                    };
                    (anomaly, offset, reason)
                }
            };

            let action = self.mode.action_for(anomaly);
            tracing::warn!(
                mode = %self.mode,
                log_num,
                level_num,
                offset,
                ?anomaly,
                ?action,
                %reason,
                "anomaly during WAL replay"
            );

            match action {
                ReplayAction::EndFile => {
                    if matches!(anomaly, Anomaly::IncompleteTail | Anomaly::ZeroPadding) {
                        self.report.truncated_tails += 1;
                    } else {
                        self.report.records_skipped += 1;
                    }
                    self.current = None;
                }
                ReplayAction::SkipRecord => {
                    self.report.records_skipped += 1;
                }
                ReplayAction::Stop => {
                    if matches!(anomaly, Anomaly::IncompleteTail | Anomaly::ZeroPadding) {
                        self.report.truncated_tails += 1;
                    }
                    self.report.stopped_at = Some(ReplayPosition {
                        log_num,
                        level_num,
                        offset,
                    });
                    self.report.files_discarded = self
                        .steps
                        .iter()
                        .filter(|step| !step.resumed)
                        .count() as u64;
                    self.steps.clear();
                    self.current = None;
                    self.finished = true;
                    return Ok(None);
                }
                ReplayAction::Fail => {
                    let file = self
                        .current
                        .take()
                        .map(|(r, _)| r.filename().path())
                        .unwrap_or_default();
                    self.finished = true;
                    return Err(WalError::Corruption { file, offset, reason });
                }
            }
        }
    }
}

impl Iterator for WALStoreReader {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Order the replay around the newest checkpoint
///
/// Logs at or below its `base_log_num` are already contained in its
/// snapshot; replaying them would resurrect superseded state, so they are
/// dropped. This happens when a crash lands between a checkpoint's cutover
/// and the removal of the logs it covers.
///
/// Logs above the base but numbered below the checkpoint hold edits the
/// snapshot may lack (applied between capture and cutover). They replay
/// right after the snapshot record and before the checkpoint's own edits.
/// An older checkpoint among them contributes its edits but not its
/// snapshot, which the newer one supersedes.
fn plan_replay(
    provider: &dyn FileProvider,
    files: LogFilenameSet,
    report: &mut ReplayReport,
) -> VecDeque<ReplayStep> {
    let Some(checkpoint) = files.iter().rev().find(|f| f.is_checkpoint()).cloned() else {
        return files.into_iter().map(ReplayStep::whole).collect();
    };

    let first = LogReader::open(provider, checkpoint.clone())
        .ok()
        .and_then(|mut reader| reader.first_record());

    let base_log_num = match first.map(|r| r.kind) {
        Some(RecordKind::Snapshot { base_log_num }) => base_log_num,
        _ => {
            tracing::warn!(
                file = %checkpoint.path().display(),
                "checkpoint log does not start with a readable snapshot, replaying every log"
            );
            return files.into_iter().map(ReplayStep::whole).collect();
        }
    };

    let mut steps = VecDeque::with_capacity(files.len() + 1);
    let mut bracketed = Vec::new();
    for file in files {
        if file == checkpoint {
            continue;
        }
        if file.log_num <= base_log_num && file < checkpoint {
            tracing::info!(
                file = %file.path().display(),
                checkpoint = checkpoint.log_num,
                "skipping log subsumed by checkpoint"
            );
            report.files_skipped += 1;
        } else if file < checkpoint {
            let part = if file.is_checkpoint() {
                FilePart::Tail
            } else {
                FilePart::Whole
            };
            bracketed.push(ReplayStep::new(file, part));
        } else {
            steps.push_back(ReplayStep::whole(file));
        }
    }

    if bracketed.is_empty() {
        steps.push_front(ReplayStep::whole(checkpoint));
        return steps;
    }

    steps.push_front(ReplayStep {
        filename: checkpoint.clone(),
        part: FilePart::Tail,
        resumed: true,
    });
    for step in bracketed.into_iter().rev() {
        steps.push_front(step);
    }
    steps.push_front(ReplayStep::new(checkpoint, FilePart::Head));
    steps
}
