//! Shared helpers for the WAL tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pagewal::edit::{EditRecordKind, PageEntriesEdit, PageEntry, PageVersion};
use pagewal::env::{FileProvider, LocalFileProvider, MultiVolumeDelegator, WritableFile};
use pagewal::wal::{frame, RecordKind, WALStore, WALStoreReader, WalRecord};
use pagewal::{Result, WalConfig};
use tempfile::TempDir;

// =============================================================================
// Directories
// =============================================================================

pub fn setup_temp_volume() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

pub fn wal_dir(volume: &Path) -> PathBuf {
    volume.join("wal")
}

pub fn log_path(volume: &Path, log_num: u64, level_num: u32) -> PathBuf {
    wal_dir(volume).join(format!("log_{}_{}", log_num, level_num))
}

/// Sorted file names in a volume's WAL directory
pub fn list_wal_files(volume: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(wal_dir(volume))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Stores
// =============================================================================

pub fn strict_config() -> WalConfig {
    WalConfig::builder()
        .recovery_mode(pagewal::RecoveryMode::AbsoluteConsistency)
        .build()
}

pub fn open_store(volume: &Path, config: WalConfig) -> (WALStore, WALStoreReader) {
    WALStore::create(
        "test",
        Arc::new(LocalFileProvider::new()),
        Arc::new(MultiVolumeDelegator::single(volume)),
        config,
    )
    .unwrap()
}

/// Drain a reader, panicking on any error
pub fn collect_records(reader: WALStoreReader) -> Vec<WalRecord> {
    reader.map(|r| r.unwrap()).collect()
}

// =============================================================================
// Edits
// =============================================================================

pub fn entry_at(offset: u64) -> PageEntry {
    PageEntry {
        file_id: 1,
        offset,
        size: 4096,
        checksum: offset.wrapping_mul(31),
    }
}

/// An edit putting `page_id` at a location derived from it
pub fn put_edit(page_id: u64) -> PageEntriesEdit {
    let mut edit = PageEntriesEdit::new();
    edit.put(page_id, entry_at(page_id * 4096));
    edit
}

/// Page ids put by a record, in order
pub fn put_ids(record: &WalRecord) -> Vec<u64> {
    record.edit.records().iter().map(|r| r.page_id).collect()
}

pub fn edit_record(page_id: u64, version: u64) -> WalRecord {
    let mut edit = put_edit(page_id);
    edit.set_version(PageVersion::new(version));
    WalRecord::new(edit, Some(PageVersion::new(version)))
}

pub fn is_snapshot(record: &WalRecord) -> bool {
    matches!(record.kind, RecordKind::Snapshot { .. })
}

/// Page directory rebuilt from replayed records
pub fn replay_state(records: &[WalRecord]) -> BTreeMap<u64, PageEntry> {
    let mut state = BTreeMap::new();
    for record in records {
        if is_snapshot(record) {
            state.clear();
        }
        for op in record.edit.records() {
            match op.kind {
                EditRecordKind::Del => {
                    state.remove(&op.page_id);
                }
                _ => {
                    state.insert(op.page_id, op.entry);
                }
            }
        }
    }
    state
}

/// A consolidated edit putting every page of `state`
pub fn consolidated(state: &BTreeMap<u64, PageEntry>) -> PageEntriesEdit {
    let mut edit = PageEntriesEdit::new();
    for (page_id, entry) in state {
        edit.put(*page_id, *entry);
    }
    edit
}

// =============================================================================
// Raw log files
// =============================================================================

/// Framed bytes of `count` edit records with versions 1..=count
pub fn framed_records(first_page: u64, count: usize) -> Vec<Vec<u8>> {
    (0..count as u64)
        .map(|i| edit_record(first_page + i, i + 1).serialize().unwrap())
        .collect()
}

/// Flip a payload byte so the record fails its checksum
pub fn corrupt_payload(frame_bytes: &mut [u8]) {
    let last = frame_bytes.len() - 1;
    frame_bytes[last] ^= 0xFF;
}

/// A frame whose checksum is valid but whose payload is not a record
pub fn undecodable_frame() -> Vec<u8> {
    frame(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03])
}

pub fn write_log_file(volume: &Path, log_num: u64, level_num: u32, frames: &[Vec<u8>]) -> PathBuf {
    fs::create_dir_all(wal_dir(volume)).unwrap();
    let path = log_path(volume, log_num, level_num);
    let mut file = File::create(&path).unwrap();
    for bytes in frames {
        file.write_all(bytes).unwrap();
    }
    file.sync_all().unwrap();
    path
}

pub fn append_bytes(path: &Path, bytes: &[u8]) {
    let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Fault injection
// =============================================================================

/// Local provider whose operations can be made to fail on demand
#[derive(Default)]
pub struct FlakyProvider {
    inner: LocalFileProvider,
    pub fail_creates: AtomicBool,
    pub fail_renames: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub fail_writes: Arc<AtomicBool>,
}

struct FlakyFile {
    inner: Box<dyn WritableFile>,
    fail: Arc<AtomicBool>,
}

impl Write for FlakyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected flush failure"));
        }
        self.inner.flush()
    }
}

impl WritableFile for FlakyFile {
    fn sync(&mut self) -> Result<()> {
        self.inner.sync()
    }
}

fn injected(what: &str) -> pagewal::WalError {
    io::Error::new(io::ErrorKind::Other, format!("injected {} failure", what)).into()
}

impl FileProvider for FlakyProvider {
    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        self.inner.create_dir_all(dir)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(injected("create"));
        }
        let inner = self.inner.create_file(path)?;
        Ok(Box::new(FlakyFile {
            inner,
            fail: Arc::clone(&self.fail_writes),
        }))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        self.inner.open_file(path)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete_file(path)
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        if self.fail_renames.load(Ordering::SeqCst) {
            return Err(injected("rename"));
        }
        self.inner.rename_file(from, to)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        self.inner.list_dir(dir)
    }
}
