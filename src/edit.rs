//! Page directory edits
//!
//! An edit is an ordered batch of page-id → location mutations. The WAL
//! only needs to serialize, stamp and replay them; interpreting the
//! operations is the page directory's business.

use serde::{Deserialize, Serialize};

/// Logical page identifier
pub type PageId = u64;

/// MVCC stamp attached to every applied batch
///
/// Ordered by `sequence`, then `epoch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageVersion {
    pub sequence: u64,
    pub epoch: u64,
}

impl PageVersion {
    pub fn new(sequence: u64) -> Self {
        Self { sequence, epoch: 0 }
    }

    pub fn with_epoch(sequence: u64, epoch: u64) -> Self {
        Self { sequence, epoch }
    }
}

/// Physical location of a page blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub file_id: u64,
    pub offset: u64,
    pub size: u64,
    pub checksum: u64,
}

/// Kinds of directory mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditRecordKind {
    /// Map a page id to a new entry
    Put,
    /// Rewrite an existing page id in place (used by blob GC)
    Upsert,
    /// Remove a page id
    Del,
    /// Make `page_id` an alias of `ori_page_id`
    Ref,
    /// Register a page whose data lives outside the blob store
    PutExternal,
}

/// One operation inside an edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRecord {
    pub kind: EditRecordKind,
    pub page_id: PageId,
    /// Only meaningful for `Ref`
    pub ori_page_id: PageId,
    pub version: PageVersion,
    pub entry: PageEntry,
}

/// An ordered batch of directory operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntriesEdit {
    records: Vec<EditRecord>,
}

impl PageEntriesEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, page_id: PageId, entry: PageEntry) {
        self.push(EditRecordKind::Put, page_id, 0, entry);
    }

    pub fn upsert(&mut self, page_id: PageId, entry: PageEntry) {
        self.push(EditRecordKind::Upsert, page_id, 0, entry);
    }

    pub fn del(&mut self, page_id: PageId) {
        self.push(EditRecordKind::Del, page_id, 0, PageEntry::default());
    }

    pub fn ref_page(&mut self, page_id: PageId, ori_page_id: PageId) {
        self.push(EditRecordKind::Ref, page_id, ori_page_id, PageEntry::default());
    }

    pub fn put_external(&mut self, page_id: PageId) {
        self.push(EditRecordKind::PutExternal, page_id, 0, PageEntry::default());
    }

    /// Append a fully formed record, keeping its own version
    pub fn append_record(&mut self, record: EditRecord) {
        self.records.push(record);
    }

    /// Stamp every record with `version`
    pub fn set_version(&mut self, version: PageVersion) {
        for record in &mut self.records {
            record.version = version;
        }
    }

    pub fn records(&self) -> &[EditRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EditRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn push(&mut self, kind: EditRecordKind, page_id: PageId, ori_page_id: PageId, entry: PageEntry) {
        self.records.push(EditRecord {
            kind,
            page_id,
            ori_page_id,
            version: PageVersion::default(),
            entry,
        });
    }
}
