//! Tests for log file naming
//!
//! These tests verify:
//! - Formatting and parsing of normal and temporary names
//! - Rejection of unrelated file names
//! - Ordering by (log_num, level_num)
//! - Directory scans across volumes

use std::fs::{self, File};
use std::path::Path;

use pagewal::env::LocalFileProvider;
use pagewal::wal::{scan_log_files, LogFileStage, LogFilename, LogFilenameSet};

use crate::common::{setup_temp_volume, wal_dir};

// =============================================================================
// Format / Parse Tests
// =============================================================================

#[test]
fn test_filename_format() {
    let name = LogFilename::new("/data/wal", 12, 0, LogFileStage::Normal);

    assert_eq!(name.filename(LogFileStage::Normal), "log_12_0");
    assert_eq!(name.filename(LogFileStage::Temporary), ".temp.log_12_0");
    assert_eq!(name.path(), Path::new("/data/wal/log_12_0"));
}

#[test]
fn test_parse_normal_and_temporary() {
    let dir = Path::new("/data/wal");

    let normal = LogFilename::parse(dir, "log_7_1").unwrap();
    assert_eq!(normal.log_num, 7);
    assert_eq!(normal.level_num, 1);
    assert_eq!(normal.stage, LogFileStage::Normal);
    assert!(normal.is_checkpoint());

    let temp = LogFilename::parse(dir, ".temp.log_8_1").unwrap();
    assert_eq!(temp.log_num, 8);
    assert_eq!(temp.stage, LogFileStage::Temporary);
    assert_eq!(temp.path(), Path::new("/data/wal/.temp.log_8_1"));
}

#[test]
fn test_parse_rejects_unrelated_names() {
    let dir = Path::new("/data/wal");

    for name in ["", "log", "log_1", "log_x_0", "log_1_y", "wal.log", ".temp.", "sstable_000001.sst"] {
        assert!(LogFilename::parse(dir, name).is_none(), "{:?} should not parse", name);
    }
}

#[test]
fn test_with_stage_keeps_identity() {
    let temp = LogFilename::new("/data/wal", 3, 1, LogFileStage::Temporary);
    let normal = temp.with_stage(LogFileStage::Normal);

    assert_eq!(temp, normal);
    assert_eq!(normal.path(), Path::new("/data/wal/log_3_1"));
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_set_orders_by_number_then_level() {
    let mut set = LogFilenameSet::new();
    set.insert(LogFilename::new("/b/wal", 10, 0, LogFileStage::Normal));
    set.insert(LogFilename::new("/a/wal", 2, 0, LogFileStage::Normal));
    set.insert(LogFilename::new("/a/wal", 9, 1, LogFileStage::Normal));
    set.insert(LogFilename::new("/b/wal", 9, 0, LogFileStage::Normal));

    let order: Vec<(u64, u32)> = set.iter().map(|f| (f.log_num, f.level_num)).collect();
    assert_eq!(order, vec![(2, 0), (9, 0), (9, 1), (10, 0)]);
}

#[test]
fn test_set_is_unique_by_identity() {
    let mut set = LogFilenameSet::new();
    assert!(set.insert(LogFilename::new("/a/wal", 4, 0, LogFileStage::Normal)));
    assert!(!set.insert(LogFilename::new("/b/wal", 4, 0, LogFileStage::Normal)));
    assert_eq!(set.len(), 1);
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_missing_directory_is_empty() {
    let (_temp, volume) = setup_temp_volume();

    let found = scan_log_files(&LocalFileProvider::new(), &[volume], "wal").unwrap();

    assert!(found.is_empty());
}

#[test]
fn test_scan_ignores_unrelated_files() {
    let (_temp, volume) = setup_temp_volume();
    let dir = wal_dir(&volume);
    fs::create_dir_all(&dir).unwrap();
    File::create(dir.join("log_3_0")).unwrap();
    File::create(dir.join(".temp.log_4_1")).unwrap();
    File::create(dir.join("README")).unwrap();
    fs::create_dir_all(dir.join("log_9_0")).unwrap(); // a directory, not a log

    let found = scan_log_files(&LocalFileProvider::new(), &[volume], "wal").unwrap();

    let names: Vec<String> = found.iter().map(|f| f.filename(f.stage)).collect();
    assert_eq!(names, vec!["log_3_0".to_string(), ".temp.log_4_1".to_string()]);
}

#[test]
fn test_scan_merges_volumes_in_order() {
    let (_temp_a, volume_a) = setup_temp_volume();
    let (_temp_b, volume_b) = setup_temp_volume();
    for (volume, nums) in [(&volume_a, [1u64, 4]), (&volume_b, [2, 3])] {
        fs::create_dir_all(wal_dir(volume)).unwrap();
        for num in nums {
            File::create(wal_dir(volume).join(format!("log_{}_0", num))).unwrap();
        }
    }

    let found = scan_log_files(
        &LocalFileProvider::new(),
        &[volume_a.clone(), volume_b.clone()],
        "wal",
    )
    .unwrap();

    let nums: Vec<u64> = found.iter().map(|f| f.log_num).collect();
    assert_eq!(nums, vec![1, 2, 3, 4]);
    assert_eq!(found[1].parent_path, wal_dir(&volume_b));
    assert_eq!(found[3].parent_path, wal_dir(&volume_a));
}
