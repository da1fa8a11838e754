//! Concurrency tests for WALStore
//!
//! These tests verify:
//! - Concurrent applies are all durable and keep per-thread order
//! - Applies racing save_snapshot are neither lost nor duplicated
//! - Concurrent save_snapshot calls serialize

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use pagewal::config::WalSyncStrategy;
use pagewal::edit::{EditRecordKind, PageEntry, PageVersion};
use pagewal::{RecoveryMode, WalConfig};

use crate::common::{
    collect_records, consolidated, is_snapshot, list_wal_files, open_store, put_edit, replay_state,
    setup_temp_volume,
};

const THREADS: u64 = 4;
const APPLIES_PER_THREAD: u64 = 200;

fn concurrent_config() -> WalConfig {
    WalConfig::builder()
        .sync_strategy(WalSyncStrategy::Manual)
        .max_log_file_size(4096)
        .recovery_mode(RecoveryMode::AbsoluteConsistency)
        .build()
}

fn page_of(thread: u64, i: u64) -> u64 {
    thread * 1_000_000 + i
}

// =============================================================================
// Concurrent Apply Tests
// =============================================================================

#[test]
fn test_concurrent_applies_all_replay() {
    let (_temp, volume) = setup_temp_volume();
    let sequence = AtomicU64::new(0);

    {
        let (store, _) = open_store(&volume, concurrent_config());

        crossbeam::scope(|s| {
            for t in 0..THREADS {
                let store = &store;
                let sequence = &sequence;
                s.spawn(move |_| {
                    for i in 0..APPLIES_PER_THREAD {
                        let version = PageVersion::new(sequence.fetch_add(1, Ordering::SeqCst) + 1);
                        store.apply(&mut put_edit(page_of(t, i)), version, None).unwrap();
                    }
                });
            }
        })
        .unwrap();

        assert!(store.persisted_log_count() > 0, "expected size-based rotation");
        store.close().unwrap();
    }

    let (_store, reader) = open_store(&volume, concurrent_config());
    let records = collect_records(reader);
    assert_eq!(records.len() as u64, THREADS * APPLIES_PER_THREAD);

    // Each thread's pages come back in the order it applied them
    let mut next_per_thread: HashMap<u64, u64> = HashMap::new();
    for record in &records {
        let page_id = record.edit.records()[0].page_id;
        let (thread, i) = (page_id / 1_000_000, page_id % 1_000_000);
        let expected = next_per_thread.entry(thread).or_insert(0);
        assert_eq!(i, *expected, "thread {} replayed out of order", thread);
        *expected += 1;
    }
}

// =============================================================================
// Apply During Snapshot Tests
// =============================================================================

#[test]
fn test_applies_racing_snapshots_are_not_lost_or_duplicated() {
    let (_temp, volume) = setup_temp_volume();

    // The page directory the WAL protects; appliers log and publish under
    // its write lock, so a capture taken under the same lock is consistent
    let directory: RwLock<BTreeMap<u64, PageEntry>> = RwLock::new(BTreeMap::new());
    let sequence = AtomicU64::new(0);
    let done = AtomicBool::new(false);
    let mut snapshots_saved = 0;

    {
        let (store, _) = open_store(&volume, concurrent_config());

        crossbeam::scope(|s| {
            let mut appliers = Vec::new();
            for t in 0..THREADS {
                let store = &store;
                let directory = &directory;
                let sequence = &sequence;
                appliers.push(s.spawn(move |_| {
                    for i in 0..APPLIES_PER_THREAD {
                        let mut edit = put_edit(page_of(t, i));
                        if i % 10 == 9 {
                            edit.del(page_of(t, i - 5));
                        }

                        let mut published = directory.write();
                        let version = PageVersion::new(sequence.fetch_add(1, Ordering::SeqCst) + 1);
                        store.apply(&mut edit, version, None).unwrap();
                        for op in edit.records() {
                            match op.kind {
                                EditRecordKind::Del => {
                                    published.remove(&op.page_id);
                                }
                                _ => {
                                    published.insert(op.page_id, op.entry);
                                }
                            }
                        }
                    }
                }));
            }

            let compactor = s.spawn(|_| {
                let mut saved = 0;
                while !done.load(Ordering::SeqCst) {
                    let (files_snap, snap) = {
                        let published = directory.read();
                        (store.get_files_snapshot(), consolidated(&published))
                    };
                    store.save_snapshot(files_snap, snap, None).unwrap();
                    saved += 1;
                }
                saved
            });

            for applier in appliers {
                applier.join().unwrap();
            }
            done.store(true, Ordering::SeqCst);
            snapshots_saved = compactor.join().unwrap();
        })
        .unwrap();

        store.close().unwrap();
    }

    assert!(snapshots_saved > 0);

    let (_store, reader) = open_store(&volume, concurrent_config());
    let records = collect_records(reader);

    // No loss: replay rebuilds exactly the published directory
    let expected = directory.into_inner();
    assert_eq!(replay_state(&records), expected);

    // No duplication: every surviving edit record appears once
    let mut seen = HashMap::new();
    for record in records.iter().filter(|r| !is_snapshot(r)) {
        let version = record.version.unwrap();
        *seen.entry(version).or_insert(0u32) += 1;
    }
    assert!(seen.values().all(|&count| count == 1));
}

#[test]
fn test_concurrent_snapshots_serialize() {
    let (_temp, volume) = setup_temp_volume();
    let (store, _) = open_store(&volume, concurrent_config());
    store.apply(&mut put_edit(1), PageVersion::new(1), None).unwrap();

    let captures = [store.get_files_snapshot(), store.get_files_snapshot()];
    let results: Vec<bool> = crossbeam::scope(|s| {
        let handles: Vec<_> = captures
            .into_iter()
            .map(|files_snap| {
                let store = &store;
                s.spawn(move |_| store.save_snapshot(files_snap, put_edit(1), None).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    // The loser's capture predates the winner's checkpoint
    assert_eq!(results.iter().filter(|&&retired| retired).count(), 1);
    assert_eq!(list_wal_files(&volume), vec!["log_2_1".to_string()]);
    assert_eq!(store.current_log_num(), 2);
}
