//! Checkpoint properties of the synchronizer, over in-memory ports

use proptest::prelude::*;
use rulesync_sync::{
    Boundary, ChangeFeedSynchronizer, InMemoryCheckpointStore, MemoryIndex, MemorySource,
    StampedRecord, StampedRecordMapper, SyncError, SyncJob, SyncOptions,
};
use std::collections::HashSet;

type Synchronizer =
    ChangeFeedSynchronizer<MemorySource<StampedRecord>, StampedRecordMapper, MemoryIndex>;

fn synchronizer(records: Vec<StampedRecord>, batch_size: usize, boundary: Boundary) -> Synchronizer {
    ChangeFeedSynchronizer::new(
        MemorySource::new(records),
        StampedRecordMapper,
        MemoryIndex::new("things"),
        SyncOptions {
            batch_size,
            boundary,
        },
    )
}

fn records_at(timestamps: &HashSet<i64>) -> Vec<StampedRecord> {
    timestamps
        .iter()
        .map(|ts| StampedRecord::new(format!("r{}", ts), *ts))
        .collect()
}

proptest! {
    #[test]
    fn prop_checkpoint_is_max_timestamp(
        timestamps in prop::collection::hash_set(1i64..10_000_000, 1..64),
        batch_size in 1usize..16,
    ) {
        let expected = *timestamps.iter().max().unwrap();
        let sync = synchronizer(Vec::new(), batch_size, Boundary::Inclusive);

        let outcome = sync.sync_records(records_at(&timestamps), 0).unwrap();
        prop_assert_eq!(outcome.checkpoint, expected);
        prop_assert_eq!(outcome.records_seen, timestamps.len());
        prop_assert_eq!(sync.sink().len(), timestamps.len());
    }

    #[test]
    fn prop_checkpoint_never_decreases(
        timestamps in prop::collection::hash_set(1i64..10_000, 0..32),
        checkpoint in 0i64..10_000,
    ) {
        let sync = synchronizer(records_at(&timestamps), 8, Boundary::Exclusive);
        let outcome = sync.sync(checkpoint).unwrap();

        let newer: Vec<i64> = timestamps.iter().copied().filter(|ts| *ts > checkpoint).collect();
        let expected = newer.iter().copied().max().unwrap_or(checkpoint).max(checkpoint);
        // Checkpoint 0 reads inclusively, but generated timestamps start at 1
        prop_assert!(outcome.checkpoint >= checkpoint);
        prop_assert_eq!(outcome.checkpoint, expected);
        prop_assert_eq!(outcome.records_seen, newer.len());
    }

    #[test]
    fn prop_repeated_pass_adds_no_duplicates(
        timestamps in prop::collection::hash_set(1i64..1_000, 1..32),
    ) {
        let sync = synchronizer(records_at(&timestamps), 4, Boundary::Inclusive);
        sync.sync(0).unwrap();
        sync.sync(0).unwrap();
        prop_assert_eq!(sync.sink().len(), timestamps.len());
    }
}

#[test]
fn test_failed_write_recovers_from_previous_checkpoint() {
    let records: Vec<StampedRecord> = (1..=7)
        .map(|i| StampedRecord::new(format!("r{}", i), 1_000 + i * 100))
        .collect();
    let job = SyncJob::new(
        synchronizer(records, 3, Boundary::Exclusive),
        InMemoryCheckpointStore::new(),
    );

    job.synchronizer().sink().fail_on_upsert(5);
    let err = job.run_once().unwrap_err();
    assert!(matches!(err, SyncError::Index(_)));
    assert_eq!(job.current_checkpoint().unwrap(), 0);
    // First flush of three made it, the pending one was rolled back
    assert_eq!(job.synchronizer().sink().len(), 3);

    job.synchronizer().sink().recover();
    let outcome = job.run_once().unwrap();
    assert_eq!(outcome.previous_checkpoint, 0);
    assert_eq!(outcome.records_seen, 7);
    assert_eq!(outcome.checkpoint, 1_700);
    assert_eq!(job.current_checkpoint().unwrap(), 1_700);
    assert_eq!(job.synchronizer().sink().len(), 7);
}

#[test]
fn test_failed_read_keeps_checkpoint() {
    let job = SyncJob::new(
        synchronizer(
            vec![StampedRecord::new("a", 10), StampedRecord::new("b", 20)],
            1,
            Boundary::Inclusive,
        ),
        InMemoryCheckpointStore::new(),
    );

    job.synchronizer().source().fail_after(1);
    assert!(matches!(job.run_once(), Err(SyncError::Storage(_))));
    assert_eq!(job.current_checkpoint().unwrap(), 0);
    // The record read before the failure was flushed on its own
    assert_eq!(job.synchronizer().sink().ids(), vec!["a"]);

    job.synchronizer().source().recover();
    assert_eq!(job.run_once().unwrap().checkpoint, 20);
}
