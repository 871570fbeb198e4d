//! Scheduled synchronization pass
//!
//! `SyncJob` owns the checkpoint lifecycle around a [`ChangeFeedSynchronizer`]:
//! load, run one pass, save only after success. Passes are serialized by a
//! non-blocking pass lock; a second caller fails fast instead of waiting.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rulesync_storage::EpochMillis;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::{Result, SyncError};
use crate::ports::{DocumentMapper, IndexSink, RecordSource};
use crate::synchronizer::{ChangeFeedSynchronizer, SyncOutcome};

/// Outcome of the most recent pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PassStatus {
    Idle,
    Succeeded {
        finished_at: DateTime<Utc>,
        outcome: SyncOutcome,
    },
    Failed {
        failed_at: DateTime<Utc>,
        checkpoint: EpochMillis,
        error: String,
    },
}

impl PassStatus {
    pub fn state_name(&self) -> &'static str {
        match self {
            PassStatus::Idle => "idle",
            PassStatus::Succeeded { .. } => "succeeded",
            PassStatus::Failed { .. } => "failed",
        }
    }
}

pub struct SyncJob<S, M, W, C> {
    synchronizer: ChangeFeedSynchronizer<S, M, W>,
    checkpoints: C,
    pass_lock: Mutex<()>,
    status: Mutex<PassStatus>,
}

impl<S, M, W, C> SyncJob<S, M, W, C>
where
    S: RecordSource,
    M: DocumentMapper<S::Record>,
    W: IndexSink,
    C: CheckpointStore,
{
    pub fn new(synchronizer: ChangeFeedSynchronizer<S, M, W>, checkpoints: C) -> Self {
        Self {
            synchronizer,
            checkpoints,
            pass_lock: Mutex::new(()),
            status: Mutex::new(PassStatus::Idle),
        }
    }

    pub fn synchronizer(&self) -> &ChangeFeedSynchronizer<S, M, W> {
        &self.synchronizer
    }

    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    pub fn index_name(&self) -> &str {
        self.synchronizer.sink().index_name()
    }

    /// Persisted checkpoint, 0 before the first successful pass
    pub fn current_checkpoint(&self) -> Result<EpochMillis> {
        Ok(self.checkpoints.load(self.index_name())?.unwrap_or(0))
    }

    pub fn last_status(&self) -> PassStatus {
        self.status.lock().clone()
    }

    /// One pass from the persisted checkpoint. The checkpoint is saved only
    /// when the pass succeeded and moved it forward.
    pub fn run_once(&self) -> Result<SyncOutcome> {
        let _pass = self
            .pass_lock
            .try_lock()
            .ok_or_else(|| SyncError::PassInProgress(self.index_name().to_string()))?;

        let checkpoint = self.current_checkpoint()?;
        debug!("Starting pass on '{}' from checkpoint {}", self.index_name(), checkpoint);

        let result = self.synchronizer.sync(checkpoint).and_then(|outcome| {
            if outcome.advanced() {
                self.checkpoints.save(self.index_name(), outcome.checkpoint)?;
            }
            Ok(outcome)
        });
        self.record(checkpoint, &result);
        result
    }

    /// Pass over explicit records from checkpoint 0; nothing is persisted.
    pub fn run_records<I>(&self, records: I) -> Result<SyncOutcome>
    where
        I: IntoIterator<Item = S::Record>,
    {
        let _pass = self
            .pass_lock
            .try_lock()
            .ok_or_else(|| SyncError::PassInProgress(self.index_name().to_string()))?;

        let result = self.synchronizer.sync_records(records, 0);
        self.record(0, &result);
        result
    }

    fn record(&self, checkpoint: EpochMillis, result: &Result<SyncOutcome>) {
        let status = match result {
            Ok(outcome) => PassStatus::Succeeded {
                finished_at: Utc::now(),
                outcome: *outcome,
            },
            Err(e) => {
                warn!(
                    "Pass on '{}' failed, checkpoint stays at {}: {}",
                    self.index_name(),
                    checkpoint,
                    e
                );
                PassStatus::Failed {
                    failed_at: Utc::now(),
                    checkpoint,
                    error: e.to_string(),
                }
            }
        };
        *self.status.lock() = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::memory::{MemoryIndex, MemorySource, StampedRecord, StampedRecordMapper};
    use crate::ports::Boundary;
    use crate::synchronizer::SyncOptions;

    type TestJob = SyncJob<
        MemorySource<StampedRecord>,
        StampedRecordMapper,
        MemoryIndex,
        InMemoryCheckpointStore,
    >;

    fn job(records: Vec<StampedRecord>) -> TestJob {
        SyncJob::new(
            ChangeFeedSynchronizer::new(
                MemorySource::new(records),
                StampedRecordMapper,
                MemoryIndex::new("things"),
                SyncOptions {
                    batch_size: 2,
                    boundary: Boundary::Exclusive,
                },
            ),
            InMemoryCheckpointStore::new(),
        )
    }

    #[test]
    fn test_run_once_persists_advanced_checkpoint() {
        let job = job(vec![StampedRecord::new("a", 10), StampedRecord::new("b", 20)]);
        assert_eq!(job.current_checkpoint().unwrap(), 0);
        assert_eq!(job.last_status().state_name(), "idle");

        let outcome = job.run_once().unwrap();
        assert_eq!(outcome.checkpoint, 20);
        assert_eq!(job.current_checkpoint().unwrap(), 20);
        assert_eq!(job.last_status().state_name(), "succeeded");

        // Nothing new: checkpoint untouched, nothing written
        let outcome = job.run_once().unwrap();
        assert!(!outcome.advanced());
        assert_eq!(outcome.records_seen, 0);

        job.synchronizer().source().push(StampedRecord::new("c", 30));
        let outcome = job.run_once().unwrap();
        assert_eq!(outcome.records_seen, 1);
        assert_eq!(job.current_checkpoint().unwrap(), 30);
        assert_eq!(job.synchronizer().sink().len(), 3);
    }

    #[test]
    fn test_failed_pass_keeps_checkpoint_and_recovers() {
        let job = job(vec![
            StampedRecord::new("a", 10),
            StampedRecord::new("b", 20),
            StampedRecord::new("c", 30),
        ]);
        job.synchronizer().sink().fail_on_upsert(3);

        assert!(matches!(job.run_once(), Err(SyncError::Index(_))));
        assert_eq!(job.current_checkpoint().unwrap(), 0);
        match job.last_status() {
            PassStatus::Failed { checkpoint, .. } => assert_eq!(checkpoint, 0),
            other => panic!("unexpected status {:?}", other),
        }

        job.synchronizer().sink().recover();
        let outcome = job.run_once().unwrap();
        assert_eq!(outcome.records_seen, 3);
        assert_eq!(job.current_checkpoint().unwrap(), 30);
        assert_eq!(job.synchronizer().sink().ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_pass_is_rejected() {
        let job = job(vec![StampedRecord::new("a", 10)]);

        let _running = job.pass_lock.lock();
        let err = job.run_once().unwrap_err();
        assert!(matches!(err, SyncError::PassInProgress(ref name) if name == "things"));
        assert!(err.is_transient());
        assert!(job.run_records(vec![StampedRecord::new("b", 5)]).is_err());
        assert_eq!(job.synchronizer().sink().len(), 0);
    }

    #[test]
    fn test_run_records_does_not_persist() {
        let job = job(Vec::new());
        let outcome = job
            .run_records(vec![StampedRecord::new("x", 100), StampedRecord::new("y", 50)])
            .unwrap();

        assert_eq!(outcome.checkpoint, 100);
        assert_eq!(job.synchronizer().sink().len(), 2);
        assert_eq!(job.current_checkpoint().unwrap(), 0);
    }
}
