/*
 * Change-feed synchronizer
 *
 * One pass:
 *   1. open a cursor over records in the change window
 *   2. map each record to a document and upsert it into a lazily begun batch
 *   3. track the running max of `updated_at`
 *   4. end the batch; the new checkpoint is max(old, max seen)
 *
 * Any error aborts the pass: the batch is dropped (unflushed documents are
 * rolled back) and no checkpoint is returned. Order is arbitrary, so there
 * is no safe partial checkpoint.
 */

use rulesync_storage::EpochMillis;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::ports::{
    BatchStats, Boundary, ChangeWindow, DocumentMapper, IndexBatch, IndexSink, RecordSource,
};

/// Default upserts per flush
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub batch_size: usize,
    pub boundary: Boundary,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            boundary: Boundary::Inclusive,
        }
    }
}

/// Result of one successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub previous_checkpoint: EpochMillis,
    /// max(previous, max `updated_at` seen)
    pub checkpoint: EpochMillis,
    pub records_seen: usize,
    pub documents_upserted: usize,
    pub tombstones_seen: usize,
    pub batches_flushed: usize,
    pub duration_ms: u64,
}

impl SyncOutcome {
    pub fn advanced(&self) -> bool {
        self.checkpoint > self.previous_checkpoint
    }
}

/// Generic incremental synchronizer: source → mapper → sink
pub struct ChangeFeedSynchronizer<S, M, W> {
    source: S,
    mapper: M,
    sink: W,
    options: SyncOptions,
}

impl<S, M, W> ChangeFeedSynchronizer<S, M, W>
where
    S: RecordSource,
    M: DocumentMapper<S::Record>,
    W: IndexSink,
{
    pub fn new(source: S, mapper: M, sink: W, options: SyncOptions) -> Self {
        Self {
            source,
            mapper,
            sink,
            options: SyncOptions {
                batch_size: options.batch_size.max(1),
                ..options
            },
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn window(&self, checkpoint: EpochMillis) -> ChangeWindow {
        ChangeWindow::new(checkpoint, self.options.boundary)
    }

    /// Copy every record changed since `checkpoint` into the sink.
    pub fn sync(&self, checkpoint: EpochMillis) -> Result<SyncOutcome> {
        let window = self.window(checkpoint);
        let cursor = self
            .source
            .changed_since(&window)
            .map_err(Into::<SyncError>::into)?;
        self.run(
            cursor.map(|record| record.map_err(Into::<SyncError>::into)),
            window,
        )
    }

    /// Same pass over an explicit record sequence instead of the source.
    /// Records outside the change window are skipped.
    pub fn sync_records<I>(&self, records: I, checkpoint: EpochMillis) -> Result<SyncOutcome>
    where
        I: IntoIterator<Item = S::Record>,
    {
        let window = self.window(checkpoint);
        self.run(records.into_iter().map(Ok), window)
    }

    fn run<I>(&self, records: I, window: ChangeWindow) -> Result<SyncOutcome>
    where
        I: Iterator<Item = Result<S::Record>>,
    {
        let started = Instant::now();
        let mut checkpoint = window.since;
        let mut records_seen = 0;
        let mut tombstones_seen = 0;
        let mut batch: Option<W::Batch<'_>> = None;

        for record in records {
            let record = record?;
            let updated_at = self.mapper.updated_at(&record);
            if !window.contains(updated_at) {
                debug!("Skipping record outside change window (updated_at={})", updated_at);
                continue;
            }

            records_seen += 1;
            if self.mapper.is_tombstone(&record) {
                tombstones_seen += 1;
            }

            let document = self.mapper.to_document(&record)?;
            if batch.is_none() {
                batch = Some(self.sink.begin_batch(self.options.batch_size)?);
            }
            if let Some(batch) = batch.as_mut() {
                batch.add_upsert(document)?;
            }

            checkpoint = checkpoint.max(updated_at);
        }

        let stats = match batch {
            Some(batch) => batch.end_batch()?,
            None => BatchStats::default(),
        };

        let outcome = SyncOutcome {
            previous_checkpoint: window.since,
            checkpoint,
            records_seen,
            documents_upserted: stats.upserted,
            tombstones_seen,
            batches_flushed: stats.flushes,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Synced '{}': {} records, {} upserts ({} tombstones), {} flushes, checkpoint {} -> {} in {}ms",
            self.sink.index_name(),
            outcome.records_seen,
            outcome.documents_upserted,
            outcome.tombstones_seen,
            outcome.batches_flushed,
            outcome.previous_checkpoint,
            outcome.checkpoint,
            outcome.duration_ms
        );
        Ok(outcome)
    }
}
