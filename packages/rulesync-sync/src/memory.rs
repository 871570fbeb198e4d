//! In-memory source and sink
//!
//! Drive the synchronizer without SQLite or Tantivy, with injectable read
//! and write failures.

use parking_lot::{Mutex, RwLock};
use rulesync_index::{IndexDocument, IndexError};
use rulesync_storage::{EpochMillis, Rule, StorageError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, SyncError};
use crate::ports::{BatchStats, ChangeWindow, DocumentMapper, IndexBatch, IndexSink, RecordSource};

/// Records that carry their own modification timestamp
pub trait Stamped {
    fn updated_at(&self) -> EpochMillis;
}

impl Stamped for Rule {
    fn updated_at(&self) -> EpochMillis {
        self.updated_at
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Source
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MemorySource<R> {
    records: RwLock<Vec<R>>,
    fail_after: Mutex<Option<usize>>,
}

impl<R: Stamped + Clone> MemorySource<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records: RwLock::new(records),
            fail_after: Mutex::new(None),
        }
    }

    pub fn push(&self, record: R) {
        self.records.write().push(record);
    }

    /// Next cursors yield `n` records, then a read error
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock() = Some(n);
    }

    pub fn recover(&self) {
        *self.fail_after.lock() = None;
    }
}

impl<R: Stamped + Clone> RecordSource for MemorySource<R> {
    type Record = R;
    type Error = SyncError;
    type Cursor<'a> = std::vec::IntoIter<Result<R>> where Self: 'a;

    fn changed_since(&self, window: &ChangeWindow) -> Result<Self::Cursor<'_>> {
        let mut items: Vec<Result<R>> = self
            .records
            .read()
            .iter()
            .filter(|r| window.contains(r.updated_at()))
            .cloned()
            .map(Ok)
            .collect();

        if let Some(n) = *self.fail_after.lock() {
            items.truncate(n);
            items.push(Err(StorageError::database("injected read failure").into()));
        }
        Ok(items.into_iter())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Document map keyed by id; flushed documents become visible at once.
pub struct MemoryIndex {
    name: String,
    documents: RwLock<BTreeMap<String, IndexDocument>>,
    batches_begun: AtomicUsize,
    upserts: AtomicUsize,
    fail_on_upsert: Mutex<Option<usize>>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
            batches_begun: AtomicUsize::new(0),
            upserts: AtomicUsize::new(0),
            fail_on_upsert: Mutex::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<IndexDocument> {
        self.documents.read().get(id).cloned()
    }

    /// Sorted document ids
    pub fn ids(&self) -> Vec<String> {
        self.documents.read().keys().cloned().collect()
    }

    pub fn batches_begun(&self) -> usize {
        self.batches_begun.load(Ordering::Relaxed)
    }

    /// Upserts accepted since creation, flushed or not
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::Relaxed)
    }

    /// The `n`-th upsert from now on (1-based) fails
    pub fn fail_on_upsert(&self, n: usize) {
        *self.fail_on_upsert.lock() = Some(n.max(1));
    }

    pub fn recover(&self) {
        *self.fail_on_upsert.lock() = None;
    }

    fn check_injected_failure(&self) -> Result<()> {
        let mut fail = self.fail_on_upsert.lock();
        match *fail {
            Some(1) => Err(IndexError::internal("injected write failure").into()),
            Some(n) => {
                *fail = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl IndexSink for MemoryIndex {
    type Batch<'a> = MemoryBatch<'a>;

    fn index_name(&self) -> &str {
        &self.name
    }

    fn begin_batch(&self, flush_size: usize) -> Result<MemoryBatch<'_>> {
        self.batches_begun.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryBatch {
            index: self,
            flush_size: flush_size.max(1),
            pending: Vec::new(),
            stats: BatchStats::default(),
        })
    }
}

/// Pending documents are discarded when the batch is dropped unended
pub struct MemoryBatch<'a> {
    index: &'a MemoryIndex,
    flush_size: usize,
    pending: Vec<IndexDocument>,
    stats: BatchStats,
}

impl MemoryBatch<'_> {
    fn flush(&mut self) {
        let mut documents = self.index.documents.write();
        for document in self.pending.drain(..) {
            documents.insert(document.id.clone(), document);
        }
        self.stats.flushes += 1;
    }
}

impl IndexBatch for MemoryBatch<'_> {
    fn add_upsert(&mut self, document: IndexDocument) -> Result<()> {
        self.index.check_injected_failure()?;
        self.index.upserts.fetch_add(1, Ordering::Relaxed);

        self.pending.push(document);
        self.stats.upserted += 1;
        if self.pending.len() >= self.flush_size {
            self.flush();
        }
        Ok(())
    }

    fn end_batch(mut self) -> Result<BatchStats> {
        if !self.pending.is_empty() {
            self.flush();
        }
        Ok(self.stats)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Minimal record type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Id + timestamp record for exercising the synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedRecord {
    pub id: String,
    pub updated_at: EpochMillis,
    pub tombstone: bool,
    /// Makes the mapper fail
    pub invalid: bool,
}

impl StampedRecord {
    pub fn new(id: impl Into<String>, updated_at: EpochMillis) -> Self {
        Self {
            id: id.into(),
            updated_at,
            tombstone: false,
            invalid: false,
        }
    }
}

impl Stamped for StampedRecord {
    fn updated_at(&self) -> EpochMillis {
        self.updated_at
    }
}

pub struct StampedRecordMapper;

impl DocumentMapper<StampedRecord> for StampedRecordMapper {
    fn updated_at(&self, record: &StampedRecord) -> EpochMillis {
        record.updated_at
    }

    fn to_document(&self, record: &StampedRecord) -> Result<IndexDocument> {
        if record.invalid {
            return Err(SyncError::mapping(format!(
                "record '{}' cannot be mapped",
                record.id
            )));
        }
        Ok(IndexDocument::new(&record.id, "default").with_field("updatedAt", record.updated_at))
    }

    fn is_tombstone(&self, record: &StampedRecord) -> bool {
        record.tombstone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Boundary;

    #[test]
    fn test_source_filters_by_window() {
        let source = MemorySource::new(vec![
            StampedRecord::new("a", 10),
            StampedRecord::new("b", 20),
        ]);
        let ids: Vec<String> = source
            .changed_since(&ChangeWindow::new(10, Boundary::Exclusive))
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_source_injected_failure() {
        let source = MemorySource::new(vec![StampedRecord::new("a", 10)]);
        source.fail_after(0);
        let mut cursor = source
            .changed_since(&ChangeWindow::new(0, Boundary::Inclusive))
            .unwrap();
        assert!(cursor.next().unwrap().is_err());

        source.recover();
        assert_eq!(
            source
                .changed_since(&ChangeWindow::new(0, Boundary::Inclusive))
                .unwrap()
                .count(),
            1
        );
    }

    #[test]
    fn test_batch_flushes_and_rolls_back() {
        let index = MemoryIndex::new("things");
        {
            let mut batch = index.begin_batch(2).unwrap();
            batch.add_upsert(IndexDocument::new("a", "r")).unwrap();
            batch.add_upsert(IndexDocument::new("b", "r")).unwrap();
            batch.add_upsert(IndexDocument::new("c", "r")).unwrap();
        }
        assert_eq!(index.ids(), vec!["a", "b"]);
        assert_eq!(index.upserts(), 3);

        let mut batch = index.begin_batch(2).unwrap();
        batch.add_upsert(IndexDocument::new("c", "r")).unwrap();
        let stats = batch.end_batch().unwrap();
        assert_eq!(stats, BatchStats { upserted: 1, flushes: 1 });
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_injected_write_failure() {
        let index = MemoryIndex::new("things");
        index.fail_on_upsert(2);
        let mut batch = index.begin_batch(10).unwrap();
        assert!(batch.add_upsert(IndexDocument::new("a", "r")).is_ok());
        assert!(batch.add_upsert(IndexDocument::new("b", "r")).is_err());
    }
}
