//! Port implementations for the SQLite rule store and the Tantivy index

use rulesync_index::{BulkIndexer, IndexDocument, SearchIndex};
use rulesync_storage::{Rule, RuleCursor, SqliteRuleStore, StorageError};

use crate::error::Result;
use crate::ports::{BatchStats, ChangeWindow, IndexBatch, IndexSink, RecordSource};

impl RecordSource for SqliteRuleStore {
    type Record = Rule;
    type Error = StorageError;
    type Cursor<'a> = RuleCursor;

    fn changed_since(&self, window: &ChangeWindow) -> std::result::Result<RuleCursor, StorageError> {
        self.rules_updated_since(window.since, window.is_inclusive())
    }
}

impl IndexSink for SearchIndex {
    type Batch<'a> = BulkIndexer<'a>;

    fn index_name(&self) -> &str {
        self.name()
    }

    fn begin_batch(&self, flush_size: usize) -> Result<BulkIndexer<'_>> {
        Ok(self.bulk(flush_size)?)
    }
}

impl IndexBatch for BulkIndexer<'_> {
    fn add_upsert(&mut self, document: IndexDocument) -> Result<()> {
        Ok(self.add(&document)?)
    }

    fn end_batch(self) -> Result<BatchStats> {
        let stats = self.stop()?;
        Ok(BatchStats {
            upserted: stats.added,
            flushes: stats.flushes,
        })
    }
}
