//! Synchronizer ports
//!
//! ```text
//! RecordSource ──cursor──▶ DocumentMapper ──IndexDocument──▶ IndexSink / IndexBatch
//! ```

use rulesync_index::IndexDocument;
use rulesync_storage::EpochMillis;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Change window
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How a checkpoint bounds the next read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    /// `updated_at >= checkpoint`: re-reads records stamped exactly at the
    /// checkpoint (idempotent upserts)
    #[default]
    Inclusive,
    /// `updated_at > checkpoint`
    Exclusive,
}

/// Records modified since a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeWindow {
    pub since: EpochMillis,
    pub boundary: Boundary,
}

impl ChangeWindow {
    pub fn new(since: EpochMillis, boundary: Boundary) -> Self {
        Self { since, boundary }
    }

    /// A zero (or negative) checkpoint always reads inclusively.
    pub fn is_inclusive(&self) -> bool {
        self.boundary == Boundary::Inclusive || self.since <= 0
    }

    pub fn contains(&self, updated_at: EpochMillis) -> bool {
        if self.is_inclusive() {
            updated_at >= self.since
        } else {
            updated_at > self.since
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// System of record read side
pub trait RecordSource {
    type Record;
    type Error: Into<SyncError>;

    /// Lazy, finite, one-shot sequence in arbitrary order. Released on drop.
    type Cursor<'a>: Iterator<Item = std::result::Result<Self::Record, Self::Error>>
    where
        Self: 'a;

    fn changed_since(
        &self,
        window: &ChangeWindow,
    ) -> std::result::Result<Self::Cursor<'_>, Self::Error>;
}

/// Record → document projection
pub trait DocumentMapper<R> {
    /// Modification timestamp driving the checkpoint
    fn updated_at(&self, record: &R) -> EpochMillis;

    fn to_document(&self, record: &R) -> Result<IndexDocument>;

    /// Tombstoned records are still upserted; this only feeds the counters.
    fn is_tombstone(&self, _record: &R) -> bool {
        false
    }
}

/// Search store write side
pub trait IndexSink {
    type Batch<'a>: IndexBatch
    where
        Self: 'a;

    fn index_name(&self) -> &str;

    /// Flushes every `flush_size` upserts. Dropping the batch without
    /// [`IndexBatch::end_batch`] discards what was not flushed yet.
    fn begin_batch(&self, flush_size: usize) -> Result<Self::Batch<'_>>;
}

pub trait IndexBatch {
    /// Idempotent by document id
    fn add_upsert(&mut self, document: IndexDocument) -> Result<()>;

    /// Flush the remainder and publish
    fn end_batch(self) -> Result<BatchStats>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub upserted: usize,
    pub flushes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_window() {
        let window = ChangeWindow::new(1_000, Boundary::Inclusive);
        assert!(window.contains(1_000));
        assert!(window.contains(1_001));
        assert!(!window.contains(999));
    }

    #[test]
    fn test_exclusive_window() {
        let window = ChangeWindow::new(1_000, Boundary::Exclusive);
        assert!(!window.contains(1_000));
        assert!(window.contains(1_001));
    }

    #[test]
    fn test_zero_checkpoint_is_always_inclusive() {
        let window = ChangeWindow::new(0, Boundary::Exclusive);
        assert!(window.is_inclusive());
        assert!(window.contains(0));
    }

    #[test]
    fn test_boundary_serde() {
        let boundary: Boundary = serde_json::from_str("\"exclusive\"").unwrap();
        assert_eq!(boundary, Boundary::Exclusive);
        assert_eq!(Boundary::default(), Boundary::Inclusive);
    }
}
