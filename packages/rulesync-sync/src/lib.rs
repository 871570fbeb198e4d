/*
 * rulesync - Incremental Index Synchronization
 *
 * Keeps a search index in step with a system of record by re-reading only
 * what changed since the last pass.
 *
 * Architecture:
 * - Ports (RecordSource / DocumentMapper / IndexSink)
 * - ChangeFeedSynchronizer (one pass, checkpoint in / checkpoint out)
 * - SyncJob (checkpoint persistence, pass serialization)
 * - Adapters (SQLite rule store, Tantivy index)
 * - Config (versioned YAML)
 */

// Public modules
pub mod adapters;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod job;
pub mod memory;
pub mod ports;
pub mod rules;
pub mod synchronizer;

// Re-exports
pub use checkpoint::{
    CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, PersistedCheckpoint,
};
pub use config::{ConfigError, RulesyncConfig};
pub use error::{Result, SyncError};
pub use job::{PassStatus, SyncJob};
pub use memory::{MemoryIndex, MemorySource, Stamped, StampedRecord, StampedRecordMapper};
pub use ports::{
    BatchStats, Boundary, ChangeWindow, DocumentMapper, IndexBatch, IndexSink, RecordSource,
};
pub use rules::{RuleDocumentMapper, RuleIndexer};
pub use synchronizer::{ChangeFeedSynchronizer, SyncOptions, SyncOutcome, DEFAULT_BATCH_SIZE};
