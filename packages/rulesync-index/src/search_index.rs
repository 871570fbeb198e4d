//! Tantivy Search Index
//!
//! # Architecture
//!
//! ```text
//! IndexDocument → BulkIndexer (delete _id + add) → IndexWriter → Tantivy Index
//!                       │ commit every flush_size docs
//!                       ↓
//!                 IndexReader (reloaded on stop) → get / search
//! ```
//!
//! One [`BulkIndexer`] at a time: it holds the writer lock until it is
//! stopped or dropped. Dropping it without `stop()` rolls back whatever was
//! added since the last flush.
//!
//! [`SearchIndex::open_reader`] opens an index without a writer, so it can be
//! queried while another process holds the directory lock.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tantivy::{
    collector::{Count, TopDocs},
    directory::MmapDirectory,
    query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery},
    schema::IndexRecordOption,
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};
use tracing::{debug, info, warn};

use crate::document::IndexDocument;
use crate::error::{IndexError, Result};
use crate::schema::{IndexDefinition, SchemaFields};

/// Default writer heap (50MB)
pub const DEFAULT_WRITER_HEAP_BYTES: usize = 50_000_000;

/// Smallest heap Tantivy accepts for one indexing thread
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Tantivy-backed search index for one [`IndexDefinition`]
pub struct SearchIndex {
    definition: IndexDefinition,
    index: Index,
    fields: SchemaFields,
    /// `None` for read-only instances
    writer: Option<Mutex<IndexWriter>>,
    reader: IndexReader,
}

impl SearchIndex {
    /// Create a new index in `dir` (fails if one already exists there)
    pub fn create_in_dir(
        dir: impl AsRef<Path>,
        definition: IndexDefinition,
        writer_heap_bytes: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let fields = SchemaFields::build(&definition)?;
        let index = Index::create_in_dir(dir, fields.schema.clone())?;
        info!("Created index '{}' in {}", definition.name, dir.display());
        Self::from_index(index, definition, fields, writer_heap_bytes)
    }

    /// Open the index in `dir`, creating it when the directory holds none.
    /// Fails when an existing index has a different schema.
    pub fn open_or_create(
        dir: impl AsRef<Path>,
        definition: IndexDefinition,
        writer_heap_bytes: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let fields = SchemaFields::build(&definition)?;
        let directory = MmapDirectory::open(dir).map_err(|e| {
            IndexError::internal(format!("Failed to open index dir {}: {}", dir.display(), e))
        })?;
        let index = Index::open_or_create(directory, fields.schema.clone())?;
        debug!("Opened index '{}' in {}", definition.name, dir.display());
        Self::from_index(index, definition, fields, writer_heap_bytes)
    }

    /// Open an existing index in `dir` for queries only. No writer is
    /// created, so this works while another instance is indexing.
    pub fn open_reader(dir: impl AsRef<Path>, definition: IndexDefinition) -> Result<Self> {
        let dir = dir.as_ref();
        let fields = SchemaFields::build(&definition)?;
        let index = Index::open_in_dir(dir)?;
        if index.schema() != fields.schema {
            return Err(IndexError::invalid_input(format!(
                "Index in {} does not match definition '{}'",
                dir.display(),
                definition.name
            )));
        }

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        debug!("Opened index '{}' read-only in {}", definition.name, dir.display());

        Ok(Self {
            definition,
            index,
            fields,
            writer: None,
            reader,
        })
    }

    /// In-memory index (for testing)
    pub fn create_in_ram(definition: IndexDefinition) -> Result<Self> {
        let fields = SchemaFields::build(&definition)?;
        let index = Index::create_in_ram(fields.schema.clone());
        Self::from_index(index, definition, fields, MIN_WRITER_HEAP_BYTES)
    }

    fn from_index(
        index: Index,
        definition: IndexDefinition,
        fields: SchemaFields,
        writer_heap_bytes: usize,
    ) -> Result<Self> {
        let writer: IndexWriter = index.writer(writer_heap_bytes)?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            definition,
            index,
            fields,
            writer: Some(Mutex::new(writer)),
            reader,
        })
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }

    /// Pick up commits made since the last reload (by this or another
    /// instance).
    pub fn refresh(&self) -> Result<()> {
        Ok(self.reader.reload()?)
    }

    /// Start a bulk upsert; commits every `flush_size` documents (min 1).
    pub fn bulk(&self, flush_size: usize) -> Result<BulkIndexer<'_>> {
        let Some(writer) = &self.writer else {
            return Err(IndexError::invalid_input(format!(
                "Index '{}' is open read-only",
                self.name()
            )));
        };
        let writer = writer
            .lock()
            .map_err(|e| IndexError::internal(format!("Failed to acquire writer lock: {}", e)))?;

        Ok(BulkIndexer {
            index: self,
            writer,
            flush_size: flush_size.max(1),
            pending: 0,
            poisoned: false,
            stats: BulkStats::default(),
            started: Instant::now(),
            finished: false,
        })
    }

    /// Live documents visible to the reader
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Fetch one document by id
    pub fn get(&self, id: &str) -> Result<Option<IndexDocument>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(self.fields.id, id),
            IndexRecordOption::Basic,
        );

        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top_docs.into_iter().next() {
            Some((_, address)) => {
                let doc: TantivyDocument = searcher.doc(address)?;
                Ok(Some(IndexDocument::from_tantivy(&doc, &self.fields)?))
            }
            None => Ok(None),
        }
    }

    /// Search (BM25). An empty query (or `*`) matches every document.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        if request.limit == 0 {
            return Err(IndexError::invalid_input("Search limit must be greater than 0"));
        }

        let text = request.query.trim();
        let mut query: Box<dyn Query> = if text.is_empty() || text == "*" {
            Box::new(AllQuery)
        } else {
            let parser = QueryParser::for_index(&self.index, self.fields.searchable_fields());
            parser
                .parse_query(text)
                .map_err(|e| IndexError::QueryParse {
                    query: text.to_string(),
                    message: e.to_string(),
                })?
        };

        if let Some(routing) = &request.routing {
            let routing_query: Box<dyn Query> = Box::new(TermQuery::new(
                Term::from_field_text(self.fields.routing, routing),
                IndexRecordOption::Basic,
            ));
            query = Box::new(BooleanQuery::new(vec![
                (Occur::Must, query),
                (Occur::Must, routing_query),
            ]));
        }

        let searcher = self.reader.searcher();
        let (top_docs, total) =
            searcher.search(&*query, &(TopDocs::with_limit(request.limit), Count))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push(SearchHit {
                score,
                document: IndexDocument::from_tantivy(&doc, &self.fields)?,
            });
        }

        Ok(SearchResults { total, hits })
    }
}

/// Search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Tantivy query syntax, e.g. `severity:MAJOR AND name:complex`
    pub query: String,
    /// Restrict to one partition
    pub routing: Option<String>,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            routing: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn all() -> Self {
        Self::new("")
    }

    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Search result hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub document: IndexDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Total matches (not capped by the limit)
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

/// Counters of one bulk run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkStats {
    /// Documents upserted
    pub added: usize,
    /// Commits performed
    pub flushes: usize,
}

/// Bulk upsert session; see the module docs for commit/rollback rules.
pub struct BulkIndexer<'a> {
    index: &'a SearchIndex,
    writer: MutexGuard<'a, IndexWriter>,
    flush_size: usize,
    /// Uncommitted upserts, counted before the writer is touched
    pending: usize,
    /// Set when the writer failed mid-upsert; only rollback is safe then
    poisoned: bool,
    stats: BulkStats,
    started: Instant,
    finished: bool,
}

impl<'a> BulkIndexer<'a> {
    /// Upsert one document (delete by `_id`, then add)
    pub fn add(&mut self, document: &IndexDocument) -> Result<()> {
        self.check_usable()?;
        let doc = document.to_tantivy(&self.index.fields)?;

        self.pending += 1;
        self.writer
            .delete_term(Term::from_field_text(self.index.fields.id, &document.id));
        if let Err(e) = self.writer.add_document(doc) {
            // The delete is queued without its replacement
            self.poisoned = true;
            return Err(e.into());
        }
        self.stats.added += 1;

        if self.pending >= self.flush_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.commit()?;
        self.stats.flushes += 1;
        debug!(
            "Flushed {} documents into '{}'",
            self.pending,
            self.index.name()
        );
        self.pending = 0;
        Ok(())
    }

    fn check_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(IndexError::internal(format!(
                "Bulk indexing into '{}' failed earlier, discard it",
                self.index.name()
            )));
        }
        Ok(())
    }

    /// Commit the remainder and make everything visible to readers.
    /// Fails without committing if an earlier `add` broke the writer.
    pub fn stop(mut self) -> Result<BulkStats> {
        self.check_usable()?;
        if self.pending > 0 {
            self.flush()?;
        }
        self.finished = true;
        self.index.reader.reload()?;

        info!(
            "Bulk indexing into '{}' done: {} documents, {} flushes in {}ms",
            self.index.name(),
            self.stats.added,
            self.stats.flushes,
            self.started.elapsed().as_millis()
        );
        Ok(self.stats)
    }
}

impl Drop for BulkIndexer<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.pending > 0 {
            warn!(
                "Bulk indexing into '{}' aborted, rolling back {} documents",
                self.index.name(),
                self.pending
            );
            if let Err(e) = self.writer.rollback() {
                warn!("Rollback of '{}' failed: {}", self.index.name(), e);
            }
        }
        // Earlier flushes are committed; expose them
        if let Err(e) = self.index.reader.reload() {
            warn!("Reader reload of '{}' failed: {}", self.index.name(), e);
        }
    }
}
