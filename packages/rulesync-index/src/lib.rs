//! rulesync-index - Search store
//!
//! Tantivy-backed document index with bulk upsert by id.
//!
//! # Usage
//!
//! ```text
//! use rulesync_index::{IndexDocument, RuleIndexDefinition, SearchIndex, SearchRequest};
//!
//! let index = SearchIndex::open_or_create("data/index", RuleIndexDefinition::definition(), heap)?;
//!
//! let mut bulk = index.bulk(500)?;
//! bulk.add(&IndexDocument::new("squid:S1067", "squid").with_field("name", "Too complex"))?;
//! bulk.stop()?;
//!
//! let results = index.search(&SearchRequest::new("complex").with_routing("squid"))?;
//! ```

pub mod document;
pub mod error;
pub mod rules;
pub mod schema;
pub mod search_index;

pub use document::IndexDocument;
pub use error::{IndexError, Result};
pub use rules::RuleIndexDefinition;
pub use schema::{FieldKind, FieldSpec, IndexDefinition, SchemaFields, FIELD_ID, FIELD_ROUTING};
pub use search_index::{
    BulkIndexer, BulkStats, SearchHit, SearchIndex, SearchRequest, SearchResults,
    DEFAULT_SEARCH_LIMIT, DEFAULT_WRITER_HEAP_BYTES, MIN_WRITER_HEAP_BYTES,
};
