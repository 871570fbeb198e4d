//! Rule index on disk: bulk upsert, reopen, field queries

use rulesync_index::{
    IndexDocument, RuleIndexDefinition as R, SearchIndex, SearchRequest, MIN_WRITER_HEAP_BYTES,
};
use serde_json::json;
use tempfile::TempDir;

fn rule_doc(repo: &str, rule: &str, name: &str, severity: &str, tags: &[&str]) -> IndexDocument {
    IndexDocument::new(format!("{}:{}", repo, rule), repo)
        .with_field(R::FIELD_KEY, format!("{}:{}", repo, rule))
        .with_field(R::FIELD_REPOSITORY, repo)
        .with_field(R::FIELD_RULE_KEY, rule)
        .with_field(R::FIELD_NAME, name)
        .with_field(R::FIELD_SEVERITY, severity)
        .with_field(R::FIELD_STATUS, "READY")
        .with_field(R::FIELD_IS_TEMPLATE, false)
        .with_field(R::FIELD_TAGS, json!(tags))
        .with_field(R::FIELD_TYPE, "CODE_SMELL")
        .with_field(R::FIELD_CREATED_AT, 1_000)
        .with_field(R::FIELD_UPDATED_AT, 2_000)
}

fn fixture() -> Vec<IndexDocument> {
    vec![
        rule_doc("squid", "S1067", "Expressions should not be too complex", "CRITICAL", &["brain-overload"]),
        rule_doc("squid", "S00100", "Method names should comply with a naming convention", "MINOR", &["convention"]),
        rule_doc("python", "S101", "Class names should comply with a naming convention", "MINOR", &["convention", "pep"]),
    ]
}

#[test]
fn test_rule_documents_roundtrip_and_query() {
    let temp_dir = TempDir::new().unwrap();
    let index =
        SearchIndex::open_or_create(temp_dir.path(), R::definition(), MIN_WRITER_HEAP_BYTES)
            .unwrap();

    let mut bulk = index.bulk(2).unwrap();
    for doc in fixture() {
        bulk.add(&doc).unwrap();
    }
    let stats = bulk.stop().unwrap();
    assert_eq!(stats.added, 3);
    assert_eq!(stats.flushes, 2);

    assert_eq!(index.get("squid:S1067").unwrap(), Some(fixture().remove(0)));

    let minor = index.search(&SearchRequest::new("severity:MINOR")).unwrap();
    assert_eq!(minor.total, 2);

    let convention_in_squid = index
        .search(&SearchRequest::new("tags:convention").with_routing("squid"))
        .unwrap();
    assert_eq!(convention_in_squid.total, 1);
    assert_eq!(convention_in_squid.hits[0].document.id, "squid:S00100");

    let naming = index.search(&SearchRequest::new("name:naming")).unwrap();
    assert_eq!(naming.total, 2);
}

#[test]
fn test_reopened_index_keeps_documents() {
    let temp_dir = TempDir::new().unwrap();
    {
        let index =
            SearchIndex::open_or_create(temp_dir.path(), R::definition(), MIN_WRITER_HEAP_BYTES)
                .unwrap();
        let mut bulk = index.bulk(500).unwrap();
        for doc in fixture() {
            bulk.add(&doc).unwrap();
        }
        bulk.stop().unwrap();
    }

    let index =
        SearchIndex::open_or_create(temp_dir.path(), R::definition(), MIN_WRITER_HEAP_BYTES)
            .unwrap();
    assert_eq!(index.num_docs(), 3);
    assert_eq!(
        index.search(&SearchRequest::all().with_routing("python")).unwrap().total,
        1
    );
}
