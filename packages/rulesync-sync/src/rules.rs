//! Rule indexing
//!
//! `SqliteRuleStore → RuleDocumentMapper → SearchIndex`, driven by a
//! [`SyncJob`] so the checkpoint survives restarts.

use rulesync_index::{IndexDocument, RuleIndexDefinition as R, SearchIndex};
use rulesync_storage::{EpochMillis, Rule, SqliteRuleStore};
use serde_json::json;
use std::collections::BTreeSet;

use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::job::SyncJob;
use crate::ports::DocumentMapper;
use crate::synchronizer::{ChangeFeedSynchronizer, SyncOptions, SyncOutcome};

/// Projects a [`Rule`] into the `rules` index.
///
/// Document id is the rule key (`repo:rule`), routed by repository. `tags`
/// is the sorted union of user and system tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleDocumentMapper;

impl DocumentMapper<Rule> for RuleDocumentMapper {
    fn updated_at(&self, rule: &Rule) -> EpochMillis {
        rule.updated_at
    }

    fn to_document(&self, rule: &Rule) -> Result<IndexDocument> {
        let key = rule.key.to_string();
        let tags: BTreeSet<&str> = rule
            .tags
            .iter()
            .chain(rule.system_tags.iter())
            .map(String::as_str)
            .collect();

        Ok(IndexDocument::new(&key, &rule.key.repository)
            .with_field(R::FIELD_KEY, key)
            .with_field(R::FIELD_REPOSITORY, rule.key.repository.as_str())
            .with_field(R::FIELD_RULE_KEY, rule.key.rule.as_str())
            .with_field(R::FIELD_NAME, rule.name.as_str())
            .with_optional_field(R::FIELD_HTML_DESCRIPTION, rule.description.clone())
            .with_optional_field(R::FIELD_SEVERITY, rule.severity.map(|s| s.as_str()))
            .with_field(R::FIELD_STATUS, rule.status.as_str())
            .with_optional_field(R::FIELD_LANGUAGE, rule.language.clone())
            .with_field(R::FIELD_IS_TEMPLATE, rule.is_template)
            .with_optional_field(
                R::FIELD_TEMPLATE_KEY,
                rule.template_key.as_ref().map(|k| k.to_string()),
            )
            .with_field(R::FIELD_TAGS, json!(tags))
            .with_field(R::FIELD_TYPE, rule.rule_type.as_str())
            .with_field(R::FIELD_CREATED_AT, rule.created_at)
            .with_field(R::FIELD_UPDATED_AT, rule.updated_at))
    }

    fn is_tombstone(&self, rule: &Rule) -> bool {
        rule.is_removed()
    }
}

/// Incremental indexer of the `rules` index
pub struct RuleIndexer<C> {
    job: SyncJob<SqliteRuleStore, RuleDocumentMapper, SearchIndex, C>,
}

impl<C: CheckpointStore> RuleIndexer<C> {
    pub fn new(
        store: SqliteRuleStore,
        index: SearchIndex,
        checkpoints: C,
        options: SyncOptions,
    ) -> Self {
        let synchronizer = ChangeFeedSynchronizer::new(store, RuleDocumentMapper, index, options);
        Self {
            job: SyncJob::new(synchronizer, checkpoints),
        }
    }

    /// One scheduled pass from the persisted checkpoint
    pub fn index(&self) -> Result<SyncOutcome> {
        self.job.run_once()
    }

    /// Index explicit rules; the persisted checkpoint is not touched.
    pub fn index_rules<I>(&self, rules: I) -> Result<SyncOutcome>
    where
        I: IntoIterator<Item = Rule>,
    {
        self.job.run_records(rules)
    }

    pub fn search_index(&self) -> &SearchIndex {
        self.job.synchronizer().sink()
    }

    pub fn rule_store(&self) -> &SqliteRuleStore {
        self.job.synchronizer().source()
    }

    pub fn job(&self) -> &SyncJob<SqliteRuleStore, RuleDocumentMapper, SearchIndex, C> {
        &self.job
    }
}
