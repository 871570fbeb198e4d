//! SQLite Rule Store
//!
//! System of record for coding rules. Incremental readers page through
//! `rules_updated_since()` with a lazy [`RuleCursor`].
use rusqlite::{params, OptionalExtension, Row};
use std::collections::VecDeque;
use tracing::debug;

use super::Database;
use crate::domain::models::{EpochMillis, Rule, RuleKey, RuleStatus, RuleType, Severity};
use crate::error::Result;

/// Rows fetched per cursor page
pub const DEFAULT_PAGE_SIZE: usize = 500;

const RULE_COLUMNS: &str = "rowid, repository, rule, name, description, severity, status, \
     language, rule_type, is_template, template_key, tags, system_tags, created_at, updated_at";

const UPSERT_RULE: &str = "INSERT INTO rules
     (rule_key, repository, rule, name, description, severity, status, language, rule_type,
      is_template, template_key, tags, system_tags, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
     ON CONFLICT(rule_key) DO UPDATE SET
        name = excluded.name,
        description = excluded.description,
        severity = excluded.severity,
        status = excluded.status,
        language = excluded.language,
        rule_type = excluded.rule_type,
        is_template = excluded.is_template,
        template_key = excluded.template_key,
        tags = excluded.tags,
        system_tags = excluded.system_tags,
        created_at = excluded.created_at,
        updated_at = excluded.updated_at";

/// SQLite-based rule store
#[derive(Clone)]
pub struct SqliteRuleStore {
    db: Database,
    page_size: usize,
}

impl SqliteRuleStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the cursor page size (clamped to at least 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert or update a rule by key
    pub fn upsert_rule(&self, rule: &Rule) -> Result<()> {
        let conn = self.db.lock()?;
        execute_upsert(&conn, rule)?;
        Ok(())
    }

    /// Insert or update multiple rules in a transaction
    pub fn upsert_rules(&self, rules: &[Rule]) -> Result<()> {
        self.db.with_transaction(|tx| {
            for rule in rules {
                execute_upsert(tx, rule)?;
            }
            Ok(())
        })?;
        debug!("Upserted {} rules", rules.len());
        Ok(())
    }

    pub fn get_rule(&self, key: &RuleKey) -> Result<Option<Rule>> {
        let conn = self.db.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM rules WHERE rule_key = ?1", RULE_COLUMNS),
                params![key.to_string()],
                RuleRow::from_row,
            )
            .optional()?;
        row.map(RuleRow::into_rule).transpose()
    }

    pub fn count_rules(&self) -> Result<usize> {
        self.db.count_rows("rules")
    }

    /// Lazy cursor over rules with `updated_at >= since` (or `> since` when
    /// `inclusive` is false). Order is unspecified.
    pub fn rules_updated_since(&self, since: EpochMillis, inclusive: bool) -> Result<RuleCursor> {
        Ok(RuleCursor {
            db: self.db.clone(),
            since,
            inclusive,
            page_size: self.page_size,
            last_rowid: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
        })
    }
}

fn execute_upsert(conn: &rusqlite::Connection, rule: &Rule) -> Result<()> {
    conn.execute(
        UPSERT_RULE,
        params![
            rule.key.to_string(),
            &rule.key.repository,
            &rule.key.rule,
            &rule.name,
            &rule.description,
            rule.severity.map(|s| s.as_str()),
            rule.status.as_str(),
            &rule.language,
            rule.rule_type.as_str(),
            rule.is_template,
            rule.template_key.as_ref().map(|k| k.to_string()),
            serde_json::to_string(&rule.tags)?,
            serde_json::to_string(&rule.system_tags)?,
            rule.created_at,
            rule.updated_at,
        ],
    )?;
    Ok(())
}

/// Raw column values; enum/JSON decoding happens outside the row closure so
/// that decoding errors surface as `StorageError`.
struct RuleRow {
    rowid: i64,
    repository: String,
    rule: String,
    name: String,
    description: Option<String>,
    severity: Option<String>,
    status: String,
    language: Option<String>,
    rule_type: String,
    is_template: bool,
    template_key: Option<String>,
    tags: Option<String>,
    system_tags: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl RuleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            rowid: row.get(0)?,
            repository: row.get(1)?,
            rule: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            severity: row.get(5)?,
            status: row.get(6)?,
            language: row.get(7)?,
            rule_type: row.get(8)?,
            is_template: row.get(9)?,
            template_key: row.get(10)?,
            tags: row.get(11)?,
            system_tags: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn into_rule(self) -> Result<Rule> {
        Ok(Rule {
            key: RuleKey::new(self.repository, self.rule),
            name: self.name,
            description: self.description,
            severity: self
                .severity
                .as_deref()
                .map(str::parse::<Severity>)
                .transpose()?,
            status: self.status.parse::<RuleStatus>()?,
            language: self.language,
            rule_type: self.rule_type.parse::<RuleType>()?,
            is_template: self.is_template,
            template_key: self
                .template_key
                .as_deref()
                .map(str::parse::<RuleKey>)
                .transpose()?,
            tags: decode_tags(self.tags)?,
            system_tags: decode_tags(self.system_tags)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn decode_tags(raw: Option<String>) -> Result<Vec<String>> {
    match raw {
        Some(s) if !s.is_empty() => Ok(serde_json::from_str(&s)?),
        _ => Ok(Vec::new()),
    }
}

/// Lazy, one-shot cursor over changed rules.
///
/// Pages by rowid (keyset pagination), so at most one page is held in memory
/// and the connection lock is only taken while a page is fetched. The cursor
/// stops after the first error.
pub struct RuleCursor {
    db: Database,
    since: EpochMillis,
    inclusive: bool,
    page_size: usize,
    last_rowid: i64,
    buffer: VecDeque<Rule>,
    exhausted: bool,
    pages_fetched: usize,
}

impl RuleCursor {
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn fetch_page(&mut self) -> Result<()> {
        let comparison = if self.inclusive { ">=" } else { ">" };
        let rows = {
            let conn = self.db.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM rules WHERE updated_at {} ?1 AND rowid > ?2 ORDER BY rowid LIMIT ?3",
                RULE_COLUMNS, comparison
            ))?;
            let rows = stmt
                .query_map(
                    params![self.since, self.last_rowid, self.page_size as i64],
                    RuleRow::from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        self.pages_fetched += 1;
        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        for row in rows {
            self.last_rowid = row.rowid;
            self.buffer.push_back(row.into_rule()?);
        }
        Ok(())
    }
}

impl Iterator for RuleCursor {
    type Item = Result<Rule>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                self.buffer.clear();
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
