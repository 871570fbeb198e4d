//! Storage Domain Models
//!
//! - `Rule`: coding rule, the system-of-record entity mirrored into the search index
//! - `Organization`: tenant owning projects and quality profiles
//!
//! Timestamps are epoch milliseconds, as persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StorageError};

/// Epoch milliseconds
pub type EpochMillis = i64;

// ═══════════════════════════════════════════════════════════════════════════
// Rule
// ═══════════════════════════════════════════════════════════════════════════

/// Rule key: `"<repository>:<rule>"`, e.g. `"squid:S1067"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    pub repository: String,
    pub rule: String,
}

impl RuleKey {
    pub fn new(repository: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.rule)
    }
}

impl FromStr for RuleKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((repository, rule)) if !repository.is_empty() && !rule.is_empty() => {
                Ok(Self::new(repository, rule))
            }
            _ => Err(StorageError::invalid_argument(format!(
                "Invalid rule key '{}': expected '<repository>:<rule>'",
                s
            ))),
        }
    }
}

/// Rule lifecycle status. `Removed` rules are kept as rows (tombstones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Ready,
    Beta,
    Deprecated,
    Removed,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Ready => "READY",
            RuleStatus::Beta => "BETA",
            RuleStatus::Deprecated => "DEPRECATED",
            RuleStatus::Removed => "REMOVED",
        }
    }
}

impl FromStr for RuleStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "READY" => Ok(RuleStatus::Ready),
            "BETA" => Ok(RuleStatus::Beta),
            "DEPRECATED" => Ok(RuleStatus::Deprecated),
            "REMOVED" => Ok(RuleStatus::Removed),
            _ => Err(StorageError::serialization(format!(
                "Invalid rule status: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    CodeSmell,
    Bug,
    Vulnerability,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::CodeSmell => "CODE_SMELL",
            RuleType::Bug => "BUG",
            RuleType::Vulnerability => "VULNERABILITY",
        }
    }
}

impl FromStr for RuleType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CODE_SMELL" => Ok(RuleType::CodeSmell),
            "BUG" => Ok(RuleType::Bug),
            "VULNERABILITY" => Ok(RuleType::Vulnerability),
            _ => Err(StorageError::serialization(format!("Invalid rule type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Critical => "CRITICAL",
            Severity::Blocker => "BLOCKER",
        }
    }
}

impl FromStr for Severity {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INFO" => Ok(Severity::Info),
            "MINOR" => Ok(Severity::Minor),
            "MAJOR" => Ok(Severity::Major),
            "CRITICAL" => Ok(Severity::Critical),
            "BLOCKER" => Ok(Severity::Blocker),
            _ => Err(StorageError::serialization(format!("Invalid severity: {}", s))),
        }
    }
}

/// Rule Entity (system of record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule key (primary key)
    pub key: RuleKey,

    /// Display name
    pub name: String,

    /// HTML description
    pub description: Option<String>,

    /// Default severity
    pub severity: Option<Severity>,

    pub status: RuleStatus,

    /// Language key (e.g. "java", "py")
    pub language: Option<String>,

    pub rule_type: RuleType,

    pub is_template: bool,

    /// Template this rule was instantiated from
    pub template_key: Option<RuleKey>,

    /// User-defined tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Tags provided by the rule repository
    #[serde(default)]
    pub system_tags: Vec<String>,

    pub created_at: EpochMillis,

    /// Last modification, drives incremental indexing
    pub updated_at: EpochMillis,
}

impl Rule {
    /// Create a `READY` code-smell rule with no optional attributes.
    pub fn new(key: RuleKey, name: impl Into<String>, updated_at: EpochMillis) -> Self {
        Self {
            key,
            name: name.into(),
            description: None,
            severity: None,
            status: RuleStatus::Ready,
            language: None,
            rule_type: RuleType::CodeSmell,
            is_template: false,
            template_key: None,
            tags: Vec::new(),
            system_tags: Vec::new(),
            created_at: updated_at,
            updated_at,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.status == RuleStatus::Removed
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Organization
// ═══════════════════════════════════════════════════════════════════════════

/// Organization Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization uuid (primary key)
    pub uuid: String,

    /// Unique slug
    pub key: String,

    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: EpochMillis,
    pub updated_at: EpochMillis,
}
