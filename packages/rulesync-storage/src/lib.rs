//! rulesync-storage - System of record
//!
//! SQLite-backed stores for the entities mirrored into the search index,
//! plus the organization use cases and schema migrations that share the
//! same database.
//!
//! ## Layout
//!
//! - `domain`: entities (`Rule`, `Organization`)
//! - `infrastructure::sqlite`: `Database`, rule/organization stores, migrations
//! - `application`: organization create / delete / search
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rulesync_storage::{Database, SqliteRuleStore};
//!
//! let db = Database::open("data/rules.db")?;
//! let store = SqliteRuleStore::new(db);
//!
//! // Lazy, paged scan of everything modified since the last pass
//! for rule in store.rules_updated_since(checkpoint, true)? {
//!     let rule = rule?;
//!     println!("{} @ {}", rule.key, rule.updated_at);
//! }
//! ```

pub mod domain;
pub mod error;

#[cfg(feature = "sqlite")]
pub mod application;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{EpochMillis, Organization, Rule, RuleKey, RuleStatus, RuleType, Severity};

#[cfg(feature = "sqlite")]
pub use application::{
    CreateOrganization, FixedSession, OrganizationPage, OrganizationService, UserSession,
};
#[cfg(feature = "sqlite")]
pub use infrastructure::{
    Database, DeletePermissionShareDashboard, Migration, MigrationRunner, RuleCursor,
    SqliteOrganizationStore, SqliteRuleStore,
};
