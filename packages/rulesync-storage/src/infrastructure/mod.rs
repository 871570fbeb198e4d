//! Infrastructure layer - Storage adapters

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{
    Database, DeletePermissionShareDashboard, Migration, MigrationRunner, RuleCursor,
    SqliteOrganizationStore, SqliteRuleStore,
};
