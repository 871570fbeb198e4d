//! Schema migrations
//!
//! Each [`Migration`] runs in its own transaction and is recorded in
//! `schema_migrations`, so [`MigrationRunner::run`] only applies pending ones.
use chrono::Utc;
use rusqlite::{params, Transaction};
use std::collections::HashSet;
use tracing::info;

use super::Database;
use crate::error::{Result, StorageError};

/// A versioned, one-shot schema/data change
pub trait Migration: Send + Sync {
    fn version(&self) -> i64;

    fn description(&self) -> &str;

    fn execute(&self, tx: &Transaction<'_>) -> Result<()>;
}

/// Deletes the obsolete `shareDashboard` permission from group and user roles.
pub struct DeletePermissionShareDashboard;

impl Migration for DeletePermissionShareDashboard {
    fn version(&self) -> i64 {
        1_462
    }

    fn description(&self) -> &str {
        "Delete permission shareDashboard"
    }

    fn execute(&self, tx: &Transaction<'_>) -> Result<()> {
        let groups = tx.execute(
            "DELETE FROM group_roles WHERE role = ?1",
            params!["shareDashboard"],
        )?;
        let users = tx.execute(
            "DELETE FROM user_roles WHERE role = ?1",
            params!["shareDashboard"],
        )?;
        info!(
            "Deleted shareDashboard permission: {} group roles, {} user roles",
            groups, users
        );
        Ok(())
    }
}

/// Applies registered migrations in version order
pub struct MigrationRunner {
    db: Database,
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRunner {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            migrations: Vec::new(),
        }
    }

    /// Runner with every migration shipped in this crate
    pub fn with_builtin(db: Database) -> Self {
        Self::new(db).register(Box::new(DeletePermissionShareDashboard))
    }

    pub fn register(mut self, migration: Box<dyn Migration>) -> Self {
        self.migrations.push(migration);
        self.migrations.sort_by_key(|m| m.version());
        self
    }

    /// Versions already recorded as applied
    pub fn applied_versions(&self) -> Result<HashSet<i64>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
        let versions = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(versions)
    }

    /// Apply pending migrations; returns the versions applied by this call.
    pub fn run(&self) -> Result<Vec<i64>> {
        let applied = self.applied_versions()?;
        let mut newly_applied = Vec::new();

        for migration in &self.migrations {
            let version = migration.version();
            if applied.contains(&version) {
                continue;
            }

            self.db
                .with_transaction(|tx| {
                    migration.execute(tx)?;
                    tx.execute(
                        "INSERT INTO schema_migrations (version, description, applied_at)
                         VALUES (?1, ?2, ?3)",
                        params![version, migration.description(), Utc::now().timestamp_millis()],
                    )?;
                    Ok(())
                })
                .map_err(|e| {
                    StorageError::migration(format!(
                        "Migration {} ({}) failed: {}",
                        version,
                        migration.description(),
                        e.message
                    ))
                    .with_source(e)
                })?;

            info!("Applied migration {}: {}", version, migration.description());
            newly_applied.push(version);
        }

        Ok(newly_applied)
    }
}
