//! SQLite adapter
//!
//! One [`Database`] handle is shared by every store; each store locks the
//! connection per statement (or per transaction), never across calls.

pub mod migrations;
pub mod organization_store;
pub mod rule_store;

pub use migrations::{DeletePermissionShareDashboard, Migration, MigrationRunner};
pub use organization_store::SqliteOrganizationStore;
pub use rule_store::{RuleCursor, SqliteRuleStore, DEFAULT_PAGE_SIZE};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::{Result, StorageError};

/// Tables created by [`Database::open`]
const TABLES: &[&str] = &[
    "rules",
    "organizations",
    "group_roles",
    "user_roles",
    "schema_migrations",
];

/// Shared SQLite connection
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        debug!("Opened SQLite database at {}", db_path.display());
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::database("SQLite connection lock poisoned"))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rules (
                rule_key TEXT PRIMARY KEY,
                repository TEXT NOT NULL,
                rule TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                severity TEXT,
                status TEXT NOT NULL,
                language TEXT,
                rule_type TEXT NOT NULL,
                is_template BOOLEAN NOT NULL DEFAULT 0,
                template_key TEXT,
                tags TEXT,
                system_tags TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_rules_updated_at ON rules(updated_at);

            CREATE TABLE IF NOT EXISTS organizations (
                uuid TEXT PRIMARY KEY,
                kee TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT,
                url TEXT,
                avatar_url TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_organizations_created_at
                ON organizations(created_at);

            CREATE TABLE IF NOT EXISTS group_roles (
                id INTEGER PRIMARY KEY,
                group_id INTEGER,
                resource_id INTEGER,
                role TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_roles (
                id INTEGER PRIMARY KEY,
                user_id INTEGER,
                resource_id INTEGER,
                role TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            );",
        )?;

        Ok(())
    }

    /// Row count of one of the schema tables
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        if !TABLES.contains(&table) {
            return Err(StorageError::invalid_argument(format!(
                "Unknown table '{}'",
                table
            )));
        }
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    /// Run `f` inside one transaction; rolled back when `f` fails.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Execute a raw statement (fixtures, maintenance)
    pub fn execute(&self, sql: &str, params: impl rusqlite::Params) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute(sql, params)?)
    }
}
