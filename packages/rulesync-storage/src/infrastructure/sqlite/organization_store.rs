//! SQLite Organization Store
use rusqlite::{params, OptionalExtension, Row};

use super::Database;
use crate::domain::models::Organization;
use crate::error::Result;

const ORGANIZATION_COLUMNS: &str =
    "uuid, kee, name, description, url, avatar_url, created_at, updated_at";

/// SQLite-based organization store
#[derive(Clone)]
pub struct SqliteOrganizationStore {
    db: Database,
}

impl SqliteOrganizationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, org: &Organization) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO organizations (uuid, kee, name, description, url, avatar_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &org.uuid,
                &org.key,
                &org.name,
                &org.description,
                &org.url,
                &org.avatar_url,
                org.created_at,
                org.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn select_by_key(&self, key: &str) -> Result<Option<Organization>> {
        self.select_one("kee", key)
    }

    pub fn select_by_uuid(&self, uuid: &str) -> Result<Option<Organization>> {
        self.select_one("uuid", uuid)
    }

    fn select_one(&self, column: &'static str, value: &str) -> Result<Option<Organization>> {
        let conn = self.db.lock()?;
        let org = conn
            .query_row(
                &format!(
                    "SELECT {} FROM organizations WHERE {} = ?1",
                    ORGANIZATION_COLUMNS, column
                ),
                params![value],
                row_to_organization,
            )
            .optional()?;
        Ok(org)
    }

    /// Returns the number of deleted rows (0 or 1)
    pub fn delete_by_uuid(&self, uuid: &str) -> Result<usize> {
        let conn = self.db.lock()?;
        Ok(conn.execute("DELETE FROM organizations WHERE uuid = ?1", params![uuid])?)
    }

    /// Returns the number of deleted rows (0 or 1)
    pub fn delete_by_key(&self, key: &str) -> Result<usize> {
        let conn = self.db.lock()?;
        Ok(conn.execute("DELETE FROM organizations WHERE kee = ?1", params![key])?)
    }

    /// Rows ordered by `created_at` descending, skipping `offset` rows.
    /// An offset past what SQLite can address yields no rows.
    pub fn select_page(&self, offset: usize, limit: usize) -> Result<Vec<Organization>> {
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM organizations ORDER BY created_at DESC, uuid ASC LIMIT ?1 OFFSET ?2",
            ORGANIZATION_COLUMNS
        ))?;

        let orgs = stmt
            .query_map(params![limit, offset], row_to_organization)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(orgs)
    }

    pub fn count(&self) -> Result<usize> {
        self.db.count_rows("organizations")
    }
}

fn row_to_organization(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        uuid: row.get(0)?,
        key: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        url: row.get(4)?,
        avatar_url: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn org(uuid: &str, key: &str, created_at: i64) -> Organization {
        Organization {
            uuid: uuid.to_string(),
            key: key.to_string(),
            name: format!("{} name", key),
            description: None,
            url: Some("https://example.org".to_string()),
            avatar_url: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_insert_and_select() {
        let store = SqliteOrganizationStore::new(Database::in_memory().unwrap());
        let foo = org("uuid-1", "foo-company", 1_000);
        store.insert(&foo).unwrap();

        assert_eq!(store.select_by_key("foo-company").unwrap(), Some(foo.clone()));
        assert_eq!(store.select_by_uuid("uuid-1").unwrap(), Some(foo));
        assert_eq!(store.select_by_key("bar").unwrap(), None);
    }

    #[test]
    fn test_key_is_unique() {
        let store = SqliteOrganizationStore::new(Database::in_memory().unwrap());
        store.insert(&org("uuid-1", "foo", 1)).unwrap();
        assert!(store.insert(&org("uuid-2", "foo", 2)).is_err());
    }

    #[test]
    fn test_delete() {
        let store = SqliteOrganizationStore::new(Database::in_memory().unwrap());
        store.insert(&org("uuid-1", "foo", 1)).unwrap();
        store.insert(&org("uuid-2", "bar", 2)).unwrap();

        assert_eq!(store.delete_by_uuid("missing").unwrap(), 0);
        assert_eq!(store.delete_by_uuid("uuid-1").unwrap(), 1);
        assert_eq!(store.delete_by_key("bar").unwrap(), 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_select_page_orders_by_created_at_desc() {
        let store = SqliteOrganizationStore::new(Database::in_memory().unwrap());
        store.insert(&org("uuid-a", "a", 10)).unwrap();
        store.insert(&org("uuid-b", "b", 30)).unwrap();
        store.insert(&org("uuid-c", "c", 20)).unwrap();

        let keys: Vec<String> = store
            .select_page(0, 10)
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["b", "c", "a"]);

        let second: Vec<String> = store
            .select_page(1, 1)
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(second, vec!["c"]);
    }

    #[test]
    fn test_select_page_beyond_i64_range_is_empty() {
        let store = SqliteOrganizationStore::new(Database::in_memory().unwrap());
        store.insert(&org("uuid-a", "a", 10)).unwrap();

        assert!(store.select_page(usize::MAX, 10).unwrap().is_empty());
        assert!(store.select_page(i64::MAX as usize + 1, 10).unwrap().is_empty());
        // Oversized limit means "everything"
        assert_eq!(store.select_page(0, usize::MAX).unwrap().len(), 1);
    }
}
