/*
 * Application: Organization use cases
 *
 * create / delete / search, all gated on system administration.
 */

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::models::{EpochMillis, Organization};
use crate::error::{check_argument, Result, StorageError};
use crate::infrastructure::sqlite::SqliteOrganizationStore;

pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 64;
pub const KEY_MIN_LENGTH: usize = 2;
pub const KEY_MAX_LENGTH: usize = 32;
pub const DESCRIPTION_MAX_LENGTH: usize = 256;
pub const URL_MAX_LENGTH: usize = 256;
pub const AVATAR_MAX_LENGTH: usize = 256;

pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Permissions of the caller, resolved elsewhere
pub trait UserSession {
    fn is_system_administrator(&self) -> bool;
}

/// Session whose permission is fixed up front (CLI operator, tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedSession {
    system_administrator: bool,
}

impl FixedSession {
    pub fn administrator() -> Self {
        Self {
            system_administrator: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            system_administrator: false,
        }
    }
}

impl UserSession for FixedSession {
    fn is_system_administrator(&self) -> bool {
        self.system_administrator
    }
}

/// Input of [`OrganizationService::create`]
#[derive(Debug, Clone, Default)]
pub struct CreateOrganization {
    pub name: String,
    /// Generated from the name when absent
    pub key: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub avatar_url: Option<String>,
}

impl CreateOrganization {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// One page of [`OrganizationService::search`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationPage {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub organizations: Vec<Organization>,
}

pub struct OrganizationService {
    store: SqliteOrganizationStore,
    clock: Box<dyn Fn() -> EpochMillis + Send + Sync>,
}

impl OrganizationService {
    pub fn new(store: SqliteOrganizationStore) -> Self {
        Self {
            store,
            clock: Box::new(|| Utc::now().timestamp_millis()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> EpochMillis + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn create(
        &self,
        session: &dyn UserSession,
        request: CreateOrganization,
    ) -> Result<Organization> {
        check_system_administrator(session)?;

        let name = check_name(&request.name)?;
        if let Some(key) = &request.key {
            check_key(key)?;
        }
        let key = match &request.key {
            Some(key) => key.clone(),
            None => {
                let truncated: String = name.chars().take(KEY_MAX_LENGTH).collect();
                slugify(&truncated)
            }
        };
        check_optional_length("Description", &request.description, DESCRIPTION_MAX_LENGTH)?;
        check_optional_length("Url", &request.url, URL_MAX_LENGTH)?;
        check_optional_length("Avatar", &request.avatar_url, AVATAR_MAX_LENGTH)?;

        let used = self.store.select_by_key(&key)?.is_some();
        check_argument(request.key.is_none() || !used, || {
            format!("Key '{}' is already used. Specify another one.", key)
        })?;
        check_argument(request.key.is_some() || !used, || {
            format!(
                "Key '{}' generated from name '{}' is already used. Specify one.",
                key, name
            )
        })?;
        check_argument(!key.is_empty(), || {
            format!("Key generated from name '{}' is empty. Specify one.", name)
        })?;

        let now = (self.clock)();
        let organization = Organization {
            uuid: Uuid::new_v4().to_string(),
            key,
            name: name.to_string(),
            description: request.description,
            url: request.url,
            avatar_url: request.avatar_url,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&organization)?;

        info!(
            "Created organization '{}' ({})",
            organization.key, organization.uuid
        );
        Ok(organization)
    }

    /// Delete by uuid or by key; exactly one must be given. Deleting a
    /// missing organization is not an error.
    pub fn delete(
        &self,
        session: &dyn UserSession,
        uuid: Option<&str>,
        key: Option<&str>,
    ) -> Result<()> {
        check_system_administrator(session)?;

        let deleted = match (uuid, key) {
            (Some(uuid), None) => self.store.delete_by_uuid(uuid)?,
            (None, Some(key)) => self.store.delete_by_key(key)?,
            _ => {
                return Err(StorageError::invalid_argument(
                    "Either 'uuid' or 'key' must be provided, not both",
                ))
            }
        };

        info!("Deleted {} organization(s)", deleted);
        Ok(())
    }

    /// Organizations ordered by creation date, newest first. `page` is 1-based.
    pub fn search(&self, page: Option<usize>, page_size: Option<usize>) -> Result<OrganizationPage> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        check_argument(page > 0, || "Page must be greater than 0.".to_string())?;
        check_argument(page_size > 0, || {
            "Page size must be greater than 0.".to_string()
        })?;

        // Pages whose offset overflows lie past the end
        let organizations = match (page - 1).checked_mul(page_size) {
            Some(offset) => self.store.select_page(offset, page_size)?,
            None => Vec::new(),
        };
        Ok(OrganizationPage {
            page,
            page_size,
            total: self.store.count()?,
            organizations,
        })
    }
}

fn check_system_administrator(session: &dyn UserSession) -> Result<()> {
    if session.is_system_administrator() {
        Ok(())
    } else {
        Err(StorageError::forbidden())
    }
}

fn check_name(name: &str) -> Result<&str> {
    let len = name.chars().count();
    check_argument(len >= NAME_MIN_LENGTH, || {
        format!(
            "Name '{}' must be at least {} chars long",
            name, NAME_MIN_LENGTH
        )
    })?;
    check_argument(len <= NAME_MAX_LENGTH, || {
        format!(
            "Name '{}' must be at most {} chars long",
            name, NAME_MAX_LENGTH
        )
    })?;
    Ok(name)
}

fn check_key(key: &str) -> Result<()> {
    let len = key.chars().count();
    check_argument(len >= KEY_MIN_LENGTH, || {
        format!("Key '{}' must be at least {} chars long", key, KEY_MIN_LENGTH)
    })?;
    check_argument(len <= KEY_MAX_LENGTH, || {
        format!("Key '{}' must be at most {} chars long", key, KEY_MAX_LENGTH)
    })?;
    check_argument(slugify(key) == key, || {
        format!("Key '{}' contains at least one invalid char", key)
    })
}

fn check_optional_length(label: &str, value: &Option<String>, max: usize) -> Result<()> {
    match value {
        Some(value) => check_argument(value.chars().count() <= max, || {
            format!("{} '{}' must be at most {} chars long", label, value, max)
        }),
        None => Ok(()),
    }
}

/// Lower-case ASCII letters and digits are kept, upper-case ASCII letters
/// are lowered, anything else becomes a dash. Dash runs collapse and leading
/// or trailing dashes are dropped.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
