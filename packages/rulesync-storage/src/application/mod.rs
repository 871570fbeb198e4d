/*
 * Application Layer - Use cases
 *
 * - Validates caller input and permissions
 * - One store read/write per operation
 * - No SQL here; stores live in infrastructure
 */

pub mod organizations;

pub use organizations::{
    slugify, CreateOrganization, FixedSession, OrganizationPage, OrganizationService, UserSession,
};
