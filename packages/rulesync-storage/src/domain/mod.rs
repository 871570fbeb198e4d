//! Storage Domain Layer

pub mod models;

pub use models::{EpochMillis, Organization, Rule, RuleKey, RuleStatus, RuleType, Severity};
