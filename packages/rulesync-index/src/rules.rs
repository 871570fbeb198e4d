//! Rule index definition
//!
//! Field names follow the search payload consumers already query
//! (`ruleKey`, `htmlDesc`, `isTemplate`, ...).

use crate::schema::{FieldSpec, IndexDefinition};

/// The `rules` index
pub struct RuleIndexDefinition;

impl RuleIndexDefinition {
    pub const INDEX: &'static str = "rules";

    pub const FIELD_KEY: &'static str = "key";
    pub const FIELD_REPOSITORY: &'static str = "repo";
    pub const FIELD_RULE_KEY: &'static str = "ruleKey";
    pub const FIELD_NAME: &'static str = "name";
    pub const FIELD_HTML_DESCRIPTION: &'static str = "htmlDesc";
    pub const FIELD_SEVERITY: &'static str = "severity";
    pub const FIELD_STATUS: &'static str = "status";
    pub const FIELD_LANGUAGE: &'static str = "lang";
    pub const FIELD_IS_TEMPLATE: &'static str = "isTemplate";
    pub const FIELD_TEMPLATE_KEY: &'static str = "templateKey";
    pub const FIELD_TAGS: &'static str = "tags";
    pub const FIELD_TYPE: &'static str = "type";
    pub const FIELD_CREATED_AT: &'static str = "createdAt";
    pub const FIELD_UPDATED_AT: &'static str = "updatedAt";

    pub fn definition() -> IndexDefinition {
        IndexDefinition::new(Self::INDEX)
            .field(FieldSpec::keyword(Self::FIELD_KEY))
            .field(FieldSpec::keyword(Self::FIELD_REPOSITORY))
            .field(FieldSpec::keyword(Self::FIELD_RULE_KEY))
            .field(FieldSpec::text(Self::FIELD_NAME))
            .field(FieldSpec::text(Self::FIELD_HTML_DESCRIPTION))
            .field(FieldSpec::keyword(Self::FIELD_SEVERITY))
            .field(FieldSpec::keyword(Self::FIELD_STATUS))
            .field(FieldSpec::keyword(Self::FIELD_LANGUAGE))
            .field(FieldSpec::bool(Self::FIELD_IS_TEMPLATE))
            .field(FieldSpec::keyword(Self::FIELD_TEMPLATE_KEY))
            .field(FieldSpec::keyword(Self::FIELD_TAGS).multi_valued())
            .field(FieldSpec::keyword(Self::FIELD_TYPE))
            .field(FieldSpec::i64(Self::FIELD_CREATED_AT))
            .field(FieldSpec::i64(Self::FIELD_UPDATED_AT))
    }
}
