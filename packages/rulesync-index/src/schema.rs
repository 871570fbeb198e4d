//! Index Definition → Tantivy Schema
//!
//! Every index carries two reserved keyword fields next to the declared ones:
//!
//! 1. `_id` - Document identifier (STORED, keyword, upsert key)
//! 2. `_routing` - Partition key (STORED, keyword, search filter)

use std::collections::{BTreeMap, HashSet};
use tantivy::schema::{Field, NumericOptions, Schema, TextOptions, STORED, STRING, TEXT};

use crate::error::{IndexError, Result};

pub const FIELD_ID: &str = "_id";
pub const FIELD_ROUTING: &str = "_routing";

const RESERVED_FIELDS: &[&str] = &[FIELD_ID, FIELD_ROUTING];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Exact-match string (raw tokenizer)
    Keyword,
    /// Tokenized full-text
    Text,
    I64,
    Bool,
}

/// One declared document field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub stored: bool,
    /// Accepts (and returns) a JSON array of values
    pub multi_valued: bool,
}

impl FieldSpec {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            stored: true,
            multi_valued: false,
        }
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Keyword)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn i64(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::I64)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn not_stored(mut self) -> Self {
        self.stored = false;
        self
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }
}

/// Named set of fields describing one index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Rejects empty, duplicate and reserved field names
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(IndexError::invalid_input("Index name must not be empty"));
        }

        let mut seen = HashSet::new();
        for spec in &self.fields {
            if spec.name.is_empty() {
                return Err(IndexError::invalid_input(format!(
                    "Index '{}' declares a field with an empty name",
                    self.name
                )));
            }
            if RESERVED_FIELDS.contains(&spec.name.as_str()) {
                return Err(IndexError::invalid_input(format!(
                    "Field name '{}' is reserved",
                    spec.name
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(IndexError::invalid_input(format!(
                    "Field '{}' is declared twice in index '{}'",
                    spec.name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Field handles resolved against the built schema
#[derive(Debug, Clone)]
pub struct SchemaFields {
    pub schema: Schema,
    pub id: Field,
    pub routing: Field,
    pub declared: BTreeMap<String, (Field, FieldSpec)>,
}

impl SchemaFields {
    /// Build the Tantivy schema for `definition`
    pub fn build(definition: &IndexDefinition) -> Result<Self> {
        definition.validate()?;

        let mut builder = Schema::builder();
        let id = builder.add_text_field(FIELD_ID, STRING | STORED);
        let routing = builder.add_text_field(FIELD_ROUTING, STRING | STORED);

        let mut declared = BTreeMap::new();
        for spec in &definition.fields {
            let field = match spec.kind {
                FieldKind::Keyword => builder.add_text_field(&spec.name, text_options(STRING, spec.stored)),
                FieldKind::Text => builder.add_text_field(&spec.name, text_options(TEXT, spec.stored)),
                FieldKind::I64 => builder.add_i64_field(&spec.name, numeric_options(spec.stored)),
                FieldKind::Bool => builder.add_bool_field(&spec.name, numeric_options(spec.stored)),
            };
            declared.insert(spec.name.clone(), (field, spec.clone()));
        }

        Ok(Self {
            schema: builder.build(),
            id,
            routing,
            declared,
        })
    }

    pub fn get(&self, name: &str) -> Option<&(Field, FieldSpec)> {
        self.declared.get(name)
    }

    /// Indexed string fields, used as query parser defaults
    pub fn searchable_fields(&self) -> Vec<Field> {
        self.declared
            .values()
            .filter(|(_, spec)| matches!(spec.kind, FieldKind::Keyword | FieldKind::Text))
            .map(|(field, _)| *field)
            .collect()
    }
}

fn text_options(base: TextOptions, stored: bool) -> TextOptions {
    if stored {
        base.set_stored()
    } else {
        base
    }
}

fn numeric_options(stored: bool) -> NumericOptions {
    let options = NumericOptions::default().set_indexed().set_fast();
    if stored {
        options.set_stored()
    } else {
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> IndexDefinition {
        IndexDefinition::new("things")
            .field(FieldSpec::keyword("kind"))
            .field(FieldSpec::text("body").not_stored())
            .field(FieldSpec::i64("size"))
            .field(FieldSpec::bool("active"))
    }

    #[test]
    fn test_schema_has_reserved_and_declared_fields() {
        let fields = SchemaFields::build(&definition()).unwrap();
        assert_eq!(fields.schema.fields().count(), 6);
        assert!(fields.schema.get_field(FIELD_ID).is_ok());
        assert!(fields.schema.get_field(FIELD_ROUTING).is_ok());
    }

    #[test]
    fn test_stored_flag_is_honored() {
        let fields = SchemaFields::build(&definition()).unwrap();
        let (kind, _) = fields.get("kind").unwrap();
        let (body, _) = fields.get("body").unwrap();
        assert!(fields.schema.get_field_entry(*kind).is_stored());
        assert!(!fields.schema.get_field_entry(*body).is_stored());
    }

    #[test]
    fn test_searchable_fields_are_string_fields() {
        let fields = SchemaFields::build(&definition()).unwrap();
        assert_eq!(fields.searchable_fields().len(), 2);
    }

    #[test]
    fn test_reserved_name_rejected() {
        let def = IndexDefinition::new("bad").field(FieldSpec::keyword(FIELD_ID));
        assert!(matches!(def.validate(), Err(IndexError::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let def = IndexDefinition::new("bad")
            .field(FieldSpec::keyword("a"))
            .field(FieldSpec::i64("a"));
        assert!(SchemaFields::build(&def).is_err());
    }
}
