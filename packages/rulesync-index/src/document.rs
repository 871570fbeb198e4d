//! Index documents
//!
//! [`IndexDocument`] is the engine-neutral projection of a source record:
//! identifier, routing key and a JSON field payload checked against the
//! index definition on the way in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tantivy::schema::{Field, Value};
use tantivy::TantivyDocument;

use crate::error::{IndexError, Result};
use crate::schema::{FieldKind, FieldSpec, SchemaFields};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Upsert key
    pub id: String,
    /// Partition key
    pub routing: String,
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

impl IndexDocument {
    pub fn new(id: impl Into<String>, routing: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            routing: routing.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set `name` only when `value` is present
    pub fn with_optional_field<V: Into<JsonValue>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_field(name, value),
            None => self,
        }
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }

    /// Validate against the schema and build the Tantivy document.
    /// `null` values are treated as absent.
    pub(crate) fn to_tantivy(&self, schema: &SchemaFields) -> Result<TantivyDocument> {
        if self.id.is_empty() {
            return Err(IndexError::invalid_document(
                &self.id,
                "document id must not be empty",
            ));
        }

        let mut doc = TantivyDocument::default();
        doc.add_text(schema.id, &self.id);
        doc.add_text(schema.routing, &self.routing);

        for (name, value) in &self.fields {
            let (field, spec) = schema.get(name).ok_or_else(|| {
                IndexError::invalid_document(&self.id, format!("unknown field '{}'", name))
            })?;

            match value {
                JsonValue::Null => {}
                JsonValue::Array(values) if spec.multi_valued => {
                    for value in values {
                        self.add_value(&mut doc, *field, spec, value)?;
                    }
                }
                JsonValue::Array(_) => {
                    return Err(IndexError::invalid_document(
                        &self.id,
                        format!("field '{}' is single-valued", name),
                    ))
                }
                value => self.add_value(&mut doc, *field, spec, value)?,
            }
        }

        Ok(doc)
    }

    fn add_value(
        &self,
        doc: &mut TantivyDocument,
        field: Field,
        spec: &FieldSpec,
        value: &JsonValue,
    ) -> Result<()> {
        match (spec.kind, value) {
            (FieldKind::Keyword | FieldKind::Text, JsonValue::String(s)) => doc.add_text(field, s),
            (FieldKind::I64, JsonValue::Number(n)) => match n.as_i64() {
                Some(v) => doc.add_i64(field, v),
                None => return Err(self.type_mismatch(spec, value)),
            },
            (FieldKind::Bool, JsonValue::Bool(b)) => doc.add_bool(field, *b),
            _ => return Err(self.type_mismatch(spec, value)),
        }
        Ok(())
    }

    fn type_mismatch(&self, spec: &FieldSpec, value: &JsonValue) -> IndexError {
        IndexError::invalid_document(
            &self.id,
            format!(
                "field '{}' expects {:?}, got {}",
                spec.name, spec.kind, value
            ),
        )
    }

    /// Rebuild from stored values. Non-stored fields are absent.
    pub(crate) fn from_tantivy(doc: &TantivyDocument, schema: &SchemaFields) -> Result<Self> {
        let id = doc
            .get_first(schema.id)
            .and_then(|v| v.as_str())
            .ok_or_else(|| IndexError::internal("stored document has no id"))?
            .to_string();
        let routing = doc
            .get_first(schema.routing)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let mut fields = Map::new();
        for (name, (field, spec)) in &schema.declared {
            if !spec.stored {
                continue;
            }
            let values: Vec<JsonValue> = doc
                .get_all(*field)
                .filter_map(|v| match spec.kind {
                    FieldKind::Keyword | FieldKind::Text => v.as_str().map(JsonValue::from),
                    FieldKind::I64 => v.as_i64().map(JsonValue::from),
                    FieldKind::Bool => v.as_bool().map(JsonValue::from),
                })
                .collect();

            if spec.multi_valued {
                fields.insert(name.clone(), JsonValue::Array(values));
            } else if let Some(value) = values.into_iter().next() {
                fields.insert(name.clone(), value);
            }
        }

        Ok(Self {
            id,
            routing,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IndexDefinition;
    use serde_json::json;

    fn schema() -> SchemaFields {
        SchemaFields::build(
            &IndexDefinition::new("things")
                .field(FieldSpec::keyword("kind"))
                .field(FieldSpec::keyword("tags").multi_valued())
                .field(FieldSpec::i64("size"))
                .field(FieldSpec::bool("active")),
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_through_tantivy() {
        let schema = schema();
        let doc = IndexDocument::new("t1", "repo")
            .with_field("kind", "widget")
            .with_field("tags", json!(["a", "b"]))
            .with_field("size", 42)
            .with_field("active", true);

        let tantivy_doc = doc.to_tantivy(&schema).unwrap();
        let back = IndexDocument::from_tantivy(&tantivy_doc, &schema).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_multi_valued_field_comes_back_as_array() {
        let schema = schema();
        let doc = IndexDocument::new("t1", "repo").with_field("kind", "widget");

        let back = IndexDocument::from_tantivy(&doc.to_tantivy(&schema).unwrap(), &schema).unwrap();
        assert_eq!(back.get("tags"), Some(&json!([])));
    }

    #[test]
    fn test_null_is_absent() {
        let schema = schema();
        let doc = IndexDocument::new("t1", "repo").with_field("kind", JsonValue::Null);
        let back = IndexDocument::from_tantivy(&doc.to_tantivy(&schema).unwrap(), &schema).unwrap();
        assert!(back.get("kind").is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = IndexDocument::new("t1", "repo")
            .with_field("color", "red")
            .to_tantivy(&schema())
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidDocument { .. }));
        assert!(err.to_string().contains("unknown field 'color'"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let schema = schema();
        for doc in [
            IndexDocument::new("t1", "r").with_field("size", "big"),
            IndexDocument::new("t1", "r").with_field("active", 1),
            IndexDocument::new("t1", "r").with_field("kind", json!(["a"])),
            IndexDocument::new("t1", "r").with_field("size", 1.5),
        ] {
            assert!(matches!(
                doc.to_tantivy(&schema),
                Err(IndexError::InvalidDocument { .. })
            ));
        }
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(IndexDocument::new("", "r").to_tantivy(&schema()).is_err());
    }
}
