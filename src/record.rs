//! The Record type shared by the parser, store, and API.
//!
//! A record is a kind tag plus two mappings: schema-declared `fields`
//! and the open `asl_tags` extension mapping. Both use `BTreeMap` so
//! serialization order is deterministic. `asl_tags` is never
//! schema-validated beyond being a mapping; unknown payload keys land
//! there instead of being rejected, which keeps the tag vocabulary
//! extensible without code change.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::{FieldError, FieldType, KindSchema, RecordKind};

/// Open string-keyed metadata attached to every record.
///
/// Serializes as a plain JSON object with keys in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMap(BTreeMap<String, Value>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A typed record of one of the four kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: RecordKind,
    /// Schema-declared fields.
    pub fields: BTreeMap<String, Value>,
    /// Open extension mapping.
    pub asl_tags: TagMap,
}

impl Record {
    /// Creates an empty record of a kind.
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
            asl_tags: TagMap::new(),
        }
    }

    /// Builds a record from a pre-structured JSON payload.
    ///
    /// Keys the schema declares become `fields`; everything else is
    /// preserved verbatim under `asl_tags`. An explicit `asl_tags` key
    /// must itself be an object and is merged in.
    pub fn from_value(
        kind: RecordKind,
        schema: &KindSchema,
        value: Value,
    ) -> Result<Self, Vec<FieldError>> {
        let body = match value {
            Value::Object(body) => body,
            other => return Err(vec![FieldError::type_mismatch("$root", "object", &other)]),
        };

        let mut record = Record::new(kind);
        for (key, item) in body {
            if key == "asl_tags" {
                match item {
                    Value::Object(tags) => {
                        for (tag, tag_value) in tags {
                            record.asl_tags.insert(tag, tag_value);
                        }
                    }
                    other => {
                        return Err(vec![FieldError::type_mismatch("asl_tags", "object", &other)]);
                    }
                }
            } else if schema.declares(&key) {
                record.fields.insert(key, item);
            } else {
                record.asl_tags.insert(key, item);
            }
        }
        Ok(record)
    }

    /// Flat JSON rendering: declared fields plus the `asl_tags` object
    /// (always present, possibly empty).
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        for (key, value) in &self.fields {
            body.insert(key.clone(), value.clone());
        }
        let tags: Map<String, Value> = self
            .asl_tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        body.insert("asl_tags".to_string(), Value::Object(tags));
        Value::Object(body)
    }

    /// The primary identifier, if present and a string.
    pub fn id(&self, schema: &KindSchema) -> Option<&str> {
        self.fields.get(schema.id_field).and_then(Value::as_str)
    }

    /// The recency timestamp, parsed.
    pub fn recency(&self, schema: &KindSchema) -> Option<DateTime<Utc>> {
        self.fields
            .get(schema.recency_field)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// A field value by dotted path.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Index key material for a field: the raw value if declared, used
    /// by the Index Manager.
    pub fn index_value(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Coerces a raw textual value to a declared field type.
///
/// Used by the ASL parser; JSON payloads arrive already typed.
pub fn coerce_text(raw: &str, target: &FieldType) -> Result<Value, ()> {
    match target {
        FieldType::String | FieldType::Timestamp => Ok(Value::String(raw.to_string())),
        FieldType::Int => raw
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| ()),
        FieldType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or(()),
        FieldType::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(()),
        },
        FieldType::Object | FieldType::Array(_) => {
            let parsed: Value = serde_json::from_str(raw).map_err(|_| ())?;
            let shape_ok = match target {
                FieldType::Object => parsed.is_object(),
                _ => parsed.is_array(),
            };
            if shape_ok {
                Ok(parsed)
            } else {
                Err(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn test_unknown_keys_land_in_asl_tags() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.get(RecordKind::AgentState);
        let record = Record::from_value(
            RecordKind::AgentState,
            schema,
            json!({
                "agent_id": "bot_1",
                "timestamp": "2024-01-01T00:00:00Z",
                "state": "idle",
                "purpose": "testing"
            }),
        )
        .unwrap();

        assert_eq!(record.fields.len(), 3);
        assert_eq!(record.asl_tags.get("purpose"), Some(&json!("testing")));
    }

    #[test]
    fn test_explicit_asl_tags_merged() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.get(RecordKind::AgentState);
        let record = Record::from_value(
            RecordKind::AgentState,
            schema,
            json!({
                "agent_id": "bot_1",
                "timestamp": "2024-01-01T00:00:00Z",
                "state": "idle",
                "asl_tags": {"scope": "unit_test"}
            }),
        )
        .unwrap();

        assert_eq!(record.asl_tags.get("scope"), Some(&json!("unit_test")));
    }

    #[test]
    fn test_non_object_asl_tags_rejected() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.get(RecordKind::AgentState);
        let errors = Record::from_value(
            RecordKind::AgentState,
            schema,
            json!({"agent_id": "bot_1", "asl_tags": [1, 2]}),
        )
        .unwrap_err();
        assert_eq!(errors[0].field, "asl_tags");
    }

    #[test]
    fn test_to_value_always_carries_asl_tags() {
        let record = Record::new(RecordKind::AgentState);
        let value = record.to_value();
        assert_eq!(value["asl_tags"], json!({}));
    }

    #[test]
    fn test_round_trip_preserves_fields_and_tags() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.get(RecordKind::AgentState);
        let body = json!({
            "agent_id": "bot_1",
            "timestamp": "2024-01-01T00:00:00Z",
            "state": "idle",
            "asl_tags": {"purpose": "testing"}
        });
        let record = Record::from_value(RecordKind::AgentState, schema, body.clone()).unwrap();
        assert_eq!(record.to_value(), body);
    }

    #[test]
    fn test_recency_parses_rfc3339() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.get(RecordKind::AgentState);
        let record = Record::from_value(
            RecordKind::AgentState,
            schema,
            json!({"agent_id": "bot_1", "timestamp": "2024-06-15T12:30:00Z", "state": "idle"}),
        )
        .unwrap();
        let t = record.recency(schema).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-06-15T12:30:00+00:00");
    }

    #[test]
    fn test_coerce_text_int_and_float() {
        assert_eq!(coerce_text("42", &FieldType::Int).unwrap(), json!(42));
        assert_eq!(coerce_text("0.85", &FieldType::Float).unwrap(), json!(0.85));
        assert!(coerce_text("4.5", &FieldType::Int).is_err());
        assert!(coerce_text("not_a_number", &FieldType::Float).is_err());
    }

    #[test]
    fn test_coerce_text_inline_json_object() {
        let value = coerce_text(r#"{"action": "retry", "parameters": {}}"#, &FieldType::Object);
        assert_eq!(value.unwrap(), json!({"action": "retry", "parameters": {}}));
        assert!(coerce_text("[1]", &FieldType::Object).is_err());
    }
}
