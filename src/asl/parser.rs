//! ASL block parser.
//!
//! Converts a block of newline-separated `key: value` lines into a
//! candidate record, then delegates to the Schema Registry.
//!
//! Guarantees:
//! - Deterministic and side-effect free; same input, same output.
//! - Partial failure: one bad line never discards the rest of a block.
//! - The returned record is best-effort even when errors are present.
//!
//! The caller supplies the intended kind; the parser never infers it
//! from content.

use std::sync::Arc;

use serde_json::Value;

use crate::record::{coerce_text, Record};
use crate::schema::{FieldError, FieldType, RecordKind, SchemaRegistry};

use super::errors::ParseError;

/// Introspection vocabulary coerced and bounds-checked even though it
/// lives outside the kind schemas. All other unknown keys pass through
/// to `asl_tags` as strings.
const NUMERIC_TAGS: &[(&str, FieldType, f64, f64)] = &[
    ("cognitive_load", FieldType::Int, 1.0, 10.0),
    ("certainty_level", FieldType::Float, 0.0, 1.0),
];

/// Stateless parser over a shared schema registry.
#[derive(Debug, Clone)]
pub struct AslParser {
    registry: Arc<SchemaRegistry>,
}

impl AslParser {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Parses an ASL block into a record of the given kind.
    ///
    /// Returns the best-effort record together with every problem
    /// found: malformed lines and coercion failures in line order,
    /// then schema violations in rule-table order.
    pub fn parse(&self, kind: RecordKind, input: &str) -> (Record, Vec<ParseError>) {
        let schema = self.registry.get(kind);
        let mut record = Record::new(kind);
        let mut errors = Vec::new();

        for (index, raw_line) in input.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some((key, value)) = split_line(trimmed) else {
                errors.push(ParseError::MalformedLine {
                    line,
                    raw: raw_line.to_string(),
                });
                continue;
            };

            if let Some(target) = schema.field_type(key) {
                match coerce_text(value, target) {
                    Ok(coerced) => {
                        record.fields.insert(key.to_string(), coerced);
                    }
                    Err(()) => errors.push(ParseError::TypeCoercion {
                        line,
                        field: key.to_string(),
                        value: value.to_string(),
                        expected: target.type_name(),
                    }),
                }
            } else if let Some((_, target, min, max)) =
                NUMERIC_TAGS.iter().find(|(name, ..)| *name == key)
            {
                match coerce_text(value, target) {
                    Ok(coerced) => {
                        if in_range(&coerced, *min, *max) {
                            record.asl_tags.insert(key, coerced);
                        } else {
                            errors.push(ParseError::Field(FieldError::range_mismatch(
                                key, *min, *max, &coerced,
                            )));
                        }
                    }
                    Err(()) => errors.push(ParseError::TypeCoercion {
                        line,
                        field: key.to_string(),
                        value: value.to_string(),
                        expected: target.type_name(),
                    }),
                }
            } else {
                // Unknown keys are preserved verbatim; the tag
                // vocabulary is intentionally extensible.
                record
                    .asl_tags
                    .insert(key, Value::String(value.to_string()));
            }
        }

        for violation in self.registry.validate(kind, &record.fields) {
            errors.push(ParseError::Field(violation));
        }

        (record, errors)
    }
}

/// Splits at the first colon; key and value are trimmed. Returns None
/// for lines without a colon or with an empty key.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn in_range(value: &Value, min: f64, max: f64) -> bool {
    value.as_f64().map(|n| n >= min && n <= max).unwrap_or(false)
}
