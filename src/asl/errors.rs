//! Parse-time error types for ASL blocks.

use std::fmt;

use serde::Serialize;

use crate::schema::FieldError;

/// One problem found while parsing or validating an ASL block.
///
/// Parse-time errors carry the 1-based line number of the offending
/// line; schema violations found afterwards are appended as `Field`
/// entries, so one list reports every problem at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    /// A non-empty line without a `key: value` shape.
    MalformedLine { line: usize, raw: String },
    /// A value that failed coercion to its declared type.
    TypeCoercion {
        line: usize,
        field: String,
        value: String,
        expected: String,
    },
    /// A schema-level violation from the registry.
    Field(FieldError),
}

impl ParseError {
    /// Stable error kind string for payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::MalformedLine { .. } => "malformed_line",
            ParseError::TypeCoercion { .. } => "type_coercion",
            ParseError::Field(_) => "field",
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedLine { line, raw } => {
                write!(f, "line {}: malformed line '{}'", line, raw)
            }
            ParseError::TypeCoercion {
                line,
                field,
                value,
                expected,
            } => write!(
                f,
                "line {}: cannot coerce '{}' to {} for field '{}'",
                line, value, expected, field
            ),
            ParseError::Field(err) => write!(f, "{}", err),
        }
    }
}

impl From<FieldError> for ParseError {
    fn from(err: FieldError) -> Self {
        ParseError::Field(err)
    }
}
