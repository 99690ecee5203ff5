//! Schema validation error types.
//!
//! A `FieldError` names the offending field path, the rule violated,
//! and the invalid value. Validation collects every violation in one
//! pass, so callers always see the complete list.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The validation rule a field violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// A required field was absent.
    MissingRequired,
    /// The value's JSON type did not match the declared type.
    TypeMismatch,
    /// A string value did not match the declared pattern.
    PatternMismatch,
    /// A string value was outside the declared enum set.
    EnumMismatch,
    /// A numeric value was outside the declared bounds.
    RangeMismatch,
}

impl RuleKind {
    /// Stable rule name used in error payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::MissingRequired => "missing-required",
            RuleKind::TypeMismatch => "type-mismatch",
            RuleKind::PatternMismatch => "pattern-mismatch",
            RuleKind::EnumMismatch => "enum-mismatch",
            RuleKind::RangeMismatch => "range-mismatch",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Dotted field path, e.g. `metrics.accuracy`.
    pub field: String,
    /// Rule that was violated.
    pub rule: RuleKind,
    /// What the rule expected, e.g. a type name or an enum set.
    pub expected: String,
    /// The offending value, absent for missing fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: RuleKind::MissingRequired,
            expected: "field to be present".into(),
            value: None,
        }
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        value: &Value,
    ) -> Self {
        Self {
            field: field.into(),
            rule: RuleKind::TypeMismatch,
            expected: expected.into(),
            value: Some(value.clone()),
        }
    }

    pub fn pattern_mismatch(
        field: impl Into<String>,
        pattern: impl Into<String>,
        value: &Value,
    ) -> Self {
        Self {
            field: field.into(),
            rule: RuleKind::PatternMismatch,
            expected: pattern.into(),
            value: Some(value.clone()),
        }
    }

    pub fn enum_mismatch(field: impl Into<String>, allowed: &[&str], value: &Value) -> Self {
        Self {
            field: field.into(),
            rule: RuleKind::EnumMismatch,
            expected: format!("one of [{}]", allowed.join(", ")),
            value: Some(value.clone()),
        }
    }

    pub fn range_mismatch(field: impl Into<String>, min: f64, max: f64, value: &Value) -> Self {
        Self {
            field: field.into(),
            rule: RuleKind::RangeMismatch,
            expected: format!("number in [{}, {}]", min, max),
            value: Some(value.clone()),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': {} (expected {})",
            self.field, self.rule, self.expected
        )?;
        if let Some(value) = &self.value {
            write!(f, ", got {}", value)?;
        }
        Ok(())
    }
}

/// A kind string from a request path or payload that names no schema.
#[derive(Debug, Clone, Error)]
#[error("unknown record kind '{0}'")]
pub struct UnknownKind(pub String);
