//! Record kinds, field types, and the per-field rule language.
//!
//! Supported field types:
//! - string: UTF-8 string
//! - int: 64-bit signed integer
//! - float: 64-bit floating point
//! - bool: Boolean
//! - timestamp: RFC 3339 string
//! - object: JSON object (inner structure rule-checked by dotted paths)
//! - array: Homogeneous array with element type

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::UnknownKind;

/// The four record categories held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    AgentState,
    DecisionRecord,
    ReflectionResult,
    PipelineExecution,
}

impl RecordKind {
    /// Every kind, in registry order.
    pub const ALL: [RecordKind; 4] = [
        RecordKind::AgentState,
        RecordKind::DecisionRecord,
        RecordKind::ReflectionResult,
        RecordKind::PipelineExecution,
    ];

    /// The snake_case name used in payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::AgentState => "agent_state",
            RecordKind::DecisionRecord => "decision_record",
            RecordKind::ReflectionResult => "reflection_result",
            RecordKind::PipelineExecution => "pipeline_execution",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent_state" => Ok(RecordKind::AgentState),
            "decision_record" => Ok(RecordKind::DecisionRecord),
            "reflection_result" => Ok(RecordKind::ReflectionResult),
            "pipeline_execution" => Ok(RecordKind::PipelineExecution),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Declared type of a schema field.
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// RFC 3339 string, parsed with chrono.
    Timestamp,
    /// Any JSON object. Inner requirements are separate dotted-path rules.
    Object,
    /// Homogeneous array with a single element type.
    Array(Box<FieldType>),
}

impl FieldType {
    /// Type name for error messages.
    pub fn type_name(&self) -> String {
        match self {
            FieldType::String => "string".into(),
            FieldType::Int => "int".into(),
            FieldType::Float => "float".into(),
            FieldType::Bool => "bool".into(),
            FieldType::Timestamp => "timestamp".into(),
            FieldType::Object => "object".into(),
            FieldType::Array(element) => format!("array of {}", element.type_name()),
        }
    }
}

/// A single validation rule attached to a field path.
///
/// Rules are evaluated exhaustively and in order; one field can violate
/// several rules at once.
#[derive(Debug, Clone)]
pub enum FieldRule {
    /// The field must be present.
    Required,
    /// The value must have this JSON type.
    TypeOf(FieldType),
    /// The string value must be one of these, case-sensitive.
    Enum(&'static [&'static str]),
    /// The string value must match this pattern.
    Pattern(Regex),
    /// The numeric value must fall in [min, max].
    Range { min: f64, max: f64 },
}

/// Complete rule table for one record kind.
///
/// `rules` is ordered; validation reports violations in this order so
/// error lists are deterministic. Index declarations drive the Index
/// Manager: ordered indexes list their key fields (the record id is an
/// implicit final component), hash indexes name a single field.
#[derive(Debug)]
pub struct KindSchema {
    pub kind: RecordKind,
    /// Field holding the primary identifier.
    pub id_field: &'static str,
    /// Field used for recency ordering and retention.
    pub recency_field: &'static str,
    /// Whether the kind supports full-replace updates.
    pub mutable: bool,
    rules: Vec<(&'static str, Vec<FieldRule>)>,
    pub ordered_indexes: &'static [&'static [&'static str]],
    pub hash_indexes: &'static [&'static str],
}

impl KindSchema {
    pub(super) fn new(
        kind: RecordKind,
        id_field: &'static str,
        recency_field: &'static str,
        mutable: bool,
        rules: Vec<(&'static str, Vec<FieldRule>)>,
        ordered_indexes: &'static [&'static [&'static str]],
        hash_indexes: &'static [&'static str],
    ) -> Self {
        Self {
            kind,
            id_field,
            recency_field,
            mutable,
            rules,
            ordered_indexes,
            hash_indexes,
        }
    }

    /// Ordered rule table: (dotted field path, rules).
    pub fn rules(&self) -> &[(&'static str, Vec<FieldRule>)] {
        &self.rules
    }

    /// Whether a top-level field is declared by this schema.
    pub fn declares(&self, key: &str) -> bool {
        self.rules.iter().any(|(path, _)| {
            *path == key || (path.starts_with(key) && path[key.len()..].starts_with('.'))
        })
    }

    /// Declared type of a top-level field, used by the parser to coerce
    /// raw ASL values.
    pub fn field_type(&self, key: &str) -> Option<&FieldType> {
        self.rules
            .iter()
            .find(|(path, _)| *path == key)
            .and_then(|(_, rules)| {
                rules.iter().find_map(|rule| match rule {
                    FieldRule::TypeOf(t) => Some(t),
                    _ => None,
                })
            })
    }

    /// Fields carrying a hash index.
    pub fn hash_indexed(&self, field: &str) -> bool {
        self.hash_indexes.contains(&field)
    }
}
