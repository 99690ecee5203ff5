//! Schema Registry: the single source of truth for per-kind field rules.
//!
//! Schemas are built once at startup and immutable afterwards, so the
//! registry is freely shared across request handlers without locking.
//!
//! Validation semantics:
//! - Evaluation is total: every rule on every field is checked and all
//!   violations are collected in one pass, never just the first.
//! - Nested (dotted-path) rules are skipped while their parent is
//!   absent or not an object; the parent's own rules report that.
//! - Validation is a pure function of (kind, candidate); no side effects.

use std::collections::BTreeMap;

use chrono::DateTime;
use regex::Regex;
use serde_json::Value;

use super::errors::FieldError;
use super::types::{FieldRule, FieldType, KindSchema, RecordKind};

/// Identifier pattern shared by agent references.
const AGENT_ID_PATTERN: &str = "^[a-zA-Z0-9_]+$";
const DECISION_ID_PATTERN: &str = "^dec_[a-zA-Z0-9]+$";
const REFLECTION_ID_PATTERN: &str = "^ref_[a-zA-Z0-9]+$";
const EXECUTION_ID_PATTERN: &str = "^exec_[a-zA-Z0-9]+$";

/// Allowed `agent_state.state` values.
pub const AGENT_STATES: &[&str] = &["idle", "processing", "completed", "error", "waiting"];
/// Allowed `pipeline_execution.status` values.
pub const EXECUTION_STATUSES: &[&str] = &["running", "completed", "failed", "suspended"];

// Ordered index key fields; the record id is an implicit final
// component.
const TIMESTAMP_INDEX: &[&str] = &["timestamp"];
const AGENT_TIMESTAMP_INDEX: &[&str] = &["agent_id", "timestamp"];
const START_TIME_INDEX: &[&str] = &["start_time"];

/// Table of field validation rules for all record kinds.
#[derive(Debug)]
pub struct SchemaRegistry {
    agent_state: KindSchema,
    decision_record: KindSchema,
    reflection_result: KindSchema,
    pipeline_execution: KindSchema,
}

fn pattern(source: &str) -> FieldRule {
    FieldRule::Pattern(Regex::new(source).expect("builtin pattern must compile"))
}

fn string_array() -> FieldType {
    FieldType::Array(Box::new(FieldType::String))
}

fn object_array() -> FieldType {
    FieldType::Array(Box::new(FieldType::Object))
}

impl SchemaRegistry {
    /// Builds the fixed schema table for the four record kinds.
    pub fn builtin() -> Self {
        use FieldRule::{Enum, Range, Required, TypeOf};

        let agent_state = KindSchema::new(
            RecordKind::AgentState,
            "agent_id",
            "timestamp",
            true,
            vec![
                ("agent_id", vec![Required, TypeOf(FieldType::String), pattern(AGENT_ID_PATTERN)]),
                ("timestamp", vec![Required, TypeOf(FieldType::Timestamp)]),
                ("state", vec![Required, TypeOf(FieldType::String), Enum(AGENT_STATES)]),
                ("current_task", vec![TypeOf(FieldType::String)]),
                ("metrics", vec![TypeOf(FieldType::Object)]),
            ],
            &[TIMESTAMP_INDEX],
            &["state"],
        );

        let decision_record = KindSchema::new(
            RecordKind::DecisionRecord,
            "decision_id",
            "timestamp",
            false,
            vec![
                ("decision_id", vec![Required, TypeOf(FieldType::String), pattern(DECISION_ID_PATTERN)]),
                ("timestamp", vec![Required, TypeOf(FieldType::Timestamp)]),
                ("agent_id", vec![Required, TypeOf(FieldType::String), pattern(AGENT_ID_PATTERN)]),
                ("context", vec![TypeOf(FieldType::Object)]),
                ("decision", vec![Required, TypeOf(FieldType::Object)]),
                ("decision.action", vec![Required, TypeOf(FieldType::String)]),
                ("decision.parameters", vec![Required, TypeOf(FieldType::Object)]),
                ("rationale", vec![Required, TypeOf(string_array())]),
            ],
            &[TIMESTAMP_INDEX, AGENT_TIMESTAMP_INDEX],
            &[],
        );

        let reflection_result = KindSchema::new(
            RecordKind::ReflectionResult,
            "reflection_id",
            "timestamp",
            false,
            vec![
                ("reflection_id", vec![Required, TypeOf(FieldType::String), pattern(REFLECTION_ID_PATTERN)]),
                ("timestamp", vec![Required, TypeOf(FieldType::Timestamp)]),
                ("agent_id", vec![Required, TypeOf(FieldType::String), pattern(AGENT_ID_PATTERN)]),
                ("metrics", vec![Required, TypeOf(FieldType::Object)]),
                ("metrics.accuracy", vec![Required, TypeOf(FieldType::Float), Range { min: 0.0, max: 1.0 }]),
                ("metrics.consistency", vec![Required, TypeOf(FieldType::Float), Range { min: 0.0, max: 1.0 }]),
                ("metrics.ethical_compliance", vec![Required, TypeOf(FieldType::Float), Range { min: 0.0, max: 1.0 }]),
                ("metrics.performance", vec![Required, TypeOf(FieldType::Float), Range { min: 0.0, max: 1.0 }]),
                ("findings", vec![TypeOf(string_array())]),
                ("suggestions", vec![TypeOf(string_array())]),
            ],
            &[TIMESTAMP_INDEX, AGENT_TIMESTAMP_INDEX],
            &[],
        );

        let pipeline_execution = KindSchema::new(
            RecordKind::PipelineExecution,
            "execution_id",
            "start_time",
            true,
            vec![
                ("execution_id", vec![Required, TypeOf(FieldType::String), pattern(EXECUTION_ID_PATTERN)]),
                ("start_time", vec![Required, TypeOf(FieldType::Timestamp)]),
                ("status", vec![Required, TypeOf(FieldType::String), Enum(EXECUTION_STATUSES)]),
                ("pipeline_id", vec![TypeOf(FieldType::String)]),
                ("execution_graph", vec![TypeOf(FieldType::Object)]),
                ("execution_graph.nodes", vec![TypeOf(object_array())]),
                ("execution_graph.edges", vec![TypeOf(object_array())]),
            ],
            &[START_TIME_INDEX],
            &["status"],
        );

        Self {
            agent_state,
            decision_record,
            reflection_result,
            pipeline_execution,
        }
    }

    /// Returns the schema for a kind. Total: kinds are a closed enum.
    pub fn get(&self, kind: RecordKind) -> &KindSchema {
        match kind {
            RecordKind::AgentState => &self.agent_state,
            RecordKind::DecisionRecord => &self.decision_record,
            RecordKind::ReflectionResult => &self.reflection_result,
            RecordKind::PipelineExecution => &self.pipeline_execution,
        }
    }

    /// Validates a candidate field mapping against a kind's rules.
    ///
    /// Returns every violation found, in rule-table order. An empty
    /// vector means the candidate is valid.
    pub fn validate(&self, kind: RecordKind, fields: &BTreeMap<String, Value>) -> Vec<FieldError> {
        let schema = self.get(kind);
        let mut errors = Vec::new();

        for (path, rules) in schema.rules() {
            // Nested rules only apply under a present object parent.
            if let Some((parent, _)) = path.rsplit_once('.') {
                match resolve(fields, parent) {
                    Some(value) if value.is_object() => {}
                    _ => continue,
                }
            }

            match resolve(fields, path) {
                None => {
                    if rules.iter().any(|r| matches!(r, FieldRule::Required)) {
                        errors.push(FieldError::missing(*path));
                    }
                }
                Some(value) => {
                    for rule in rules {
                        check_rule(path, rule, value, &mut errors);
                    }
                }
            }
        }

        errors
    }
}

/// Resolves a dotted path against the top-level field mapping.
fn resolve<'a>(fields: &'a BTreeMap<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn check_rule(path: &str, rule: &FieldRule, value: &Value, errors: &mut Vec<FieldError>) {
    match rule {
        FieldRule::Required => {}
        FieldRule::TypeOf(expected) => {
            if !type_matches(value, expected) {
                errors.push(FieldError::type_mismatch(path, expected.type_name(), value));
            }
        }
        FieldRule::Enum(allowed) => {
            if let Some(s) = value.as_str() {
                if !allowed.contains(&s) {
                    errors.push(FieldError::enum_mismatch(path, allowed, value));
                }
            }
        }
        FieldRule::Pattern(regex) => {
            if let Some(s) = value.as_str() {
                if !regex.is_match(s) {
                    errors.push(FieldError::pattern_mismatch(path, regex.as_str(), value));
                }
            }
        }
        FieldRule::Range { min, max } => {
            if let Some(n) = value.as_f64() {
                if n < *min || n > *max {
                    errors.push(FieldError::range_mismatch(path, *min, *max, value));
                }
            }
        }
    }
}

fn type_matches(value: &Value, expected: &FieldType) -> bool {
    match expected {
        FieldType::String => value.is_string(),
        FieldType::Int => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::Bool => value.is_boolean(),
        FieldType::Timestamp => value
            .as_str()
            .map(|s| DateTime::parse_from_rfc3339(s).is_ok())
            .unwrap_or(false),
        FieldType::Object => value.is_object(),
        FieldType::Array(element) => value
            .as_array()
            .map(|items| items.iter().all(|item| type_matches(item, element)))
            .unwrap_or(false),
    }
}
