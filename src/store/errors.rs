//! Store error taxonomy.
//!
//! Three families with distinct handling:
//! - validation (`SchemaViolation`): caller-caused, never retried,
//!   carries the complete violation list;
//! - identity (`DuplicateId`, `NotFound`, `Immutable`): caller-caused,
//!   surfaced immediately;
//! - resource (`StorageUnavailable`, `DeadlineExceeded`,
//!   `PageSizeExceeded`): `StorageUnavailable` is retried internally
//!   with bounded backoff before surfacing, the other two never.

use thiserror::Error;

use crate::schema::{FieldError, RecordKind};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the record store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The primary identifier already exists for the kind.
    #[error("record '{id}' already exists for kind {kind}")]
    DuplicateId { kind: RecordKind, id: String },

    /// No record with this identifier.
    #[error("record '{id}' not found for kind {kind}")]
    NotFound { kind: RecordKind, id: String },

    /// The kind is append-only, or the update tried to change the
    /// primary identifier.
    #[error("{0}")]
    Immutable(String),

    /// The candidate violated its schema; every violation is listed.
    #[error("validation failed with {n} violation(s)", n = .0.len())]
    SchemaViolation(Vec<FieldError>),

    /// The requested page size is over the configured ceiling.
    #[error("page size {requested} exceeds maximum {max}")]
    PageSizeExceeded { requested: usize, max: usize },

    /// Backend I/O kept failing after the retry budget.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The caller's deadline passed before the scan finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    /// Stable error kind string for responses and logs.
    pub fn kind_str(&self) -> &'static str {
        match self {
            StoreError::DuplicateId { .. } => "duplicate_id",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Immutable(_) => "immutable",
            StoreError::SchemaViolation(_) => "schema_violation",
            StoreError::PageSizeExceeded { .. } => "page_size_exceeded",
            StoreError::StorageUnavailable(_) => "storage_unavailable",
            StoreError::DeadlineExceeded => "deadline_exceeded",
        }
    }
}
