//! HTTP API error types.
//!
//! Every error response carries a stable error kind, a human-readable
//! message, and, for validation failures, the complete ordered list
//! of violations, never just the first.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::asl::ParseError;
use crate::store::StoreError;

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A store operation failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// ASL ingestion failed; parse and schema errors in one list.
    #[error("validation failed with {n} error(s)", n = .0.len())]
    Validation(Vec<ParseError>),

    /// A malformed query parameter.
    #[error("invalid query parameter '{param}': {reason}")]
    InvalidQueryParam { param: String, reason: String },

    /// An unreadable request body.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Store(err) => match err {
                StoreError::SchemaViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                StoreError::DuplicateId { .. } => StatusCode::CONFLICT,
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::Immutable(_) => StatusCode::METHOD_NOT_ALLOWED,
                StoreError::PageSizeExceeded { .. } => StatusCode::BAD_REQUEST,
                StoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            },
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidQueryParam { .. } | ApiError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Stable error kind string.
    pub fn kind_str(&self) -> &'static str {
        match self {
            ApiError::Store(err) => err.kind_str(),
            ApiError::Validation(_) => "validation_failed",
            ApiError::InvalidQueryParam { .. } => "invalid_query_param",
            ApiError::InvalidBody(_) => "invalid_body",
        }
    }

    fn violations(&self) -> Option<Vec<Value>> {
        match self {
            ApiError::Store(StoreError::SchemaViolation(errors)) => Some(
                errors
                    .iter()
                    .filter_map(|e| serde_json::to_value(e).ok())
                    .collect(),
            ),
            ApiError::Validation(errors) => Some(
                errors
                    .iter()
                    .filter_map(|e| serde_json::to_value(e).ok())
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Value>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.kind_str(),
            message: self.to_string(),
            violations: self.violations(),
        };
        (status, Json(body)).into_response()
    }
}
