//! CLI error types.

use thiserror::Error;

use crate::store::{BackendError, StoreError};

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Backend(#[from] BackendError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("input is invalid: {problems} problem(s) reported")]
    Invalid { problems: usize },

    #[error("cannot read input: {0}")]
    BadInput(String),
}
