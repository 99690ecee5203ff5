//! Command-line interface.
//!
//! - serve: boot the store, sweeper, and HTTP server
//! - parse: one-shot ASL block to JSON
//! - check: validate a JSON payload against a kind

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::run;
pub use errors::{CliError, CliResult};
