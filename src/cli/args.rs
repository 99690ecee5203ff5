//! CLI argument definitions.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::schema::RecordKind;

/// Aethero_Mem: schema-validated agent memory store.
#[derive(Debug, Parser)]
#[command(name = "aethero-mem", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server with the retention sweeper.
    Serve {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:7600")]
        listen: SocketAddr,

        /// Append-only log file for durable storage. Volatile
        /// in-memory storage when absent.
        #[arg(long)]
        data_file: Option<PathBuf>,

        /// Retention horizon in days.
        #[arg(long, default_value_t = 30)]
        retention_days: i64,

        /// Query cache TTL in seconds; 0 disables the cache.
        #[arg(long, default_value_t = 3600)]
        cache_ttl_secs: u64,

        /// Seconds between retention sweeps.
        #[arg(long, default_value_t = 3600)]
        sweep_interval_secs: u64,

        /// Hard ceiling on list page size.
        #[arg(long, default_value_t = 1000)]
        max_page_size: usize,
    },

    /// Parse an ASL block and print the record as JSON.
    Parse {
        /// Target record kind.
        #[arg(long)]
        kind: RecordKind,

        /// Input file; stdin when absent.
        file: Option<PathBuf>,
    },

    /// Validate a JSON payload against a kind's schema.
    Check {
        /// Target record kind.
        #[arg(long)]
        kind: RecordKind,

        /// Input file; stdin when absent.
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["aethero-mem", "serve"]);
        match cli.command {
            Command::Serve {
                retention_days,
                cache_ttl_secs,
                max_page_size,
                data_file,
                ..
            } => {
                assert_eq!(retention_days, 30);
                assert_eq!(cache_ttl_secs, 3600);
                assert_eq!(max_page_size, 1000);
                assert!(data_file.is_none());
            }
            other => panic!("expected serve, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_takes_kind() {
        let cli = Cli::parse_from(["aethero-mem", "parse", "--kind", "agent_state"]);
        match cli.command {
            Command::Parse { kind, file } => {
                assert_eq!(kind, RecordKind::AgentState);
                assert!(file.is_none());
            }
            other => panic!("expected parse, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_fails() {
        assert!(Cli::try_parse_from(["aethero-mem", "parse", "--kind", "nope"]).is_err());
    }
}
