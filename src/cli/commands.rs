//! Command dispatch.

use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::api::ApiServer;
use crate::asl::AslParser;
use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::observability::MetricsRegistry;
use crate::record::Record;
use crate::retention::{LogAudit, RetentionSweeper};
use crate::schema::{RecordKind, SchemaRegistry};
use crate::store::{FileBackend, MemStore, MemoryBackend, StorageBackend};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Parses arguments and runs the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Serve {
            listen,
            data_file,
            retention_days,
            cache_ttl_secs,
            sweep_interval_secs,
            max_page_size,
        } => serve(
            listen,
            data_file,
            StoreConfig {
                retention_days,
                cache_ttl_secs,
                sweep_interval_secs,
                max_results_per_page: max_page_size,
                ..StoreConfig::default()
            },
        ),
        Command::Parse { kind, file } => parse(kind, file.as_deref()),
        Command::Check { kind, file } => check(kind, file.as_deref()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn serve(listen: SocketAddr, data_file: Option<PathBuf>, cfg: StoreConfig) -> CliResult<()> {
    let registry = Arc::new(SchemaRegistry::builtin());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics = Arc::new(MetricsRegistry::new());
    let backend: Arc<dyn StorageBackend> = match &data_file {
        Some(path) => Arc::new(FileBackend::open(path)?),
        None => Arc::new(MemoryBackend::new()),
    };

    let store = Arc::new(MemStore::open(
        cfg,
        registry,
        backend,
        clock.clone(),
        metrics,
    )?);
    let sweeper = Arc::new(RetentionSweeper::new(
        store.clone(),
        clock,
        Arc::new(LogAudit),
    ));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        tokio::spawn(sweeper.run());
        ApiServer::new(store).serve(listen).await
    })?;
    Ok(())
}

fn read_input(file: Option<&Path>) -> CliResult<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

fn parse(kind: RecordKind, file: Option<&Path>) -> CliResult<()> {
    let input = read_input(file)?;
    let parser = AslParser::new(Arc::new(SchemaRegistry::builtin()));
    let (record, errors) = parser.parse(kind, &input);

    println!("{}", serde_json::to_string_pretty(&record.to_value()).unwrap_or_default());
    if errors.is_empty() {
        Ok(())
    } else {
        for error in &errors {
            eprintln!("{}", error);
        }
        Err(CliError::Invalid {
            problems: errors.len(),
        })
    }
}

fn check(kind: RecordKind, file: Option<&Path>) -> CliResult<()> {
    let input = read_input(file)?;
    let value: serde_json::Value =
        serde_json::from_str(&input).map_err(|e| CliError::BadInput(e.to_string()))?;

    let registry = SchemaRegistry::builtin();
    let schema = registry.get(kind);
    let record = match Record::from_value(kind, schema, value) {
        Ok(record) => record,
        Err(errors) => {
            for error in &errors {
                eprintln!("{}", error);
            }
            return Err(CliError::Invalid {
                problems: errors.len(),
            });
        }
    };

    let violations = registry.validate(kind, &record.fields);
    if violations.is_empty() {
        println!("valid {}", kind);
        Ok(())
    } else {
        for violation in &violations {
            eprintln!("{}", violation);
        }
        Err(CliError::Invalid {
            problems: violations.len(),
        })
    }
}
