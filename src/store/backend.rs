//! Durable storage behind the store.
//!
//! The engine owns the authoritative in-memory state; the backend is
//! the durability layer it writes through and replays at startup.
//! Backends are deliberately dumb: put, tombstone, full scan.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::schema::RecordKind;

/// A backend I/O failure. Possibly transient; the engine retries these
/// with bounded backoff.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// Durable record storage.
pub trait StorageBackend: Send + Sync {
    /// Persists the current body of a record.
    fn persist(&self, kind: RecordKind, id: &str, body: &Value) -> Result<(), BackendError>;

    /// Records a deletion. Must be idempotent.
    fn remove(&self, kind: RecordKind, id: &str) -> Result<(), BackendError>;

    /// Returns every live record for startup replay. Order is
    /// unspecified; index rebuild does not depend on it.
    fn scan(&self) -> Result<Vec<(RecordKind, String, Value)>, BackendError>;
}

/// Volatile backend for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: Mutex<BTreeMap<(RecordKind, String), Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn persist(&self, kind: RecordKind, id: &str, body: &Value) -> Result<(), BackendError> {
        let mut rows = self.rows.lock().expect("backend lock poisoned");
        rows.insert((kind, id.to_string()), body.clone());
        Ok(())
    }

    fn remove(&self, kind: RecordKind, id: &str) -> Result<(), BackendError> {
        let mut rows = self.rows.lock().expect("backend lock poisoned");
        rows.remove(&(kind, id.to_string()));
        Ok(())
    }

    fn scan(&self) -> Result<Vec<(RecordKind, String, Value)>, BackendError> {
        let rows = self.rows.lock().expect("backend lock poisoned");
        Ok(rows
            .iter()
            .map(|((kind, id), body)| (*kind, id.clone(), body.clone()))
            .collect())
    }
}

/// One line of the append-only log.
#[derive(Debug, Serialize, Deserialize)]
struct LogLine {
    kind: RecordKind,
    id: String,
    /// `put` carries a body; `del` is a tombstone.
    op: LogOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogOp {
    Put,
    Del,
}

/// Append-only JSON-lines file backend.
///
/// Every mutation appends one line and flushes; scan replays the log,
/// last write wins, tombstones drop. No compaction; the retention
/// sweeper bounds growth of the live set, and the log itself can be
/// rewritten offline.
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileBackend {
    /// Opens (or creates) the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BackendError(format!("open {}: {}", path.display(), e)))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn append(&self, line: &LogLine) -> Result<(), BackendError> {
        let mut encoded = serde_json::to_string(line)
            .map_err(|e| BackendError(format!("encode log line: {}", e)))?;
        encoded.push('\n');
        let mut file = self.file.lock().expect("backend lock poisoned");
        file.write_all(encoded.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| BackendError(format!("append {}: {}", self.path.display(), e)))
    }
}

impl StorageBackend for FileBackend {
    fn persist(&self, kind: RecordKind, id: &str, body: &Value) -> Result<(), BackendError> {
        self.append(&LogLine {
            kind,
            id: id.to_string(),
            op: LogOp::Put,
            body: Some(body.clone()),
        })
    }

    fn remove(&self, kind: RecordKind, id: &str) -> Result<(), BackendError> {
        self.append(&LogLine {
            kind,
            id: id.to_string(),
            op: LogOp::Del,
            body: None,
        })
    }

    fn scan(&self) -> Result<Vec<(RecordKind, String, Value)>, BackendError> {
        let file = File::open(&self.path)
            .map_err(|e| BackendError(format!("open {}: {}", self.path.display(), e)))?;
        let mut live: BTreeMap<(RecordKind, String), Value> = BTreeMap::new();

        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line =
                line.map_err(|e| BackendError(format!("read {}: {}", self.path.display(), e)))?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: LogLine = match serde_json::from_str(&line) {
                Ok(parsed) => parsed,
                Err(e) => {
                    // A torn trailing line from an interrupted write is
                    // recoverable; skip it rather than refuse to start.
                    tracing::warn!(line = number + 1, error = %e, "skipping unreadable log line");
                    continue;
                }
            };
            let key = (parsed.kind, parsed.id);
            match (parsed.op, parsed.body) {
                (LogOp::Put, Some(body)) => {
                    live.insert(key, body);
                }
                (LogOp::Del, _) | (LogOp::Put, None) => {
                    live.remove(&key);
                }
            }
        }

        Ok(live
            .into_iter()
            .map(|((kind, id), body)| (kind, id, body))
            .collect())
    }
}
