//! Notification channel for sweeper deletions.
//!
//! Every record the sweeper purges is reported here so an external
//! audit consumer can track what was removed and by which run.

use std::sync::Mutex;

use uuid::Uuid;

use crate::schema::RecordKind;

/// One purged record.
#[derive(Debug, Clone)]
pub struct SweepNotice {
    /// Sweep run that performed the deletion.
    pub run_id: Uuid,
    pub kind: RecordKind,
    pub id: String,
}

/// Sink for sweep deletion notices.
pub trait SweepAudit: Send + Sync {
    fn record_deleted(&self, notice: &SweepNotice);
}

/// Default sink: one structured log line per deletion.
#[derive(Debug, Default)]
pub struct LogAudit;

impl SweepAudit for LogAudit {
    fn record_deleted(&self, notice: &SweepNotice) {
        tracing::info!(
            run_id = %notice.run_id,
            kind = %notice.kind,
            id = %notice.id,
            "retention sweep deleted record"
        );
    }
}

/// Capturing sink for tests.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    notices: Mutex<Vec<SweepNotice>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<SweepNotice> {
        self.notices.lock().expect("audit lock poisoned").clone()
    }
}

impl SweepAudit for MemoryAudit {
    fn record_deleted(&self, notice: &SweepNotice) {
        self.notices
            .lock()
            .expect("audit lock poisoned")
            .push(notice.clone());
    }
}
