//! Retention sweeper.
//!
//! Walks each kind's recency index from the oldest end and deletes
//! every record past the retention horizon, from the store and its
//! indexes, invalidating the kind's cache entries on the way.
//!
//! - A failure on one record never aborts the sweep: log and continue.
//! - Deletes are idempotent, so an interrupted sweep re-runs safely.
//! - Runs on its own timer task, independent of request handling;
//!   `run_once` is callable directly for tests and one-shot tooling.

use std::sync::Arc;

use uuid::Uuid;

use crate::clock::Clock;
use crate::schema::RecordKind;
use crate::store::MemStore;

use super::audit::{SweepAudit, SweepNotice};

/// Outcome of one sweep run.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub run_id: Uuid,
    /// Expired records considered.
    pub examined: usize,
    /// Records actually deleted this run.
    pub deleted: usize,
    /// Records whose deletion failed and was skipped.
    pub failed: usize,
}

/// Periodic purge of records older than the retention horizon.
pub struct RetentionSweeper {
    store: Arc<MemStore>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn SweepAudit>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<MemStore>, clock: Arc<dyn Clock>, audit: Arc<dyn SweepAudit>) -> Self {
        Self {
            store,
            clock,
            audit,
        }
    }

    /// One full sweep across every kind.
    pub fn run_once(&self) -> SweepReport {
        let run_id = Uuid::new_v4();
        let cutoff = self.clock.now() - self.store.config().retention_horizon();
        let metrics = self.store.metrics().clone();
        metrics.record_sweep_run();

        let mut report = SweepReport {
            run_id,
            examined: 0,
            deleted: 0,
            failed: 0,
        };

        for kind in RecordKind::ALL {
            for id in self.store.expired_ids(kind, cutoff) {
                report.examined += 1;
                match self.store.delete(kind, &id) {
                    Ok(true) => {
                        report.deleted += 1;
                        self.audit.record_deleted(&SweepNotice {
                            run_id,
                            kind,
                            id,
                        });
                    }
                    // Already gone: a previous, interrupted run got it.
                    Ok(false) => {}
                    Err(error) => {
                        report.failed += 1;
                        metrics.record_sweep_failure();
                        tracing::warn!(
                            run_id = %run_id,
                            kind = %kind,
                            id = %id,
                            error = %error,
                            "sweep delete failed; continuing"
                        );
                    }
                }
            }
        }

        metrics.record_sweep_deleted(report.deleted as u64);
        tracing::info!(
            run_id = %run_id,
            examined = report.examined,
            deleted = report.deleted,
            failed = report.failed,
            "retention sweep finished"
        );
        report
    }

    /// Timer loop driving `run_once` at the configured interval.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.store.config().sweep_interval());
        // The first tick fires immediately; skip it so a fresh boot
        // does not sweep before serving.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.run_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::StoreConfig;
    use crate::observability::MetricsRegistry;
    use crate::record::Record;
    use crate::retention::audit::MemoryAudit;
    use crate::schema::SchemaRegistry;
    use crate::store::{ListQuery, MemoryBackend};
    use chrono::Duration;
    use serde_json::json;

    fn setup() -> (Arc<MemStore>, Arc<FixedClock>, Arc<MemoryAudit>, RetentionSweeper) {
        let registry = Arc::new(SchemaRegistry::builtin());
        let clock = Arc::new(FixedClock::new(
            "2024-02-15T00:00:00Z".parse().unwrap(),
        ));
        let store = Arc::new(
            MemStore::open(
                StoreConfig {
                    retry_base_delay_ms: 0,
                    ..StoreConfig::default()
                },
                registry,
                Arc::new(MemoryBackend::new()),
                clock.clone(),
                Arc::new(MetricsRegistry::new()),
            )
            .unwrap(),
        );
        let audit = Arc::new(MemoryAudit::new());
        let sweeper = RetentionSweeper::new(store.clone(), clock.clone(), audit.clone());
        (store, clock, audit, sweeper)
    }

    fn put_agent_state(store: &MemStore, id: &str, ts: &str) {
        let schema = store.registry().get(crate::schema::RecordKind::AgentState);
        let record = Record::from_value(
            crate::schema::RecordKind::AgentState,
            schema,
            json!({"agent_id": id, "timestamp": ts, "state": "idle"}),
        )
        .unwrap();
        store.create(record).unwrap();
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (store, _clock, audit, sweeper) = setup();
        // Clock sits at 2024-02-15; horizon is 30 days.
        put_agent_state(&store, "bot_old", "2024-01-01T00:00:00Z");
        put_agent_state(&store, "bot_new", "2024-02-10T00:00:00Z");

        let report = sweeper.run_once();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 0);

        assert!(store.get(RecordKind::AgentState, "bot_old").is_err());
        assert!(store.get(RecordKind::AgentState, "bot_new").is_ok());

        // The deletion was reported to the audit channel.
        let notices = audit.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].id, "bot_old");
    }

    #[test]
    fn test_sweep_clears_indexes_too() {
        let (store, _clock, _audit, sweeper) = setup();
        put_agent_state(&store, "bot_old", "2024-01-01T00:00:00Z");
        sweeper.run_once();

        let page = store
            .list(
                RecordKind::AgentState,
                &ListQuery::new().filter("state", json!("idle")),
            )
            .unwrap();
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_sweep_is_reentrant() {
        let (store, _clock, _audit, sweeper) = setup();
        put_agent_state(&store, "bot_old", "2024-01-01T00:00:00Z");

        let first = sweeper.run_once();
        assert_eq!(first.deleted, 1);
        let second = sweeper.run_once();
        assert_eq!(second.deleted, 0);
        assert_eq!(second.failed, 0);
        assert!(store.is_empty(RecordKind::AgentState));
    }

    #[test]
    fn test_advancing_clock_expires_records() {
        let (store, clock, _audit, sweeper) = setup();
        put_agent_state(&store, "bot_1", "2024-02-10T00:00:00Z");

        assert_eq!(sweeper.run_once().deleted, 0);
        clock.advance(Duration::days(40));
        assert_eq!(sweeper.run_once().deleted, 1);
    }

    #[test]
    fn test_sweep_covers_every_kind() {
        let (store, _clock, _audit, sweeper) = setup();
        put_agent_state(&store, "bot_old", "2024-01-01T00:00:00Z");
        let schema = store.registry().get(RecordKind::DecisionRecord);
        let decision = Record::from_value(
            RecordKind::DecisionRecord,
            schema,
            json!({
                "decision_id": "dec_old",
                "timestamp": "2024-01-01T00:00:00Z",
                "agent_id": "bot_1",
                "decision": {"action": "noop", "parameters": {}},
                "rationale": ["r"]
            }),
        )
        .unwrap();
        store.create(decision).unwrap();

        let report = sweeper.run_once();
        assert_eq!(report.deleted, 2);
        assert!(store.is_empty(RecordKind::AgentState));
        assert!(store.is_empty(RecordKind::DecisionRecord));
    }

}
