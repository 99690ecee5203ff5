//! Retention sweep end-to-end.
//!
//! After a sweep, nothing older than the horizon remains in the store
//! or any index, deletions are audited, and an interrupted sweep can
//! re-run safely.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;

use aethero_mem::clock::FixedClock;
use aethero_mem::config::StoreConfig;
use aethero_mem::observability::MetricsRegistry;
use aethero_mem::record::Record;
use aethero_mem::retention::{MemoryAudit, RetentionSweeper};
use aethero_mem::schema::{RecordKind, SchemaRegistry};
use aethero_mem::store::{ListQuery, MemStore, MemoryBackend};

// =============================================================================
// Helpers
// =============================================================================

fn setup() -> (Arc<MemStore>, Arc<FixedClock>, Arc<MemoryAudit>, RetentionSweeper) {
    let registry = Arc::new(SchemaRegistry::builtin());
    let clock = Arc::new(FixedClock::new("2024-06-01T00:00:00Z".parse().unwrap()));
    let metrics = Arc::new(MetricsRegistry::new());
    let store = Arc::new(
        MemStore::open(
            StoreConfig {
                retry_base_delay_ms: 0,
                ..StoreConfig::default()
            },
            registry,
            Arc::new(MemoryBackend::new()),
            clock.clone(),
            metrics,
        )
        .unwrap(),
    );
    let audit = Arc::new(MemoryAudit::new());
    let sweeper = RetentionSweeper::new(store.clone(), clock.clone(), audit.clone());
    (store, clock, audit, sweeper)
}

fn put_agent_state(store: &MemStore, id: &str, ts: &str) {
    let schema = store.registry().get(RecordKind::AgentState);
    let record = Record::from_value(
        RecordKind::AgentState,
        schema,
        json!({"agent_id": id, "timestamp": ts, "state": "waiting"}),
    )
    .unwrap();
    store.create(record).unwrap();
}

fn put_execution(store: &MemStore, id: &str, ts: &str) {
    let schema = store.registry().get(RecordKind::PipelineExecution);
    let record = Record::from_value(
        RecordKind::PipelineExecution,
        schema,
        json!({"execution_id": id, "start_time": ts, "status": "completed"}),
    )
    .unwrap();
    store.create(record).unwrap();
}

// =============================================================================
// Sweep behavior
// =============================================================================

#[test]
fn test_nothing_older_than_horizon_survives() {
    let (store, _clock, _audit, sweeper) = setup();

    // Clock at 2024-06-01, horizon 30 days: cutoff 2024-05-02.
    put_agent_state(&store, "bot_ancient", "2024-01-15T00:00:00Z");
    put_agent_state(&store, "bot_borderline", "2024-05-02T00:00:00Z");
    put_agent_state(&store, "bot_fresh", "2024-05-30T00:00:00Z");
    put_execution(&store, "exec_old", "2024-03-01T00:00:00Z");
    put_execution(&store, "exec_new", "2024-05-28T00:00:00Z");

    let report = sweeper.run_once();
    assert_eq!(report.deleted, 2);
    assert_eq!(report.failed, 0);

    // Store state.
    assert!(store.get(RecordKind::AgentState, "bot_ancient").is_err());
    assert!(store.get(RecordKind::AgentState, "bot_borderline").is_ok());
    assert!(store.get(RecordKind::AgentState, "bot_fresh").is_ok());
    assert!(store.get(RecordKind::PipelineExecution, "exec_old").is_err());
    assert!(store.get(RecordKind::PipelineExecution, "exec_new").is_ok());

    // Index state: neither the recency index nor the hash index still
    // answers for the purged records.
    let all = store
        .list(RecordKind::AgentState, &ListQuery::new().limit(100))
        .unwrap();
    assert_eq!(all.records.len(), 2);
    let waiting = store
        .list(
            RecordKind::AgentState,
            &ListQuery::new().filter("state", json!("waiting")).limit(100),
        )
        .unwrap();
    assert_eq!(waiting.records.len(), 2);
    let completed = store
        .list(
            RecordKind::PipelineExecution,
            &ListQuery::new().filter("status", json!("completed")).limit(100),
        )
        .unwrap();
    assert_eq!(completed.records.len(), 1);
}

#[test]
fn test_deletions_reported_to_audit_channel() {
    let (store, _clock, audit, sweeper) = setup();
    put_agent_state(&store, "bot_old", "2024-01-01T00:00:00Z");
    put_execution(&store, "exec_old", "2024-02-01T00:00:00Z");

    let report = sweeper.run_once();

    let notices = audit.notices();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.run_id == report.run_id));
    let mut purged: Vec<_> = notices.iter().map(|n| n.id.as_str()).collect();
    purged.sort();
    assert_eq!(purged, vec!["bot_old", "exec_old"]);
}

#[test]
fn test_sweep_reentrant_after_interruption() {
    let (store, _clock, _audit, sweeper) = setup();
    put_agent_state(&store, "bot_a", "2024-01-01T00:00:00Z");
    put_agent_state(&store, "bot_b", "2024-01-02T00:00:00Z");

    // Simulate a half-finished earlier run: one expired record was
    // already deleted out-of-band.
    store.delete(RecordKind::AgentState, "bot_a").unwrap();

    let report = sweeper.run_once();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 0);
    assert!(store.is_empty(RecordKind::AgentState));
}

#[test]
fn test_records_age_into_expiry() {
    let (store, clock, _audit, sweeper) = setup();
    put_agent_state(&store, "bot_1", "2024-05-30T00:00:00Z");

    assert_eq!(sweeper.run_once().deleted, 0);
    assert_eq!(store.len(RecordKind::AgentState), 1);

    clock.advance(Duration::days(45));
    assert_eq!(sweeper.run_once().deleted, 1);
    assert!(store.is_empty(RecordKind::AgentState));
}

#[test]
fn test_sweep_counters_accumulate() {
    let (store, _clock, _audit, sweeper) = setup();
    put_agent_state(&store, "bot_old", "2024-01-01T00:00:00Z");

    sweeper.run_once();
    sweeper.run_once();

    let snapshot = store.metrics().snapshot();
    assert_eq!(snapshot.sweep_runs, 2);
    assert_eq!(snapshot.sweep_deleted, 1);
    assert_eq!(snapshot.sweep_failures, 0);
}
