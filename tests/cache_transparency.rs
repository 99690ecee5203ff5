//! Query cache transparency.
//!
//! The cache must never change observable results, only latency: its
//! presence shows up in the hit/miss counters alone, and any write to
//! a kind invalidates that kind's cached reads.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use aethero_mem::clock::FixedClock;
use aethero_mem::config::StoreConfig;
use aethero_mem::observability::MetricsRegistry;
use aethero_mem::record::Record;
use aethero_mem::schema::{RecordKind, SchemaRegistry};
use aethero_mem::store::{ListQuery, MemStore, MemoryBackend};

// =============================================================================
// Helpers
// =============================================================================

fn open_store(cache_ttl_secs: u64) -> (Arc<MemStore>, Arc<FixedClock>, Arc<MetricsRegistry>) {
    let registry = Arc::new(SchemaRegistry::builtin());
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let metrics = Arc::new(MetricsRegistry::new());
    let store = Arc::new(
        MemStore::open(
            StoreConfig {
                cache_ttl_secs,
                retry_base_delay_ms: 0,
                ..StoreConfig::default()
            },
            registry,
            Arc::new(MemoryBackend::new()),
            clock.clone(),
            metrics.clone(),
        )
        .unwrap(),
    );
    (store, clock, metrics)
}

fn put_agent_state(store: &MemStore, id: &str, ts: &str, state: &str) {
    let schema = store.registry().get(RecordKind::AgentState);
    let record = Record::from_value(
        RecordKind::AgentState,
        schema,
        json!({"agent_id": id, "timestamp": ts, "state": state}),
    )
    .unwrap();
    store.create(record).unwrap();
}

// =============================================================================
// Transparency
// =============================================================================

#[test]
fn test_cached_and_uncached_stores_agree() {
    let (cached, _, _) = open_store(3600);
    let (uncached, _, _) = open_store(0);

    for store in [&cached, &uncached] {
        put_agent_state(store, "bot_1", "2024-01-01T00:00:00Z", "idle");
        put_agent_state(store, "bot_2", "2024-01-02T00:00:00Z", "processing");
    }

    let query = ListQuery::new().filter("state", json!("idle")).limit(10);
    for _ in 0..3 {
        let a = cached.list(RecordKind::AgentState, &query).unwrap();
        let b = uncached.list(RecordKind::AgentState, &query).unwrap();
        assert_eq!(a.records.len(), b.records.len());
        for (x, y) in a.records.iter().zip(b.records.iter()) {
            assert_eq!(**x, **y);
        }
    }
}

#[test]
fn test_repeat_reads_hit_the_cache() {
    let (store, _, metrics) = open_store(3600);
    put_agent_state(&store, "bot_1", "2024-01-01T00:00:00Z", "idle");

    store.get(RecordKind::AgentState, "bot_1").unwrap();
    let misses_after_first = metrics.cache_misses();
    store.get(RecordKind::AgentState, "bot_1").unwrap();
    store.get(RecordKind::AgentState, "bot_1").unwrap();

    assert!(metrics.cache_hits() >= 2);
    assert_eq!(metrics.cache_misses(), misses_after_first);
}

#[test]
fn test_write_invalidates_kind_reads() {
    let (store, _, _) = open_store(3600);
    put_agent_state(&store, "bot_1", "2024-01-01T00:00:00Z", "idle");

    let before = store
        .list(RecordKind::AgentState, &ListQuery::new().limit(10))
        .unwrap();
    assert_eq!(before.records.len(), 1);

    // A write to the same kind must not leave the cached page visible.
    put_agent_state(&store, "bot_2", "2024-01-02T00:00:00Z", "idle");
    let after = store
        .list(RecordKind::AgentState, &ListQuery::new().limit(10))
        .unwrap();
    assert_eq!(after.records.len(), 2);
}

#[test]
fn test_update_refreshes_point_read() {
    let (store, _, _) = open_store(3600);
    put_agent_state(&store, "bot_1", "2024-01-01T00:00:00Z", "idle");
    store.get(RecordKind::AgentState, "bot_1").unwrap();

    let schema = store.registry().get(RecordKind::AgentState);
    let replacement = Record::from_value(
        RecordKind::AgentState,
        schema,
        json!({"agent_id": "bot_1", "timestamp": "2024-01-01T01:00:00Z", "state": "error"}),
    )
    .unwrap();
    store
        .update(RecordKind::AgentState, "bot_1", replacement)
        .unwrap();

    let fetched = store.get(RecordKind::AgentState, "bot_1").unwrap();
    assert_eq!(fetched.fields["state"], json!("error"));
}

#[test]
fn test_expired_entries_fall_back_to_store() {
    let (store, clock, metrics) = open_store(60);
    put_agent_state(&store, "bot_1", "2024-01-01T00:00:00Z", "idle");

    store.get(RecordKind::AgentState, "bot_1").unwrap();
    store.get(RecordKind::AgentState, "bot_1").unwrap();
    let hits_before = metrics.cache_hits();
    assert!(hits_before >= 1);

    clock.advance(Duration::seconds(120));
    // TTL passed: the next read misses but still answers correctly.
    let fetched = store.get(RecordKind::AgentState, "bot_1").unwrap();
    assert_eq!(fetched.fields["agent_id"], json!("bot_1"));
}

#[test]
fn test_writes_to_other_kind_do_not_invalidate() {
    let (store, _, metrics) = open_store(3600);
    put_agent_state(&store, "bot_1", "2024-01-01T00:00:00Z", "idle");
    store.get(RecordKind::AgentState, "bot_1").unwrap();

    // A decision write touches a different kind's cache only.
    let schema = store.registry().get(RecordKind::DecisionRecord);
    let record = Record::from_value(
        RecordKind::DecisionRecord,
        schema,
        json!({
            "decision_id": "dec_1",
            "timestamp": "2024-01-01T00:00:00Z",
            "agent_id": "bot_1",
            "decision": {"action": "noop", "parameters": {}},
            "rationale": ["r"]
        }),
    )
    .unwrap();
    store.create(record).unwrap();

    let hits_before = metrics.cache_hits();
    store.get(RecordKind::AgentState, "bot_1").unwrap();
    assert_eq!(metrics.cache_hits(), hits_before + 1);
}
