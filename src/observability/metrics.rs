//! Operation counters.
//!
//! - Counters only, monotonic, reset on process start.
//! - Thread-safe with relaxed atomics; metrics tolerate eventual
//!   consistency.
//! - Read out as a serializable snapshot for the external monitoring
//!   stack.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::schema::RecordKind;

/// Counters for one record kind.
#[derive(Debug, Default)]
struct KindCounters {
    creates: AtomicU64,
    gets: AtomicU64,
    updates: AtomicU64,
    lists: AtomicU64,
    validation_failures: AtomicU64,
}

/// Registry of all operational counters.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    kinds: [KindCounters; 4],
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    sweep_runs: AtomicU64,
    sweep_deleted: AtomicU64,
    sweep_failures: AtomicU64,
    storage_retries: AtomicU64,
}

fn slot(kind: RecordKind) -> usize {
    match kind {
        RecordKind::AgentState => 0,
        RecordKind::DecisionRecord => 1,
        RecordKind::ReflectionResult => 2,
        RecordKind::PipelineExecution => 3,
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_create(&self, kind: RecordKind) {
        self.kinds[slot(kind)].creates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self, kind: RecordKind) {
        self.kinds[slot(kind)].gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update(&self, kind: RecordKind) {
        self.kinds[slot(kind)].updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_list(&self, kind: RecordKind) {
        self.kinds[slot(kind)].lists.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_failure(&self, kind: RecordKind) {
        self.kinds[slot(kind)]
            .validation_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep_run(&self) {
        self.sweep_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep_deleted(&self, count: u64) {
        self.sweep_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_sweep_failure(&self) {
        self.sweep_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_storage_retry(&self) {
        self.storage_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut kinds = Vec::with_capacity(4);
        for kind in RecordKind::ALL {
            let counters = &self.kinds[slot(kind)];
            kinds.push(KindSnapshot {
                kind,
                creates: counters.creates.load(Ordering::Relaxed),
                gets: counters.gets.load(Ordering::Relaxed),
                updates: counters.updates.load(Ordering::Relaxed),
                lists: counters.lists.load(Ordering::Relaxed),
                validation_failures: counters.validation_failures.load(Ordering::Relaxed),
            });
        }
        MetricsSnapshot {
            kinds,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            sweep_runs: self.sweep_runs.load(Ordering::Relaxed),
            sweep_deleted: self.sweep_deleted.load(Ordering::Relaxed),
            sweep_failures: self.sweep_failures.load(Ordering::Relaxed),
            storage_retries: self.storage_retries.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot for one kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindSnapshot {
    pub kind: RecordKind,
    pub creates: u64,
    pub gets: u64,
    pub updates: u64,
    pub lists: u64,
    pub validation_failures: u64,
}

/// Serializable snapshot of every counter.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub kinds: Vec<KindSnapshot>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub sweep_runs: u64,
    pub sweep_deleted: u64,
    pub sweep_failures: u64,
    pub storage_retries: u64,
}
