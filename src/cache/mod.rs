//! Short-TTL read cache in front of get/list.
//!
//! Keyed by `(kind, id)` for point reads and by the normalized query
//! signature for list reads. Invalidation is coarse: any write to a
//! kind drops every cached entry for that kind, trading hit-rate for
//! correctness. The cache is a pure performance layer; disabling it
//! (ttl = 0) never changes observable results.
//!
//! Writers invalidate and readers fill inside the owning kind's
//! partition lock, so a fill can never race a concurrent write into
//! staleness.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::observability::MetricsRegistry;
use crate::record::Record;
use crate::schema::RecordKind;

/// Cache key: a point read or a normalized list signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Point(RecordKind, String),
    List(RecordKind, String),
}

impl CacheKey {
    fn kind(&self) -> RecordKind {
        match self {
            CacheKey::Point(kind, _) | CacheKey::List(kind, _) => *kind,
        }
    }
}

/// A cached read result.
#[derive(Debug, Clone)]
pub enum Cached {
    Point(Arc<Record>),
    List {
        records: Vec<Arc<Record>>,
        has_more: bool,
    },
}

#[derive(Debug)]
struct CacheEntry {
    value: Cached,
    inserted_at: DateTime<Utc>,
}

/// TTL cache over read results.
pub struct QueryCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl QueryCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            ttl,
            clock,
            metrics,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn enabled(&self) -> bool {
        self.ttl > Duration::zero()
    }

    /// Looks up a fresh entry, counting the hit or miss.
    pub fn get(&self, key: &CacheKey) -> Option<Cached> {
        if !self.enabled() {
            return None;
        }
        let entries = self.entries.read().expect("cache lock poisoned");
        let hit = entries.get(key).and_then(|entry| {
            if self.clock.now() - entry.inserted_at < self.ttl {
                Some(entry.value.clone())
            } else {
                None
            }
        });
        match &hit {
            Some(_) => self.metrics.record_cache_hit(),
            None => self.metrics.record_cache_miss(),
        }
        hit
    }

    /// Stores a read result.
    pub fn put(&self, key: CacheKey, value: Cached) {
        if !self.enabled() {
            return;
        }
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
        };
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key, entry);
    }

    /// Drops every cached entry for a kind.
    pub fn invalidate_kind(&self, kind: RecordKind) {
        if !self.enabled() {
            return;
        }
        self.entries
            .write()
            .expect("cache lock poisoned")
            .retain(|key, _| key.kind() != kind);
    }

    /// Number of live entries, expired included. Test hook.
    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn setup(ttl_secs: i64) -> (Arc<FixedClock>, Arc<MetricsRegistry>, QueryCache) {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let metrics = Arc::new(MetricsRegistry::new());
        let cache = QueryCache::new(
            Duration::seconds(ttl_secs),
            clock.clone(),
            metrics.clone(),
        );
        (clock, metrics, cache)
    }

    fn point_key(id: &str) -> CacheKey {
        CacheKey::Point(RecordKind::AgentState, id.to_string())
    }

    fn sample() -> Cached {
        Cached::Point(Arc::new(Record::new(RecordKind::AgentState)))
    }

    #[test]
    fn test_hit_within_ttl() {
        let (_clock, metrics, cache) = setup(60);
        cache.put(point_key("bot_1"), sample());
        assert!(cache.get(&point_key("bot_1")).is_some());
        assert_eq!(metrics.cache_hits(), 1);
    }

    #[test]
    fn test_expires_after_ttl() {
        let (clock, metrics, cache) = setup(60);
        cache.put(point_key("bot_1"), sample());
        clock.advance(Duration::seconds(61));
        assert!(cache.get(&point_key("bot_1")).is_none());
        assert_eq!(metrics.cache_misses(), 1);
    }

    #[test]
    fn test_invalidate_kind_is_coarse() {
        let (_clock, _metrics, cache) = setup(60);
        cache.put(point_key("bot_1"), sample());
        cache.put(
            CacheKey::List(RecordKind::AgentState, "state=idle".into()),
            Cached::List {
                records: vec![],
                has_more: false,
            },
        );
        cache.put(
            CacheKey::Point(RecordKind::DecisionRecord, "dec_1".into()),
            sample(),
        );

        cache.invalidate_kind(RecordKind::AgentState);

        assert!(cache.get(&point_key("bot_1")).is_none());
        assert!(cache
            .get(&CacheKey::Point(RecordKind::DecisionRecord, "dec_1".into()))
            .is_some());
    }

    #[test]
    fn test_zero_ttl_disables() {
        let (_clock, metrics, cache) = setup(0);
        cache.put(point_key("bot_1"), sample());
        assert!(cache.get(&point_key("bot_1")).is_none());
        assert!(cache.is_empty());
        // A disabled cache counts nothing.
        assert_eq!(metrics.cache_hits() + metrics.cache_misses(), 0);
    }
}
