//! The record store engine.
//!
//! Owns the authoritative record maps, one partition per kind, each
//! guarded by its own `RwLock`. A partition bundles the record map
//! with that kind's indexes so a single write lock spans the backend
//! write, the map mutation, the index update, and the cache
//! invalidation: no reader ever observes a record present in the
//! store but absent from its indexes, or vice versa. Reads of
//! different kinds and cache hits proceed fully concurrently.
//!
//! Backend I/O failures are retried with bounded exponential backoff
//! before surfacing as `StorageUnavailable`; schema and identity
//! violations are deterministic caller errors and are never retried.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::{Cached, CacheKey, QueryCache};
use crate::clock::Clock;
use crate::config::StoreConfig;
use crate::index::KindIndexes;
use crate::observability::MetricsRegistry;
use crate::record::Record;
use crate::schema::{FieldError, RecordKind, SchemaRegistry};

use super::backend::{BackendError, StorageBackend};
use super::errors::{StoreError, StoreResult};
use super::query::{ListQuery, Page, SortOrder};

#[derive(Debug, Clone)]
struct Entry {
    record: Arc<Record>,
    recency: DateTime<Utc>,
}

struct Partition {
    records: HashMap<String, Entry>,
    indexes: KindIndexes,
}

fn slot(kind: RecordKind) -> usize {
    match kind {
        RecordKind::AgentState => 0,
        RecordKind::DecisionRecord => 1,
        RecordKind::ReflectionResult => 2,
        RecordKind::PipelineExecution => 3,
    }
}

/// The Aethero_Mem record store.
pub struct MemStore {
    cfg: StoreConfig,
    registry: Arc<SchemaRegistry>,
    backend: Arc<dyn StorageBackend>,
    cache: QueryCache,
    metrics: Arc<MetricsRegistry>,
    partitions: [RwLock<Partition>; 4],
}

impl MemStore {
    /// Opens the store: replays the backend and rebuilds every index.
    ///
    /// Unreadable persisted rows are logged and skipped rather than
    /// refusing startup; the backend is durable but not trusted to be
    /// pristine.
    pub fn open(
        cfg: StoreConfig,
        registry: Arc<SchemaRegistry>,
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsRegistry>,
    ) -> StoreResult<Self> {
        let cache = QueryCache::new(cfg.cache_ttl(), clock, metrics.clone());
        let partitions = [
            RwLock::new(Partition {
                records: HashMap::new(),
                indexes: KindIndexes::new(registry.get(RecordKind::AgentState)),
            }),
            RwLock::new(Partition {
                records: HashMap::new(),
                indexes: KindIndexes::new(registry.get(RecordKind::DecisionRecord)),
            }),
            RwLock::new(Partition {
                records: HashMap::new(),
                indexes: KindIndexes::new(registry.get(RecordKind::ReflectionResult)),
            }),
            RwLock::new(Partition {
                records: HashMap::new(),
                indexes: KindIndexes::new(registry.get(RecordKind::PipelineExecution)),
            }),
        ];
        let store = Self {
            cfg,
            registry,
            backend,
            cache,
            metrics,
            partitions,
        };

        let rows = store.with_retry(|| store.backend.scan())?;
        for (kind, id, body) in rows {
            let schema = store.registry.get(kind);
            match Record::from_value(kind, schema, body) {
                Ok(record) => {
                    let Some(recency) = record.recency(schema) else {
                        tracing::warn!(kind = %kind, id = %id, "persisted record has no recency; skipping");
                        continue;
                    };
                    let mut part = store.partition_write(kind);
                    part.records.insert(
                        id,
                        Entry {
                            record: Arc::new(record),
                            recency,
                        },
                    );
                }
                Err(errors) => {
                    tracing::warn!(kind = %kind, id = %id, violations = errors.len(), "persisted record invalid; skipping");
                }
            }
        }
        for kind in RecordKind::ALL {
            store.rebuild_indexes(kind);
        }
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Creates a record. The candidate is re-validated here: the store
    /// never trusts callers to have gone through the parser.
    pub fn create(&self, record: Record) -> StoreResult<Arc<Record>> {
        let kind = record.kind;
        let schema = self.registry.get(kind);

        let violations = self.registry.validate(kind, &record.fields);
        if !violations.is_empty() {
            self.metrics.record_validation_failure(kind);
            return Err(StoreError::SchemaViolation(violations));
        }
        let id = self.require_id(&record)?;
        let recency = self.require_recency(&record)?;
        let record = Arc::new(record);

        let mut part = self.partition_write(kind);
        if part.records.contains_key(&id) {
            return Err(StoreError::DuplicateId { kind, id });
        }
        self.with_retry(|| self.backend.persist(kind, &id, &record.to_value()))?;
        part.indexes.apply_write(schema, &id, &record, recency, None);
        part.records.insert(
            id,
            Entry {
                record: record.clone(),
                recency,
            },
        );
        self.cache.invalidate_kind(kind);
        self.metrics.record_create(kind);
        Ok(record)
    }

    /// Point read, through the cache.
    pub fn get(&self, kind: RecordKind, id: &str) -> StoreResult<Arc<Record>> {
        self.metrics.record_get(kind);
        let key = CacheKey::Point(kind, id.to_string());
        if let Some(Cached::Point(record)) = self.cache.get(&key) {
            return Ok(record);
        }

        let part = self.partition_read(kind);
        match part.records.get(id) {
            Some(entry) => {
                // Fill while holding the read lock; a writer needs the
                // write lock to invalidate, so this cannot go stale.
                self.cache.put(key, Cached::Point(entry.record.clone()));
                Ok(entry.record.clone())
            }
            None => Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            }),
        }
    }

    /// Full-replace update, only for kinds marked mutable.
    pub fn update(&self, kind: RecordKind, id: &str, record: Record) -> StoreResult<Arc<Record>> {
        let schema = self.registry.get(kind);
        if !schema.mutable {
            return Err(StoreError::Immutable(format!(
                "kind {} is append-only",
                kind
            )));
        }

        let violations = self.registry.validate(kind, &record.fields);
        if !violations.is_empty() {
            self.metrics.record_validation_failure(kind);
            return Err(StoreError::SchemaViolation(violations));
        }
        let new_id = self.require_id(&record)?;
        if new_id != id {
            return Err(StoreError::Immutable(format!(
                "primary identifier is immutable: '{}' cannot become '{}'",
                id, new_id
            )));
        }
        let recency = self.require_recency(&record)?;
        let record = Arc::new(record);

        let mut part = self.partition_write(kind);
        let Some(old) = part.records.get(id).cloned() else {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        };
        self.with_retry(|| self.backend.persist(kind, id, &record.to_value()))?;
        part.indexes.apply_write(
            schema,
            id,
            &record,
            recency,
            Some((&old.record, old.recency)),
        );
        part.records.insert(
            id.to_string(),
            Entry {
                record: record.clone(),
                recency,
            },
        );
        self.cache.invalidate_kind(kind);
        self.metrics.record_update(kind);
        Ok(record)
    }

    /// Paginated, filtered, time-bounded list.
    ///
    /// Never fails for an empty result; an empty page is a valid
    /// answer. Fails with `PageSizeExceeded` over the configured
    /// ceiling and `DeadlineExceeded` when the caller's deadline
    /// passes mid-scan (never a partial page).
    pub fn list(&self, kind: RecordKind, query: &ListQuery) -> StoreResult<Page> {
        self.metrics.record_list(kind);
        let limit = query.limit.unwrap_or(self.cfg.default_page_size);
        if limit > self.cfg.max_results_per_page {
            return Err(StoreError::PageSizeExceeded {
                requested: limit,
                max: self.cfg.max_results_per_page,
            });
        }
        check_deadline(query)?;

        let cache_key = CacheKey::List(kind, query.signature());
        if let Some(Cached::List { records, has_more }) = self.cache.get(&cache_key) {
            return Ok(Page { records, has_more });
        }

        let schema = self.registry.get(kind);
        let part = self.partition_read(kind);
        let desc = query.sort == SortOrder::Desc;

        // Index selection: a (field, recency) composite beats a hash
        // index beats the plain recency scan. Whatever the chosen
        // index already applied is skipped in the per-record checks.
        let mut pre_applied_filter = None;
        let mut time_pre_applied = false;
        let mut needs_sort = false;

        let candidates: Vec<String> = if let Some(position) = query
            .filters
            .iter()
            .position(|(field, _)| part.indexes.has_composite(field))
        {
            let (field, value) = &query.filters[position];
            pre_applied_filter = Some(position);
            time_pre_applied = true;
            part.indexes
                .composite_scan(
                    schema,
                    field,
                    value,
                    query.time_range.since,
                    query.time_range.until,
                    desc,
                )
                .unwrap_or_default()
        } else if let Some(position) = query
            .filters
            .iter()
            .position(|(field, _)| schema.hash_indexed(field))
        {
            let (field, value) = &query.filters[position];
            pre_applied_filter = Some(position);
            needs_sort = true;
            part.indexes.hash_lookup(field, value).unwrap_or_default()
        } else {
            time_pre_applied = true;
            part.indexes.recency_scan(
                schema,
                query.time_range.since,
                query.time_range.until,
                desc,
            )
        };

        let wanted = query.offset + limit + 1;
        let mut matches: Vec<(DateTime<Utc>, String, Arc<Record>)> = Vec::new();

        for (scanned, id) in candidates.iter().enumerate() {
            if scanned % 64 == 0 {
                check_deadline(query)?;
            }
            let Some(entry) = part.records.get(id) else {
                // Index points at a record the store no longer holds;
                // the divergence is repaired by an authoritative
                // rebuild, never surfaced to the caller.
                tracing::warn!(kind = %kind, id = %id, "index entry without record; skipping");
                continue;
            };
            if !time_pre_applied && !query.time_range.contains(entry.recency) {
                continue;
            }
            let remaining_ok = query.filters.iter().enumerate().all(|(i, (field, value))| {
                Some(i) == pre_applied_filter || entry.record.field(field) == Some(value)
            });
            if !remaining_ok {
                continue;
            }
            if let Some(threshold) = query.min_accuracy {
                match entry
                    .record
                    .field("metrics.accuracy")
                    .and_then(Value::as_f64)
                {
                    Some(accuracy) if accuracy >= threshold => {}
                    _ => continue,
                }
            }
            matches.push((entry.recency, id.clone(), entry.record.clone()));
            if !needs_sort && matches.len() >= wanted {
                break;
            }
        }

        if needs_sort {
            matches.sort_by(|a, b| {
                let ordering = a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1));
                if desc {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let has_more = matches.len() > query.offset + limit;
        let records: Vec<Arc<Record>> = matches
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .map(|(_, _, record)| record)
            .collect();

        self.cache.put(
            cache_key,
            Cached::List {
                records: records.clone(),
                has_more,
            },
        );
        Ok(Page { records, has_more })
    }

    /// Deletes a record. Idempotent: deleting an absent id is Ok(false)
    /// so an interrupted retention sweep can safely re-run.
    ///
    /// Deletion is not part of the public HTTP surface; the retention
    /// sweeper is the only caller in production.
    pub fn delete(&self, kind: RecordKind, id: &str) -> StoreResult<bool> {
        let schema = self.registry.get(kind);
        let mut part = self.partition_write(kind);
        let Some(entry) = part.records.get(id).cloned() else {
            return Ok(false);
        };
        self.with_retry(|| self.backend.remove(kind, id))?;
        part.indexes
            .apply_delete(schema, id, &entry.record, entry.recency);
        part.records.remove(id);
        self.cache.invalidate_kind(kind);
        Ok(true)
    }

    /// Ids with recency strictly older than the cutoff, oldest first.
    pub fn expired_ids(&self, kind: RecordKind, cutoff: DateTime<Utc>) -> Vec<String> {
        let schema = self.registry.get(kind);
        let part = self.partition_read(kind);
        part.indexes.older_than(schema, cutoff)
    }

    /// Rebuilds a kind's indexes from the authoritative record map.
    /// Idempotent; produces identical content regardless of scan order.
    pub fn rebuild_indexes(&self, kind: RecordKind) {
        let schema = self.registry.get(kind);
        let mut part = self.partition_write(kind);
        let Partition { records, indexes } = &mut *part;
        indexes.rebuild(
            schema,
            records
                .iter()
                .map(|(id, entry)| (id.as_str(), entry.record.as_ref(), entry.recency)),
        );
    }

    /// Number of live records for a kind.
    pub fn len(&self, kind: RecordKind) -> usize {
        self.partition_read(kind).records.len()
    }

    pub fn is_empty(&self, kind: RecordKind) -> bool {
        self.len(kind) == 0
    }

    fn require_id(&self, record: &Record) -> StoreResult<String> {
        let schema = self.registry.get(record.kind);
        record
            .id(schema)
            .map(str::to_string)
            .ok_or_else(|| StoreError::SchemaViolation(vec![FieldError::missing(schema.id_field)]))
    }

    fn require_recency(&self, record: &Record) -> StoreResult<DateTime<Utc>> {
        let schema = self.registry.get(record.kind);
        record
            .recency(schema)
            .ok_or_else(|| {
                StoreError::SchemaViolation(vec![FieldError::missing(schema.recency_field)])
            })
    }

    fn partition_read(&self, kind: RecordKind) -> std::sync::RwLockReadGuard<'_, Partition> {
        self.partitions[slot(kind)]
            .read()
            .expect("partition lock poisoned")
    }

    fn partition_write(&self, kind: RecordKind) -> RwLockWriteGuard<'_, Partition> {
        self.partitions[slot(kind)]
            .write()
            .expect("partition lock poisoned")
    }

    /// Runs a backend operation under the bounded retry policy.
    fn with_retry<T>(&self, op: impl Fn() -> Result<T, BackendError>) -> StoreResult<T> {
        let attempts = self.cfg.retry_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(StoreError::StorageUnavailable(error.to_string()));
                    }
                    self.metrics.record_storage_retry();
                    std::thread::sleep(self.cfg.retry_delay(attempt - 1));
                }
            }
        }
    }
}

fn check_deadline(query: &ListQuery) -> StoreResult<()> {
    match query.deadline {
        Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
        _ => Ok(()),
    }
}
