//! Per-kind secondary indexes.
//!
//! Two structural kinds, declared by each schema:
//! - ordered: BTreeMap-backed, range queries and sorted iteration over
//!   composite keys ending at the recency field;
//! - hash: exact-match lookup for low-cardinality enum fields.
//!
//! Indexes hold derived record ids only and are never authoritative:
//! the store owns the records and rebuilds indexes from a full scan on
//! startup. Rebuilds are idempotent and produce identical content
//! regardless of scan order (all containers are ordered sets).
//!
//! Mutation entry points are called by the store inside the same lock
//! scope as the record write, so readers never observe a record present
//! in the store but absent here, or vice versa.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::record::Record;
use crate::schema::KindSchema;

use super::keys::{IndexKey, OrderedKey};

/// Ordered index over a composite key.
#[derive(Debug, Default)]
pub struct OrderedIndex {
    fields: Vec<&'static str>,
    tree: BTreeMap<OrderedKey, BTreeSet<String>>,
}

impl OrderedIndex {
    fn new(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.to_vec(),
            tree: BTreeMap::new(),
        }
    }

    /// Builds this index's key for a record. None when a component is
    /// missing or not indexable; such records are simply not indexed
    /// here.
    fn key_for(
        &self,
        schema: &KindSchema,
        record: &Record,
        recency: DateTime<Utc>,
    ) -> Option<OrderedKey> {
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let component = if *field == schema.recency_field {
                IndexKey::from_timestamp(recency)
            } else {
                IndexKey::from_json(record.index_value(field)?)?
            };
            parts.push(component);
        }
        Some(OrderedKey(parts))
    }

    fn insert(&mut self, key: OrderedKey, id: &str) {
        self.tree.entry(key).or_default().insert(id.to_string());
    }

    fn remove(&mut self, key: &OrderedKey, id: &str) {
        if let Some(ids) = self.tree.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    fn clear(&mut self) {
        self.tree.clear();
    }

    /// Record ids in key order within [min, max]; reversed when `desc`.
    fn scan(
        &self,
        min: Bound<OrderedKey>,
        max: Bound<OrderedKey>,
        desc: bool,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        if desc {
            for (_, entry) in self.tree.range((min, max)).rev() {
                ids.extend(entry.iter().rev().cloned());
            }
        } else {
            for (_, entry) in self.tree.range((min, max)) {
                ids.extend(entry.iter().cloned());
            }
        }
        ids
    }
}

/// Exact-match index for enum-like fields.
#[derive(Debug, Default)]
pub struct HashIndex {
    map: HashMap<IndexKey, BTreeSet<String>>,
}

impl HashIndex {
    fn insert(&mut self, key: IndexKey, id: &str) {
        self.map.entry(key).or_default().insert(id.to_string());
    }

    fn remove(&mut self, key: &IndexKey, id: &str) {
        if let Some(ids) = self.map.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.map.remove(key);
            }
        }
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn lookup(&self, key: &IndexKey) -> Vec<String> {
        self.map
            .get(key)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// All secondary indexes for one record kind.
#[derive(Debug)]
pub struct KindIndexes {
    ordered: Vec<OrderedIndex>,
    hash: HashMap<&'static str, HashIndex>,
}

impl KindIndexes {
    /// Creates the empty index set a schema declares.
    pub fn new(schema: &KindSchema) -> Self {
        let ordered = schema
            .ordered_indexes
            .iter()
            .map(|fields| OrderedIndex::new(fields))
            .collect();
        let hash = schema
            .hash_indexes
            .iter()
            .map(|field| (*field, HashIndex::default()))
            .collect();
        Self { ordered, hash }
    }

    /// Indexes a record, first unindexing the previous version on
    /// update.
    pub fn apply_write(
        &mut self,
        schema: &KindSchema,
        id: &str,
        record: &Record,
        recency: DateTime<Utc>,
        old: Option<(&Record, DateTime<Utc>)>,
    ) {
        if let Some((old_record, old_recency)) = old {
            self.apply_delete(schema, id, old_record, old_recency);
        }
        for index in &mut self.ordered {
            if let Some(key) = index.key_for(schema, record, recency) {
                index.insert(key, id);
            }
        }
        for (field, index) in &mut self.hash {
            if let Some(key) = record.index_value(field).and_then(IndexKey::from_json) {
                index.insert(key, id);
            }
        }
    }

    /// Removes a record from every index. Idempotent.
    pub fn apply_delete(
        &mut self,
        schema: &KindSchema,
        id: &str,
        record: &Record,
        recency: DateTime<Utc>,
    ) {
        for index in &mut self.ordered {
            if let Some(key) = index.key_for(schema, record, recency) {
                index.remove(&key, id);
            }
        }
        for (field, index) in &mut self.hash {
            if let Some(key) = record.index_value(field).and_then(IndexKey::from_json) {
                index.remove(&key, id);
            }
        }
    }

    /// Rebuilds every index from an authoritative record scan.
    pub fn rebuild<'a>(
        &mut self,
        schema: &KindSchema,
        records: impl Iterator<Item = (&'a str, &'a Record, DateTime<Utc>)>,
    ) {
        for index in &mut self.ordered {
            index.clear();
        }
        for index in self.hash.values_mut() {
            index.clear();
        }
        for (id, record, recency) in records {
            self.apply_write(schema, id, record, recency, None);
        }
    }

    /// Scan of the recency index bounded inclusively by [since, until].
    pub fn recency_scan(
        &self,
        schema: &KindSchema,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        desc: bool,
    ) -> Vec<String> {
        let Some(index) = self.find_ordered(&[schema.recency_field]) else {
            return Vec::new();
        };
        let min = match since {
            Some(t) => Bound::Included(OrderedKey::single(IndexKey::from_timestamp(t))),
            None => Bound::Unbounded,
        };
        let max = match until {
            Some(t) => Bound::Included(OrderedKey::single(IndexKey::from_timestamp(t))),
            None => Bound::Unbounded,
        };
        index.scan(min, max, desc)
    }

    /// Prefix scan of a `(field, recency)` composite index. None when
    /// no such index exists for the field.
    pub fn composite_scan(
        &self,
        schema: &KindSchema,
        field: &str,
        value: &Value,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        desc: bool,
    ) -> Option<Vec<String>> {
        let index = self
            .ordered
            .iter()
            .find(|idx| idx.fields.len() == 2 && idx.fields[0] == field)?;
        let prefix = IndexKey::from_json(value)?;

        let min = match since {
            Some(t) => Bound::Included(OrderedKey(vec![
                prefix.clone(),
                IndexKey::from_timestamp(t),
            ])),
            None => Bound::Included(OrderedKey::single(prefix.clone())),
        };
        let max = match until {
            Some(t) => Bound::Included(OrderedKey(vec![prefix, IndexKey::from_timestamp(t)])),
            None => Bound::Included(OrderedKey(vec![prefix, IndexKey::Max])),
        };
        Some(index.scan(min, max, desc))
    }

    /// Exact-match lookup on a hash index. None when the field carries
    /// no hash index.
    pub fn hash_lookup(&self, field: &str, value: &Value) -> Option<Vec<String>> {
        let index = self.hash.get(field)?;
        let key = IndexKey::from_json(value)?;
        Some(index.lookup(&key))
    }

    /// Whether a `(field, recency)` composite index exists.
    pub fn has_composite(&self, field: &str) -> bool {
        self.ordered
            .iter()
            .any(|idx| idx.fields.len() == 2 && idx.fields[0] == field)
    }

    /// Ids of records strictly older than the cutoff, oldest first.
    /// Drives the retention sweep.
    pub fn older_than(&self, schema: &KindSchema, cutoff: DateTime<Utc>) -> Vec<String> {
        let Some(index) = self.find_ordered(&[schema.recency_field]) else {
            return Vec::new();
        };
        index.scan(
            Bound::Unbounded,
            Bound::Excluded(OrderedKey::single(IndexKey::from_timestamp(cutoff))),
            false,
        )
    }

    fn find_ordered(&self, fields: &[&str]) -> Option<&OrderedIndex> {
        self.ordered.iter().find(|idx| idx.fields == fields)
    }

    /// Total entries across ordered indexes, for consistency checks.
    pub fn ordered_entry_count(&self) -> usize {
        self.ordered
            .iter()
            .map(|idx| idx.tree.values().map(BTreeSet::len).sum::<usize>())
            .sum()
    }
}
