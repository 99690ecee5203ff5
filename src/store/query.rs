//! List query shape and the page result.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::record::Record;

/// Sort direction over the recency field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    /// Most recent first. The default.
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Inclusive bounds on the recency field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.since.map(|s| t >= s).unwrap_or(true) && self.until.map(|u| t <= u).unwrap_or(true)
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }
}

/// A list request.
///
/// Filters are exact-match predicates over indexed fields;
/// `min_accuracy` is the reflection `metric_threshold`, an inclusive
/// lower bound on `metrics.accuracy` applied as a post-filter. The
/// deadline is excluded from the cache signature: it shapes latency,
/// not results.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub time_range: TimeRange,
    pub sort: SortOrder,
    /// None means the configured default page size.
    pub limit: Option<usize>,
    pub offset: usize,
    pub min_accuracy: Option<f64>,
    pub deadline: Option<Instant>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    pub fn since(mut self, t: DateTime<Utc>) -> Self {
        self.time_range.since = Some(t);
        self
    }

    pub fn until(mut self, t: DateTime<Utc>) -> Self {
        self.time_range.until = Some(t);
        self
    }

    pub fn sort(mut self, order: SortOrder) -> Self {
        self.sort = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn min_accuracy(mut self, threshold: f64) -> Self {
        self.min_accuracy = Some(threshold);
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Normalized cache signature. Filters sort by field name so
    /// equivalent queries share an entry.
    pub fn signature(&self) -> String {
        let mut filters: Vec<_> = self
            .filters
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect();
        filters.sort();

        format!(
            "f[{}]|since={}|until={}|sort={}|limit={}|offset={}|min_acc={}",
            filters.join(","),
            self.time_range
                .since
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            self.time_range
                .until
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            self.sort.as_str(),
            self.limit.map(|l| l.to_string()).unwrap_or_default(),
            self.offset,
            self.min_accuracy.map(|t| t.to_string()).unwrap_or_default(),
        )
    }
}

/// One page of list results.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Arc<Record>>,
    /// Whether records beyond this page matched.
    pub has_more: bool,
}
