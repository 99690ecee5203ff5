//! Response shapes for the HTTP API.

use serde::Serialize;
use serde_json::Value;

use crate::record::Record;
use crate::store::Page;

/// Single record response.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub data: Value,
}

impl RecordResponse {
    pub fn new(record: &Record) -> Self {
        Self {
            data: record.to_value(),
        }
    }
}

/// Paginated list response.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<Value>,
    pub count: usize,
    pub has_more: bool,
    pub limit: usize,
    pub offset: usize,
}

impl ListResponse {
    pub fn new(page: &Page, limit: usize, offset: usize) -> Self {
        let data: Vec<Value> = page.records.iter().map(|r| r.to_value()).collect();
        Self {
            count: data.len(),
            data,
            has_more: page.has_more,
            limit,
            offset,
        }
    }
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordKind;
    use std::sync::Arc;

    #[test]
    fn test_list_response_counts() {
        let page = Page {
            records: vec![Arc::new(Record::new(RecordKind::AgentState))],
            has_more: true,
        };
        let response = ListResponse::new(&page, 10, 0);
        assert_eq!(response.count, 1);
        assert!(response.has_more);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"][0]["asl_tags"], serde_json::json!({}));
    }
}
