//! Request handlers.
//!
//! One thin wrapper per route delegates to kind-generic ingestion,
//! query parsing, and store calls. Create and update accept either a
//! JSON object body (`application/json`) or a raw ASL text block (any
//! other content type); both run the same validation path, and a
//! failing payload answers with the full ordered error list.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::asl::{AslParser, ParseError};
use crate::observability::MetricsSnapshot;
use crate::record::Record;
use crate::schema::RecordKind;
use crate::store::{ListQuery, MemStore, SortOrder};

use super::errors::{ApiError, ApiResult};
use super::response::{HealthResponse, ListResponse, RecordResponse};

/// Shared handler state.
pub struct ApiState {
    pub store: Arc<MemStore>,
    pub parser: AslParser,
}

impl ApiState {
    pub fn new(store: Arc<MemStore>) -> Self {
        let parser = AslParser::new(store.registry().clone());
        Self { store, parser }
    }
}

/// Filter fields each resource accepts in its list query.
struct ListRules {
    filters: &'static [&'static str],
    metric_threshold: bool,
}

const AGENT_STATE_LIST: ListRules = ListRules {
    filters: &["state"],
    metric_threshold: false,
};
const DECISION_LIST: ListRules = ListRules {
    filters: &["agent_id"],
    metric_threshold: false,
};
const REFLECTION_LIST: ListRules = ListRules {
    filters: &["agent_id"],
    metric_threshold: true,
};
const EXECUTION_LIST: ListRules = ListRules {
    filters: &["status"],
    metric_threshold: false,
};

// ---------------------------------------------------------------------
// Shared ingestion and query parsing
// ---------------------------------------------------------------------

/// Builds a record from a request body: JSON when the content type
/// says so, ASL text otherwise.
fn record_from_request(
    state: &ApiState,
    kind: RecordKind,
    headers: &HeaderMap,
    body: &str,
) -> ApiResult<Record> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        let value: Value =
            serde_json::from_str(body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
        let schema = state.store.registry().get(kind);
        Record::from_value(kind, schema, value)
            .map_err(|errors| ApiError::Validation(errors.into_iter().map(ParseError::Field).collect()))
    } else {
        let (record, errors) = state.parser.parse(kind, body);
        if errors.is_empty() {
            Ok(record)
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

fn parse_timestamp(param: &str, raw: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ApiError::InvalidQueryParam {
            param: param.to_string(),
            reason: e.to_string(),
        })
}

fn parse_number<T: std::str::FromStr>(param: &str, raw: &str) -> ApiResult<T> {
    raw.parse().map_err(|_| ApiError::InvalidQueryParam {
        param: param.to_string(),
        reason: format!("cannot parse '{}'", raw),
    })
}

/// Parses shared list parameters plus the resource's filter fields.
/// Unknown parameters are rejected rather than silently ignored.
fn parse_list_query(
    params: &HashMap<String, String>,
    rules: &ListRules,
) -> ApiResult<ListQuery> {
    let mut query = ListQuery::new();

    for (key, raw) in params {
        match key.as_str() {
            "since" => query.time_range.since = Some(parse_timestamp(key, raw)?),
            "until" => query.time_range.until = Some(parse_timestamp(key, raw)?),
            "sort" => {
                query.sort = match raw.as_str() {
                    "asc" => SortOrder::Asc,
                    "desc" => SortOrder::Desc,
                    other => {
                        return Err(ApiError::InvalidQueryParam {
                            param: key.clone(),
                            reason: format!("expected asc or desc, got '{}'", other),
                        })
                    }
                }
            }
            "limit" => query.limit = Some(parse_number(key, raw)?),
            "offset" => query.offset = parse_number(key, raw)?,
            "timeout_ms" => {
                let ms: u64 = parse_number(key, raw)?;
                query.deadline = Some(Instant::now() + Duration::from_millis(ms));
            }
            "metric_threshold" if rules.metric_threshold => {
                query.min_accuracy = Some(parse_number(key, raw)?);
            }
            other if rules.filters.contains(&other) => {
                query
                    .filters
                    .push((other.to_string(), Value::String(raw.clone())));
            }
            other => {
                return Err(ApiError::InvalidQueryParam {
                    param: other.to_string(),
                    reason: "unsupported parameter for this resource".to_string(),
                })
            }
        }
    }

    Ok(query)
}

fn create_record(
    state: &ApiState,
    kind: RecordKind,
    headers: &HeaderMap,
    body: &str,
) -> ApiResult<(StatusCode, Json<RecordResponse>)> {
    let record = record_from_request(state, kind, headers, body)?;
    let stored = state.store.create(record)?;
    Ok((StatusCode::CREATED, Json(RecordResponse::new(&stored))))
}

fn get_record(state: &ApiState, kind: RecordKind, id: &str) -> ApiResult<Json<RecordResponse>> {
    let record = state.store.get(kind, id)?;
    Ok(Json(RecordResponse::new(&record)))
}

fn update_record(
    state: &ApiState,
    kind: RecordKind,
    id: &str,
    headers: &HeaderMap,
    body: &str,
) -> ApiResult<Json<RecordResponse>> {
    let record = record_from_request(state, kind, headers, body)?;
    let stored = state.store.update(kind, id, record)?;
    Ok(Json(RecordResponse::new(&stored)))
}

fn list_records(
    state: &ApiState,
    kind: RecordKind,
    params: &HashMap<String, String>,
    rules: &ListRules,
) -> ApiResult<Json<ListResponse>> {
    let query = parse_list_query(params, rules)?;
    let limit = query
        .limit
        .unwrap_or(state.store.config().default_page_size);
    let page = state.store.list(kind, &query)?;
    Ok(Json(ListResponse::new(&page, limit, query.offset)))
}

// ---------------------------------------------------------------------
// agent_state
// ---------------------------------------------------------------------

pub async fn create_agent_state(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<(StatusCode, Json<RecordResponse>)> {
    create_record(&state, RecordKind::AgentState, &headers, &body)
}

pub async fn get_agent_state(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    get_record(&state, RecordKind::AgentState, &id)
}

pub async fn update_agent_state(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<RecordResponse>> {
    update_record(&state, RecordKind::AgentState, &id, &headers, &body)
}

pub async fn list_agent_states(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ListResponse>> {
    list_records(&state, RecordKind::AgentState, &params, &AGENT_STATE_LIST)
}

// ---------------------------------------------------------------------
// decision_record
// ---------------------------------------------------------------------

pub async fn create_decision(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<(StatusCode, Json<RecordResponse>)> {
    create_record(&state, RecordKind::DecisionRecord, &headers, &body)
}

pub async fn get_decision(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    get_record(&state, RecordKind::DecisionRecord, &id)
}

pub async fn list_decisions(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ListResponse>> {
    list_records(&state, RecordKind::DecisionRecord, &params, &DECISION_LIST)
}

// ---------------------------------------------------------------------
// reflection_result
// ---------------------------------------------------------------------

pub async fn create_reflection(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<(StatusCode, Json<RecordResponse>)> {
    create_record(&state, RecordKind::ReflectionResult, &headers, &body)
}

pub async fn get_reflection(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    get_record(&state, RecordKind::ReflectionResult, &id)
}

pub async fn list_reflections(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ListResponse>> {
    list_records(&state, RecordKind::ReflectionResult, &params, &REFLECTION_LIST)
}

// ---------------------------------------------------------------------
// pipeline_execution
// ---------------------------------------------------------------------

pub async fn create_execution(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<(StatusCode, Json<RecordResponse>)> {
    create_record(&state, RecordKind::PipelineExecution, &headers, &body)
}

pub async fn get_execution(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    get_record(&state, RecordKind::PipelineExecution, &id)
}

pub async fn update_execution(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<RecordResponse>> {
    update_record(&state, RecordKind::PipelineExecution, &id, &headers, &body)
}

pub async fn list_executions(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ListResponse>> {
    list_records(&state, RecordKind::PipelineExecution, &params, &EXECUTION_LIST)
}

// ---------------------------------------------------------------------
// operational
// ---------------------------------------------------------------------

pub async fn metrics(State(state): State<Arc<ApiState>>) -> Json<MetricsSnapshot> {
    Json(state.store.metrics().snapshot())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::StoreConfig;
    use crate::observability::MetricsRegistry;
    use crate::schema::SchemaRegistry;
    use crate::store::MemoryBackend;

    fn state() -> ApiState {
        let registry = Arc::new(SchemaRegistry::builtin());
        let store = Arc::new(
            MemStore::open(
                StoreConfig {
                    retry_base_delay_ms: 0,
                    ..StoreConfig::default()
                },
                registry,
                Arc::new(MemoryBackend::new()),
                Arc::new(SystemClock),
                Arc::new(MetricsRegistry::new()),
            )
            .unwrap(),
        );
        ApiState::new(store)
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers
    }

    #[test]
    fn test_json_body_ingested() {
        let state = state();
        let record = record_from_request(
            &state,
            RecordKind::AgentState,
            &json_headers(),
            r#"{"agent_id": "bot_1", "timestamp": "2024-01-01T00:00:00Z", "state": "idle"}"#,
        )
        .unwrap();
        assert_eq!(record.fields["agent_id"], "bot_1");
    }

    #[test]
    fn test_text_body_parsed_as_asl() {
        let state = state();
        let record = record_from_request(
            &state,
            RecordKind::AgentState,
            &HeaderMap::new(),
            "agent_id: bot_1\ntimestamp: 2024-01-01T00:00:00Z\nstate: idle\n",
        )
        .unwrap();
        assert_eq!(record.fields["state"], "idle");
    }

    #[test]
    fn test_asl_errors_reported_in_full() {
        let state = state();
        let err = record_from_request(
            &state,
            RecordKind::AgentState,
            &HeaderMap::new(),
            "broken line\nstate: sleeping\n",
        )
        .unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                // Malformed line, enum mismatch, and two missing
                // required fields, all in one response.
                assert_eq!(errors.len(), 4);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_param_rejected() {
        let mut params = HashMap::new();
        params.insert("agent_id".to_string(), "bot_1".to_string());
        let err = parse_list_query(&params, &AGENT_STATE_LIST).unwrap_err();
        assert!(matches!(err, ApiError::InvalidQueryParam { .. }));
    }

    #[test]
    fn test_metric_threshold_only_on_reflections() {
        let mut params = HashMap::new();
        params.insert("metric_threshold".to_string(), "0.8".to_string());

        assert!(parse_list_query(&params, &REFLECTION_LIST).is_ok());
        assert!(parse_list_query(&params, &AGENT_STATE_LIST).is_err());
    }

    #[test]
    fn test_time_range_and_paging_parsed() {
        let mut params = HashMap::new();
        params.insert("since".to_string(), "2024-01-01T00:00:00Z".to_string());
        params.insert("until".to_string(), "2024-02-01T00:00:00Z".to_string());
        params.insert("limit".to_string(), "5".to_string());
        params.insert("offset".to_string(), "10".to_string());
        params.insert("sort".to_string(), "asc".to_string());

        let query = parse_list_query(&params, &AGENT_STATE_LIST).unwrap();
        assert!(query.time_range.since.is_some());
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, 10);
        assert_eq!(query.sort, SortOrder::Asc);
    }
}
