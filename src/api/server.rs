//! Axum HTTP server: one resource family per record kind.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::store::MemStore;

use super::handlers::{
    create_agent_state, create_decision, create_execution, create_reflection, get_agent_state,
    get_decision, get_execution, get_reflection, health, list_agent_states, list_decisions,
    list_executions, list_reflections, metrics, update_agent_state, update_execution, ApiState,
};

/// HTTP front end over the store.
pub struct ApiServer {
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(store: Arc<MemStore>) -> Self {
        Self {
            state: Arc::new(ApiState::new(store)),
        }
    }

    /// Builds the router. Append-only kinds route no update verb; a
    /// PUT there answers 405.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/agent-states", post(create_agent_state).get(list_agent_states))
            .route(
                "/agent-states/:id",
                get(get_agent_state).put(update_agent_state),
            )
            .route("/decisions", post(create_decision).get(list_decisions))
            .route("/decisions/:id", get(get_decision))
            .route("/reflections", post(create_reflection).get(list_reflections))
            .route("/reflections/:id", get(get_reflection))
            .route("/executions", post(create_execution).get(list_executions))
            .route(
                "/executions/:id",
                get(get_execution).put(update_execution),
            )
            .route("/metrics", get(metrics))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Binds and serves until the process exits.
    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr = %addr, "aethero-mem listening");
        axum::serve(listener, self.router()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::StoreConfig;
    use crate::observability::MetricsRegistry;
    use crate::schema::SchemaRegistry;
    use crate::store::MemoryBackend;

    #[test]
    fn test_router_builds() {
        let store = Arc::new(
            MemStore::open(
                StoreConfig::default(),
                Arc::new(SchemaRegistry::builtin()),
                Arc::new(MemoryBackend::new()),
                Arc::new(SystemClock),
                Arc::new(MetricsRegistry::new()),
            )
            .unwrap(),
        );
        let _router = ApiServer::new(store).router();
    }
}
