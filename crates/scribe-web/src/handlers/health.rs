use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /health (liveness only)
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
pub struct LlmInfo {
    pub backend: &'static str,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub registry: bool,
    pub llm: LlmInfo,
}

/// GET /api/v1/health
pub async fn api_health(State(state): State<SharedState>) -> Json<HealthReport> {
    let (database, registry) = tokio::join!(state.db.ping(), state.registry.health_check());
    Json(HealthReport {
        status: if database && registry { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        registry,
        llm: LlmInfo {
            backend: state.llm.backend_name(),
            model: state.llm.model_id().to_string(),
        },
    })
}
