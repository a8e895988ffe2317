//! Dashboard: operator landing page and the admin stats endpoint.

use axum::extract::State;
use axum::response::Html;
use axum::Json;
use minijinja::context;
use scribe_db::{DatabaseStats, StatusCounts};
use serde::Serialize;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub totals: DatabaseStats,
    pub transcripts_by_status: StatusCounts,
    pub pending_provider_recommendations: i64,
}

async fn collect(state: &SharedState) -> ApiResult<DashboardStats> {
    Ok(DashboardStats {
        totals: state.db.stats().await?,
        transcripts_by_status: state.services.transcripts.count_by_status().await?,
        pending_provider_recommendations: state.services.engagement.count_pending(None).await?,
    })
}

/// GET /api/v1/stats
pub async fn stats(_admin: AdminUser, State(state): State<SharedState>) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(collect(&state).await?))
}

/// GET /
pub async fn dashboard(State(state): State<SharedState>) -> ApiResult<Html<String>> {
    let stats = collect(&state).await?;
    let template = state.templates.get_template("dashboard.html")?;
    let html = template.render(context! {
        stats => stats,
        version => env!("CARGO_PKG_VERSION"),
        llm_backend => state.llm.backend_name(),
        llm_model => state.llm.model_id(),
    })?;
    Ok(Html(html))
}
