//! Axum router: maps all URL paths to handlers.

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers::{chat, dashboard, health, patients, portal, proxy, transcripts, trials};
use crate::sse::sse_handler;
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let shared: SharedState = Arc::new(state);

    let admin = Router::new()
        .route("/patients",       get(patients::list_patients).post(patients::create_patient))
        .route("/patients/count", get(patients::count_patients))
        .route(
            "/patients/{id}",
            get(patients::get_patient).put(patients::update_patient).delete(patients::delete_patient),
        )
        .route(
            "/patients/{id}/transcripts",
            get(transcripts::list_patient_transcripts).post(transcripts::create_transcript),
        )
        .route(
            "/patients/{id}/provider-recommendations",
            get(trials::list_provider_recommendations).post(trials::recommend_trial),
        )
        .route(
            "/patients/{id}/provider-recommendations/{trial_id}",
            axum::routing::delete(trials::withdraw_recommendation),
        )
        .route("/transcripts",      get(transcripts::list_transcripts))
        .route("/transcripts/{id}", get(transcripts::get_transcript).delete(transcripts::delete_transcript))
        .route("/transcripts/{id}/reprocess",       post(transcripts::reprocess_transcript))
        .route("/transcripts/{id}/match",           post(trials::run_matching))
        .route("/transcripts/{id}/recommendations", get(trials::get_recommendations))
        .route("/trials/{id}", get(trials::trial_detail))
        .route("/stats",       get(dashboard::stats));

    let portal = Router::new()
        .route("/",            get(portal::me))
        .route("/transcripts", get(portal::my_transcripts))
        .route("/transcripts/{id}/recommendations", get(portal::my_recommendations))
        .route("/trials/{id}",          get(portal::my_trial_detail))
        .route("/saved-trials",         get(portal::list_saved))
        .route("/saved-trials/ids",     get(portal::saved_ids))
        .route("/saved-trials/{trial_id}", put(portal::save_trial).delete(portal::remove_saved))
        .route("/provider-recommendations", get(portal::my_provider_recommendations))
        .route("/provider-recommendations/{trial_id}/accept", post(portal::accept_recommendation))
        .route("/provider-recommendations/{trial_id}/reject", post(portal::reject_recommendation))
        .route("/chat/sessions", get(chat::list_sessions).post(chat::create_session))
        .route("/chat/sessions/{id}/messages", get(chat::list_messages).post(chat::ask));

    let api = admin
        .route("/health", get(health::api_health))
        .nest("/me", portal);

    Router::new()
        // Pages
        .route("/",       get(dashboard::dashboard))
        .route("/health", get(health::health))

        // SSE streaming
        .route("/api/events", get(sse_handler))

        // Registry pass-through
        .route("/api/ctg-proxy/{*path}", get(proxy::ctg_proxy).post(proxy::ctg_proxy))

        .nest("/api/v1", api)

        // Middleware
        .layer(cors_layer(cors_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// `*` anywhere in the list allows every origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
