//! Admin trial matching, trial detail and provider recommendations.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use scribe_common::{ProviderRecommendedTrial, RecommendationStatus, TrialDetail};
use scribe_core::{ProviderRecommendationView, RecommendedTrials};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// POST /api/v1/transcripts/{id}/match
pub async fn run_matching(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(transcript_id): Path<Uuid>,
) -> ApiResult<Json<RecommendedTrials>> {
    let transcript = state.services.transcripts.get(transcript_id).await?;
    let result = state
        .services
        .matching
        .find_recommended_trials(transcript.patient_id, transcript_id)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/transcripts/{id}/recommendations
pub async fn get_recommendations(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(transcript_id): Path<Uuid>,
) -> ApiResult<Json<RecommendedTrials>> {
    state
        .services
        .matching
        .get_recommendations(transcript_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("recommendations for transcript {transcript_id}")))
}

/// GET /api/v1/trials/{id}
pub async fn trial_detail(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(trial_id): Path<String>,
) -> ApiResult<Json<TrialDetail>> {
    let trial = state.services.matching.get_clinical_trial(&trial_id).await?;
    Ok(Json(trial.detail()))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationFilter {
    pub status: Option<RecommendationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendTrial {
    pub trial_id: String,
    #[serde(default)]
    pub transcript_id: Option<Uuid>,
    #[serde(default)]
    pub note: Option<String>,
}

/// POST /api/v1/patients/{id}/provider-recommendations
pub async fn recommend_trial(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(patient_id): Path<Uuid>,
    Json(body): Json<RecommendTrial>,
) -> ApiResult<(StatusCode, Json<ProviderRecommendedTrial>)> {
    let rec = state
        .services
        .engagement
        .recommend(patient_id, body.trial_id.trim(), body.transcript_id, body.note.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(rec)))
}

/// GET /api/v1/patients/{id}/provider-recommendations
pub async fn list_provider_recommendations(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(patient_id): Path<Uuid>,
    Query(filter): Query<RecommendationFilter>,
) -> ApiResult<Json<Vec<ProviderRecommendationView>>> {
    state.services.patients.get(patient_id).await?;
    let recs = state.services.engagement.list_recommendations(patient_id, filter.status).await?;
    Ok(Json(recs))
}

/// DELETE /api/v1/patients/{id}/provider-recommendations/{trial_id}
pub async fn withdraw_recommendation(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path((patient_id, trial_id)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    state.services.engagement.withdraw(patient_id, &trial_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
