//! Patient portal. Every route is scoped to the caller's own patient record.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use scribe_common::{Patient, ProviderRecommendedTrial, Transcript, TrialDetail};
use scribe_core::{ProviderRecommendationView, RecommendedTrials, SavedTrialView};
use uuid::Uuid;

use crate::auth::PatientUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::trials::RecommendationFilter;
use crate::state::SharedState;

/// GET /api/v1/me
pub async fn me(user: PatientUser) -> Json<Patient> {
    Json(user.patient)
}

/// GET /api/v1/me/transcripts
pub async fn my_transcripts(user: PatientUser, State(state): State<SharedState>) -> ApiResult<Json<Vec<Transcript>>> {
    Ok(Json(state.services.transcripts.list_for_patient(user.patient.id).await?))
}

/// GET /api/v1/me/transcripts/{id}/recommendations
///
/// Empty until matching has been run for the transcript.
pub async fn my_recommendations(
    user: PatientUser,
    State(state): State<SharedState>,
    Path(transcript_id): Path<Uuid>,
) -> ApiResult<Json<RecommendedTrials>> {
    let transcript = state.services.transcripts.get(transcript_id).await?;
    if transcript.patient_id != user.patient.id {
        return Err(ApiError::NotFound(format!("transcript {transcript_id}")));
    }
    let recs = state.services.matching.get_recommendations(transcript_id).await?;
    Ok(Json(recs.unwrap_or_default()))
}

/// GET /api/v1/me/trials/{id}
pub async fn my_trial_detail(
    _user: PatientUser,
    State(state): State<SharedState>,
    Path(trial_id): Path<String>,
) -> ApiResult<Json<TrialDetail>> {
    let trial = state.services.matching.get_clinical_trial(&trial_id).await?;
    Ok(Json(trial.detail()))
}

// ── Saved trials ────────────────────────────────────────────────────────────

/// GET /api/v1/me/saved-trials
pub async fn list_saved(user: PatientUser, State(state): State<SharedState>) -> ApiResult<Json<Vec<SavedTrialView>>> {
    Ok(Json(state.services.engagement.list_saved(user.patient.id).await?))
}

/// GET /api/v1/me/saved-trials/ids
pub async fn saved_ids(user: PatientUser, State(state): State<SharedState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.services.engagement.saved_ids(user.patient.id).await?))
}

/// PUT /api/v1/me/saved-trials/{trial_id}: 201 when newly saved, 200 if it
/// already was.
pub async fn save_trial(
    user: PatientUser,
    State(state): State<SharedState>,
    Path(trial_id): Path<String>,
) -> ApiResult<StatusCode> {
    let created = state.services.engagement.save(user.patient.id, &trial_id).await?;
    Ok(if created { StatusCode::CREATED } else { StatusCode::OK })
}

/// DELETE /api/v1/me/saved-trials/{trial_id}
pub async fn remove_saved(
    user: PatientUser,
    State(state): State<SharedState>,
    Path(trial_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.engagement.remove(user.patient.id, &trial_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Provider recommendations ────────────────────────────────────────────────

/// GET /api/v1/me/provider-recommendations
pub async fn my_provider_recommendations(
    user: PatientUser,
    State(state): State<SharedState>,
    Query(filter): Query<RecommendationFilter>,
) -> ApiResult<Json<Vec<ProviderRecommendationView>>> {
    let recs = state
        .services
        .engagement
        .list_recommendations(user.patient.id, filter.status)
        .await?;
    Ok(Json(recs))
}

/// POST /api/v1/me/provider-recommendations/{trial_id}/accept
pub async fn accept_recommendation(
    user: PatientUser,
    State(state): State<SharedState>,
    Path(trial_id): Path<String>,
) -> ApiResult<Json<ProviderRecommendedTrial>> {
    Ok(Json(state.services.engagement.accept(user.patient.id, &trial_id).await?))
}

/// POST /api/v1/me/provider-recommendations/{trial_id}/reject
pub async fn reject_recommendation(
    user: PatientUser,
    State(state): State<SharedState>,
    Path(trial_id): Path<String>,
) -> ApiResult<Json<ProviderRecommendedTrial>> {
    Ok(Json(state.services.engagement.reject(user.patient.id, &trial_id).await?))
}
