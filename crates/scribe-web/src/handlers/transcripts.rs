//! Admin transcript upload and lifecycle.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use scribe_common::{Transcript, TranscriptStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateTranscript {
    pub raw_transcript: String,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<TranscriptStatus>,
}

/// POST /api/v1/patients/{id}/transcripts
///
/// Stores the transcript and starts analysis in the background; the
/// returned record is still PENDING.
pub async fn create_transcript(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(patient_id): Path<Uuid>,
    Json(body): Json<CreateTranscript>,
) -> ApiResult<(StatusCode, Json<Transcript>)> {
    let transcripts = &state.services.transcripts;
    let transcript = transcripts.create(patient_id, &body.raw_transcript, body.recorded_at).await?;
    transcripts.spawn_process(transcript.id);
    Ok((StatusCode::ACCEPTED, Json(transcript)))
}

/// GET /api/v1/patients/{id}/transcripts
pub async fn list_patient_transcripts(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Transcript>>> {
    Ok(Json(state.services.transcripts.list_for_patient(patient_id).await?))
}

/// GET /api/v1/transcripts
pub async fn list_transcripts(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Vec<Transcript>>> {
    Ok(Json(state.services.transcripts.list_all(filter.status).await?))
}

/// GET /api/v1/transcripts/{id}
pub async fn get_transcript(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Transcript>> {
    Ok(Json(state.services.transcripts.get(id).await?))
}

/// DELETE /api/v1/transcripts/{id}
pub async fn delete_transcript(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.services.transcripts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/transcripts/{id}/reprocess
pub async fn reprocess_transcript(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Transcript>)> {
    let transcript = state.services.transcripts.reprocess(id).await?;
    Ok((StatusCode::ACCEPTED, Json(transcript)))
}
