//! Patient chat about a trial.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use scribe_common::{ChatMessage, ChatSession};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::PatientUser;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateSession {
    pub trial_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub message: String,
}

/// GET /api/v1/me/chat/sessions
pub async fn list_sessions(user: PatientUser, State(state): State<SharedState>) -> ApiResult<Json<Vec<ChatSession>>> {
    Ok(Json(state.services.chat.list_sessions(user.patient.id).await?))
}

/// POST /api/v1/me/chat/sessions
pub async fn create_session(
    user: PatientUser,
    State(state): State<SharedState>,
    Json(body): Json<CreateSession>,
) -> ApiResult<(StatusCode, Json<ChatSession>)> {
    let session = state
        .services
        .chat
        .create_session(user.patient.id, body.trial_id.trim(), body.title.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/me/chat/sessions/{id}/messages
pub async fn list_messages(
    user: PatientUser,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    owned_session(&state, &user, session_id).await?;
    Ok(Json(state.services.chat.list_messages(session_id).await?))
}

/// POST /api/v1/me/chat/sessions/{id}/messages
pub async fn ask(
    user: PatientUser,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<AskRequest>,
) -> ApiResult<Json<ChatMessage>> {
    owned_session(&state, &user, session_id).await?;
    Ok(Json(state.services.chat.ask(session_id, &body.message).await?))
}

async fn owned_session(state: &SharedState, user: &PatientUser, session_id: Uuid) -> ApiResult<ChatSession> {
    let session = state.services.chat.get_session(session_id).await?;
    if session.patient_id != user.patient.id {
        return Err(ApiError::NotFound(format!("chat session {session_id}")));
    }
    Ok(session)
}
