//! Admin patient management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use scribe_common::{Patient, PatientInput};
use scribe_db::PatientFilter;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::state::SharedState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/v1/patients
pub async fn list_patients(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Patient>>> {
    let filter = PatientFilter {
        search: params.search.filter(|s| !s.trim().is_empty()),
        limit: Some(params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)),
        offset: Some(params.offset.unwrap_or(0).max(0)),
    };
    Ok(Json(state.services.patients.list(&filter).await?))
}

/// GET /api/v1/patients/count
pub async fn count_patients(_admin: AdminUser, State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let count = state.services.patients.count().await?;
    Ok(Json(json!({ "count": count })))
}

/// POST /api/v1/patients
pub async fn create_patient(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(input): Json<PatientInput>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let normalized = input.normalize()?;
    let patient = state.services.patients.create(&normalized).await?;
    info!(patient_id = %patient.id, "Patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

/// GET /api/v1/patients/{id}
pub async fn get_patient(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(state.services.patients.get(id).await?))
}

/// PUT /api/v1/patients/{id}
pub async fn update_patient(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(input): Json<PatientInput>,
) -> ApiResult<Json<Patient>> {
    let normalized = input.normalize()?;
    Ok(Json(state.services.patients.update(id, &normalized).await?))
}

/// DELETE /api/v1/patients/{id}
pub async fn delete_patient(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.services.patients.delete(id).await?;
    info!(patient_id = %id, "Patient deleted");
    Ok(StatusCode::NO_CONTENT)
}
