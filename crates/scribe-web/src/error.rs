//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scribe_common::{FieldErrors, ScribeError};
use scribe_core::ServiceError;
use scribe_db::DbError;
use scribe_trials::RegistryError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Upstream service failed: {0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_)     => StatusCode::NOT_FOUND,
            ApiError::Conflict(_)     => StatusCode::CONFLICT,
            ApiError::Validation(_)   => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_)   => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_)    => StatusCode::FORBIDDEN,
            ApiError::Upstream(_)     => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_)     => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_)     => "not_found",
            ApiError::Conflict(_)     => "conflict",
            ApiError::Validation(_)   => "validation_error",
            ApiError::BadRequest(_)   => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_)    => "forbidden",
            ApiError::Upstream(_)     => "upstream_error",
            ApiError::Internal(_)     => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                "Internal server error".to_string()
            }
            ApiError::Upstream(detail) => {
                warn!(error = %detail, "Upstream call failed");
                self.to_string()
            }
            other => other.to_string(),
        };
        let fields = match &self {
            ApiError::Validation(fields) => Some(fields),
            _ => None,
        };
        let body = ErrorBody { error: self.code(), message, fields };
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what)     => ApiError::NotFound(what),
            ServiceError::Conflict(msg)      => ApiError::Conflict(msg),
            ServiceError::Validation(fields) => ApiError::Validation(fields),
            ServiceError::BadRequest(msg)    => ApiError::BadRequest(msg),
            ServiceError::Registry(e)        => ApiError::Upstream(e.to_string()),
            ServiceError::Llm(e)             => ApiError::Upstream(e.to_string()),
            ServiceError::Db(e)              => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<ScribeError> for ApiError {
    fn from(err: ScribeError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<minijinja::Error> for ApiError {
    fn from(err: minijinja::Error) -> Self {
        ApiError::Internal(format!("template: {err}"))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::NotFound("patient x".into()), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("busy".into()), StatusCode::CONFLICT),
            (ServiceError::validation("first_name", "too short"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ServiceError::Registry(RegistryError::Status { status: 500, message: "boom".into() }),
                StatusCode::BAD_GATEWAY,
            ),
            (ServiceError::Db(DbError::InvalidData("bad row".into())), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_invalid_proxy_path_is_bad_request() {
        let err = ApiError::from(RegistryError::InvalidPath("../etc".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
