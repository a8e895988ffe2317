//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued by the identity provider. The role is read
//! from `app_metadata.role` or the top-level `role` claim. Handlers opt in by
//! taking [`AdminUser`] or [`PatientUser`] as an argument.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use scribe_common::Patient;
use scribe_config::AuthConfig;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    pub exp: usize,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.app_metadata.role.as_deref() == Some(role) || self.role.as_deref() == Some(role)
    }
}

/// Verification key and role names.
#[derive(Clone)]
pub struct AuthSettings {
    key: DecodingKey,
    validation: Validation,
    pub admin_role: String,
    pub patient_role: String,
}

impl AuthSettings {
    pub fn new(secret: &str, audience: &str, admin_role: &str, patient_role: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            admin_role: admin_role.to_string(),
            patient_role: patient_role.to_string(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, ApiError> {
        let secret = config
            .jwt_secret
            .as_ref()
            .ok_or_else(|| ApiError::Internal("JWT secret is not configured".into()))?;
        Ok(Self::new(
            secret.expose_secret(),
            &config.audience,
            &config.admin_role,
            &config.patient_role,
        ))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Rejected bearer token");
                ApiError::Unauthorized("Invalid or expired token".into())
            })
    }
}

/// Any caller with a valid token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("Missing bearer token".into()))?;
        Ok(AuthUser(state.auth.verify(bearer.token())?))
    }
}

/// Caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.has_role(&state.auth.admin_role) {
            return Err(ApiError::Forbidden("Admin role required".into()));
        }
        Ok(AdminUser(claims))
    }
}

/// Caller with the patient role, resolved to their patient record through
/// `user_id = sub`.
#[derive(Debug, Clone)]
pub struct PatientUser {
    pub claims: Claims,
    pub patient: Patient,
}

impl FromRequestParts<SharedState> for PatientUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.has_role(&state.auth.patient_role) {
            return Err(ApiError::Forbidden("Patient role required".into()));
        }
        let patient = state
            .services
            .patients
            .find_by_user_id(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::Forbidden("No patient profile is linked to this account".into()))?;
        Ok(PatientUser { claims, patient })
    }
}
