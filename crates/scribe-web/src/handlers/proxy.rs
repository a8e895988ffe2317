//! Pass-through to the trial registry for the portals' own search UI.

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::SharedState;

/// GET|POST /api/ctg-proxy/{*path}
///
/// Upstream status, content type and body are relayed as they are.
pub async fn ctg_proxy(
    State(state): State<SharedState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let upstream = match state
        .proxy
        .forward(method, &path, query.as_deref(), content_type, body)
        .await
    {
        Ok(resp) => resp,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = status;
    if let Some(ct) = upstream.content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        response.headers_mut().insert(header::CONTENT_TYPE, ct);
    }
    response
}
