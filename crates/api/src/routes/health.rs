//! Health check and metrics endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Readiness check.
///
/// GET /healthz
///
/// - 200 when the database answers
/// - 503 when it does not
/// - 400 if the request carries a query string or a body
///
/// Responses are never cacheable and have an empty body.
pub async fn healthz(State(state): State<AppState>, uri: Uri, body: Bytes) -> Response {
    let status = if uri.query().is_some() || !body.is_empty() {
        StatusCode::BAD_REQUEST
    } else if let Err(e) = state.accounts().health_check().await {
        tracing::warn!(error = %e, "Health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let mut response = status.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// Operation counters in the Prometheus text format.
///
/// GET /metrics
///
/// # Errors
///
/// Returns `AppError::Internal` if the registry cannot be encoded.
pub async fn metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state
        .metrics()
        .render()
        .map_err(|e| AppError::Internal(format!("metrics encoding failed: {e}")))?;
    Ok((
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        body,
    )
        .into_response())
}
