//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /healthz              - Readiness (database round trip)
//! GET    /metrics              - Operation counters (Prometheus text)
//!
//! # Accounts
//! POST   /v1/user              - Create account (public)
//! GET    /v1/user/verify       - Follow verification link (public, ?token=)
//! GET    /v1/user/self         - Own account (basic auth, verified)
//! PUT    /v1/user/self         - Update own account (basic auth, verified)
//!
//! # Profile picture (basic auth, verified)
//! POST   /v1/user/self/pic     - Upload or replace (multipart field `file`)
//! GET    /v1/user/self/pic     - Picture metadata
//! DELETE /v1/user/self/pic     - Remove picture
//! ```

pub mod health;
pub mod pictures;
pub mod users;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, Request},
    routing::{get, post},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// JSON body extractor whose rejections use the API error shape.
///
/// Unknown or disallowed fields, wrong types, and a missing
/// `Content-Type: application/json` all become a 400 validation error.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Create the `/v1/user` routes router.
pub fn user_routes(max_picture_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", post(users::create))
        .route("/verify", get(users::verify))
        .route("/self", get(users::get_self).put(users::update_self))
        .route(
            "/self/pic",
            post(pictures::upload)
                .get(pictures::show)
                .delete(pictures::delete)
                .layer(DefaultBodyLimit::max(
                    max_picture_bytes.saturating_add(MULTIPART_OVERHEAD),
                )),
        )
}

/// Create all routes for the API.
pub fn routes(max_picture_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics))
        .nest("/v1/user", user_routes(max_picture_bytes))
}
