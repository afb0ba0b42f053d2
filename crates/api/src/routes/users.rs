//! Account endpoints.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::middleware::RequireAccount;
use crate::models::{AccountPatch, AccountView, CreateAccountRequest};
use crate::routes::ApiJson;
use crate::state::AppState;

/// Query string of the verification link.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub token: String,
}

/// Create an account.
///
/// POST /v1/user
///
/// The account starts unverified and a verification link is published.
pub async fn create(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountView>)> {
    let account = state.accounts().create_account(request).await?;
    Ok((StatusCode::CREATED, Json(AccountView::from(&account))))
}

/// The caller's own account.
///
/// GET /v1/user/self
pub async fn get_self(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
) -> Result<Json<AccountView>> {
    let account = state
        .accounts()
        .get_authenticated_account(&account.email)
        .await?;
    Ok(Json(AccountView::from(&account)))
}

/// Update the caller's names and/or password.
///
/// PUT /v1/user/self
///
/// Any other field in the body, including `email`, `id`, and the
/// timestamps, fails the request with 400.
pub async fn update_self(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    ApiJson(patch): ApiJson<AccountPatch>,
) -> Result<StatusCode> {
    state.accounts().update_self(&account.email, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Follow a verification link.
///
/// GET /v1/user/verify?token=...
///
/// 410 if the link expired, 400 if it is malformed or tampered with.
pub async fn verify(
    State(state): State<AppState>,
    params: std::result::Result<Query<VerifyParams>, QueryRejection>,
) -> Result<Json<AccountView>> {
    let Query(params) =
        params.map_err(|_| AppError::BadRequest("missing token parameter".to_string()))?;
    let account = state.accounts().verify_with_token(&params.token).await?;
    Ok(Json(AccountView::from(&account)))
}
