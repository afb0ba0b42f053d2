//! HTTP Basic authentication extractor.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::{AppError, set_sentry_user};
use crate::models::Account;
use crate::services::AccountError;
use crate::state::AppState;

/// Extractor that requires valid HTTP Basic credentials.
///
/// Only the password is checked here. Whether the account is verified is
/// decided by the service the handler calls.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAccount(account): RequireAccount,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", account.first_name)
/// }
/// ```
pub struct RequireAccount(pub Account);

impl FromRequestParts<AppState> for RequireAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing credentials".to_string()))?;

        let (email, password) = parse_basic(header)
            .ok_or_else(|| AppError::Unauthorized("malformed credentials".to_string()))?;

        let account = state
            .accounts()
            .authenticate(&email, &password)
            .await
            .map_err(|e| match e {
                AccountError::InvalidCredentials => {
                    AppError::Unauthorized("invalid credentials".to_string())
                }
                other => other.into(),
            })?;

        tracing::Span::current().record("account_id", account.id.as_i64());
        set_sentry_user(&account.id);

        Ok(Self(account))
    }
}

/// Split a `Basic <base64(user:pass)>` header into its two parts.
fn parse_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}
