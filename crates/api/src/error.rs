//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Service errors carry an
//! [`ErrorKind`], which alone decides the status code, and server-side
//! failures are captured to Sentry before the response is written.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AccountError, ErrorKind, PictureError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Account service failure.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Picture service failure.
    #[error(transparent)]
    Picture(#[from] PictureError),

    /// Database operation failed outside a service.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Bad request from client (malformed body, query or multipart).
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    /// Failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Account(e) => e.kind(),
            Self::Picture(e) => e.kind(),
            Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
            Self::BadRequest(_) => ErrorKind::Validation,
            Self::Unauthorized(_) => ErrorKind::Unauthenticated,
        }
    }
}

/// Status code for a failure category.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::TokenInvalid => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unverified => StatusCode::FORBIDDEN,
        ErrorKind::Expired => StatusCode::GONE,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                kind = %kind,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, kind = %kind, "Request rejected");
        }

        // Don't expose internal error details to clients
        let message = match kind {
            ErrorKind::Storage => "Storage service error".to_string(),
            ErrorKind::Internal => "Internal server error".to_string(),
            ErrorKind::Unauthenticated => "Invalid credentials".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorBody {
            status: status.as_u16(),
            error: kind.as_str(),
            message,
        };
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="userhub", charset="UTF-8""#),
            );
        }

        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated account.
pub fn set_sentry_user(account_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::services::TokenError;
    use crate::storage::BlobError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ErrorKind::Validation, 400),
            (ErrorKind::Conflict, 400),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Unverified, 403),
            (ErrorKind::Expired, 410),
            (ErrorKind::TokenInvalid, 400),
            (ErrorKind::Storage, 500),
            (ErrorKind::Internal, 500),
            (ErrorKind::Unauthenticated, 401),
        ];
        for (kind, code) in cases {
            assert_eq!(status_for(kind).as_u16(), code, "{kind}");
        }
    }

    #[tokio::test]
    async fn test_conflict_body() {
        let response = AppError::from(AccountError::AlreadyExists).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["status"], 400);
        assert_eq!(json["error"], "conflict");
        assert_eq!(json["message"], "an account with this email already exists");
    }

    #[tokio::test]
    async fn test_expired_token_is_gone() {
        let response = AppError::from(AccountError::Token(TokenError::Expired)).into_response();
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(body_json(response).await["error"], "expired");
    }

    #[tokio::test]
    async fn test_unauthorized_sets_challenge() {
        let response = AppError::Unauthorized("missing credentials".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(challenge.starts_with("Basic"));
    }

    #[tokio::test]
    async fn test_server_errors_hide_detail() {
        let response = AppError::from(PictureError::Storage(BlobError::NotFound(
            "secret/key.png".into(),
        )))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "storage_error");
        assert!(!json["message"].as_str().unwrap().contains("secret"));

        let json = body_json(AppError::Internal("pool exhausted".into()).into_response()).await;
        assert_eq!(json["message"], "Internal server error");
    }
}
