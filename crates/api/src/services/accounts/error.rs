//! Account service error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::notify::PublishError;
use crate::services::ErrorKind;
use crate::services::password::PasswordHashError;
use crate::services::tokens::TokenError;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] userhub_core::EmailError),

    /// Other malformed input.
    #[error("{0}")]
    Validation(String),

    /// Account already exists.
    #[error("an account with this email already exists")]
    AlreadyExists,

    /// Account not found.
    #[error("account not found")]
    NotFound,

    /// Email address not verified yet.
    #[error("email not verified, follow the link sent to your inbox")]
    Unverified,

    /// Invalid credentials (wrong password or unknown account).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Verification token rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Password hashing failed.
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),

    /// Verification message could not be delivered.
    #[error("failed to publish verification message: {0}")]
    Publish(#[from] PublishError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AccountError {
    /// Failure category for status mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEmail(_) | Self::Validation(_) => ErrorKind::Validation,
            Self::AlreadyExists => ErrorKind::Conflict,
            Self::NotFound => ErrorKind::NotFound,
            Self::Unverified => ErrorKind::Unverified,
            Self::InvalidCredentials => ErrorKind::Unauthenticated,
            Self::Token(TokenError::Expired) => ErrorKind::Expired,
            Self::Token(TokenError::Invalid(_)) => ErrorKind::TokenInvalid,
            Self::Token(TokenError::Encoding(_))
            | Self::PasswordHash(_)
            | Self::Publish(_)
            | Self::Repository(_) => ErrorKind::Internal,
        }
    }
}
