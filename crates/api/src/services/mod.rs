//! Business logic services.
//!
//! Services take their collaborators at construction and never reach for
//! process-wide state. Every service error reports an [`ErrorKind`], which is
//! what the HTTP layer maps to a status code.

pub mod accounts;
pub mod password;
pub mod pictures;
pub mod tokens;

pub use accounts::{AccountError, AccountService, ResendOutcome};
pub use pictures::{PictureError, PictureService, PictureUpload};
pub use tokens::{TokenError, VerificationTokens};

/// Failure categories shared by all services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, disallowed fields, bad file type or size.
    Validation,
    /// An account with that email already exists.
    Conflict,
    /// Account or picture absent.
    NotFound,
    /// The account has not followed its verification link yet.
    Unverified,
    /// Verification link past its expiry.
    Expired,
    /// Verification token malformed or tampered with.
    TokenInvalid,
    /// Object store failure.
    Storage,
    /// Anything unexpected.
    Internal,
    /// Missing or wrong credentials.
    Unauthenticated,
}

impl ErrorKind {
    /// Stable machine-readable name, used in error bodies.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Unverified => "unverified",
            Self::Expired => "expired",
            Self::TokenInvalid => "token_invalid",
            Self::Storage => "storage_error",
            Self::Internal => "internal_error",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
