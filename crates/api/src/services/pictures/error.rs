//! Picture service error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::ErrorKind;
use crate::services::accounts::AccountError;
use crate::storage::BlobError;

/// Errors that can occur during picture operations.
#[derive(Debug, Error)]
pub enum PictureError {
    /// The upload itself is unacceptable (empty, wrong type, too large).
    #[error("{0}")]
    Validation(String),

    /// The account has no picture.
    #[error("profile picture not found")]
    NotFound,

    /// Resolving the caller's account failed.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// The object store failed.
    #[error("storage error: {0}")]
    Storage(#[from] BlobError),

    /// The metadata store failed.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl PictureError {
    /// Failure category for status mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound => ErrorKind::NotFound,
            Self::Account(e) => e.kind(),
            Self::Storage(_) => ErrorKind::Storage,
            Self::Repository(_) => ErrorKind::Internal,
        }
    }
}
