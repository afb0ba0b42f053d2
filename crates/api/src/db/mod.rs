//! Persistence for accounts and picture metadata.
//!
//! # Tables
//!
//! - `accounts` - Registered accounts, unique on `email`
//! - `profile_pictures` - At most one row per account, keyed by `account_id`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p userhub-cli -- migrate
//! ```
//!
//! The services only see the [`AccountRepository`] and [`PictureRepository`]
//! ports. `PostgreSQL` adapters live in [`accounts`] and [`pictures`]; the
//! in-memory adapters in `memory` back the test suites.

pub mod accounts;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod pictures;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use userhub_core::{AccountId, Email, PictureId};

use crate::models::{Account, NewAccount, Picture};

pub use accounts::PgAccountRepository;
pub use pictures::PgPictureRepository;

/// Errors that can occur in repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Storage port for accounts.
///
/// Email uniqueness is enforced by the implementation itself, so a caller's
/// existence check is only a fast path: a losing concurrent insert still
/// gets [`RepositoryError::Conflict`].
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Look up an account by exact (case-sensitive) email.
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError>;

    /// Whether an account with this exact email exists.
    async fn exists_by_email(&self, email: &Email) -> Result<bool, RepositoryError>;

    /// Insert a new, unverified account and assign its ID.
    async fn insert(&self, account: NewAccount) -> Result<Account, RepositoryError>;

    /// Persist the mutable fields of an existing account.
    async fn update(&self, account: &Account) -> Result<Account, RepositoryError>;

    /// Cheap round trip used by the health endpoint.
    async fn health_check(&self) -> Result<(), RepositoryError>;
}

/// Storage port for picture metadata.
#[async_trait]
pub trait PictureRepository: Send + Sync {
    /// The picture owned by `account_id`, if any.
    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Picture>, RepositoryError>;

    /// Store the account's picture row, replacing any row the account
    /// already has. Concurrent saves for one account leave exactly one row:
    /// whichever write lands last.
    async fn save(&self, picture: &Picture) -> Result<Picture, RepositoryError>;

    /// Remove a picture row. Returns whether a row was removed.
    async fn delete(&self, id: PictureId) -> Result<bool, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}
