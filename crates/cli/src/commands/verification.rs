//! Verification link commands.
//!
//! # Usage
//!
//! ```bash
//! userhub-cli verification resend -e alice@example.com
//! ```
//!
//! Uses the same environment as the API server: the database URL, token
//! secret, base URL, and notification settings all have to match for the
//! link to validate and reach the user.

use std::sync::Arc;

use chrono::TimeDelta;
use thiserror::Error;

use userhub_api::config::{ApiConfig, ConfigError};
use userhub_api::db::{self, PgAccountRepository};
use userhub_api::metrics::NoopMetrics;
use userhub_api::notify::{PublishError, publisher_from_config};
use userhub_api::services::{AccountError, AccountService, ResendOutcome, VerificationTokens};
use userhub_core::{Email, EmailError};

/// Errors that can occur while re-sending a link.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Publisher setup failed: {0}")]
    Publisher(#[from] PublishError),

    #[error("No account with email: {0}")]
    NotFound(String),

    #[error(transparent)]
    Account(AccountError),
}

/// Publish a fresh verification link for an unverified account.
///
/// # Errors
///
/// Returns `VerificationError` if configuration is incomplete, the account
/// does not exist, or the publisher fails.
pub async fn resend(email: &str) -> Result<(), VerificationError> {
    let config = ApiConfig::from_env()?;
    let email = Email::parse(email)?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    let service = AccountService::new(
        Arc::new(PgAccountRepository::new(pool)),
        VerificationTokens::new(
            config.tokens.secret.clone(),
            TimeDelta::hours(config.tokens.ttl_hours),
        ),
        publisher_from_config(&config.notifications, config.tokens.ttl_hours)?,
        Arc::new(NoopMetrics),
        config.base_url.clone(),
    );

    match service.resend_verification(&email).await {
        Ok(ResendOutcome::Sent) => {
            tracing::info!(email = %email, "Verification link sent");
            Ok(())
        }
        Ok(ResendOutcome::AlreadyVerified) => {
            tracing::info!(email = %email, "Account already verified, nothing sent");
            Ok(())
        }
        Err(AccountError::NotFound) => Err(VerificationError::NotFound(email.into_inner())),
        Err(e) => Err(VerificationError::Account(e)),
    }
}
