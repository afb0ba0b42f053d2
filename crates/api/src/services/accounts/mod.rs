//! Account lifecycle service.
//!
//! Owns account creation, the verification gate, self-service updates, and
//! the unverified to verified transition.
//!
//! # Verification flow
//!
//! Creation issues a signed token and hands it to the configured
//! [`VerificationPublisher`]. A failed publish is logged but does not fail
//! signup; `resend_verification` (exposed through the CLI) covers accounts
//! whose first message never arrived. Every publish attempt is counted under
//! [`Operation::VerificationPublish`], so failed deliveries show up as
//! `error` outcomes.

mod error;

pub use error::AccountError;

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use url::Url;

use userhub_core::Email;

use crate::db::{AccountRepository, RepositoryError};
use crate::metrics::{Metrics, Operation, Outcome};
use crate::models::{Account, AccountPatch, CreateAccountRequest, NewAccount};
use crate::notify::{VerificationMessage, VerificationPublisher};
use crate::services::password::{hash_password, verify_password};
use crate::services::tokens::VerificationTokens;

/// What `resend_verification` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    /// A fresh link was published.
    Sent,
    /// The account is already verified; nothing was sent.
    AlreadyVerified,
}

/// Account service.
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    tokens: VerificationTokens,
    publisher: Arc<dyn VerificationPublisher>,
    metrics: Arc<dyn Metrics>,
    base_url: Url,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        tokens: VerificationTokens,
        publisher: Arc<dyn VerificationPublisher>,
        metrics: Arc<dyn Metrics>,
        base_url: Url,
    ) -> Self {
        Self {
            accounts,
            tokens,
            publisher,
            metrics,
            base_url,
        }
    }

    /// Repository health, for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns the repository error if the backend cannot be reached.
    pub async fn health_check(&self) -> Result<(), RepositoryError> {
        self.accounts.health_check().await
    }

    /// Register a new, unverified account and publish its verification link.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidEmail` if the email format is invalid.
    /// Returns `AccountError::Validation` if the password or a name is blank.
    /// Returns `AccountError::AlreadyExists` if the email is already registered.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_account(
        &self,
        request: CreateAccountRequest,
    ) -> Result<Account, AccountError> {
        let result = self.register(request).await;
        self.metrics.record(Operation::Signup, Outcome::of(&result));
        result
    }

    async fn register(&self, request: CreateAccountRequest) -> Result<Account, AccountError> {
        let email = Email::parse(&request.email)?;
        require_non_blank("password", &request.password)?;
        require_non_blank("firstName", &request.first_name)?;
        require_non_blank("lastName", &request.last_name)?;

        if self.accounts.exists_by_email(&email).await? {
            tracing::warn!("Account already exists");
            return Err(AccountError::AlreadyExists);
        }

        let password_hash = hash_password(&request.password)?;
        let account = self
            .accounts
            .insert(NewAccount {
                email,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AccountError::AlreadyExists,
                other => AccountError::Repository(other),
            })?;

        tracing::info!(account_id = %account.id, "Account created");

        if let Err(e) = self.send_verification(&account).await {
            tracing::warn!(
                account_id = %account.id,
                error = %e,
                "Failed to publish verification message; account stays unverified"
            );
        }

        Ok(account)
    }

    /// Check Basic credentials. Does not apply the verification gate.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidCredentials` for an unknown email or a
    /// wrong password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account, AccountError> {
        let Ok(email) = Email::parse(email) else {
            return Err(AccountError::InvalidCredentials);
        };

        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash) {
            return Err(AccountError::InvalidCredentials);
        }

        Ok(account)
    }

    /// Resolve an authenticated identity, requiring a verified email.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotFound` if the account does not exist and
    /// `AccountError::Unverified` if its email is not verified.
    pub async fn get_authenticated_account(&self, email: &Email) -> Result<Account, AccountError> {
        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or(AccountError::NotFound)?;

        if !account.email_verified {
            tracing::warn!(account_id = %account.id, "Unverified account attempted access");
            return Err(AccountError::Unverified);
        }

        Ok(account)
    }

    /// Apply a partial update to the caller's own account.
    ///
    /// Only fields present and non-null in the patch change. The password is
    /// re-hashed only when a non-empty one is supplied. `account_updated` is
    /// refreshed on every successful call.
    ///
    /// # Errors
    ///
    /// Returns the gate errors of [`AccountService::get_authenticated_account`]
    /// and `AccountError::Validation` for a blank name.
    #[instrument(skip(self, patch), fields(email = %email))]
    pub async fn update_self(
        &self,
        email: &Email,
        patch: AccountPatch,
    ) -> Result<Account, AccountError> {
        let mut account = self.get_authenticated_account(email).await?;

        if let Some(first_name) = patch.first_name.as_deref() {
            require_non_blank("firstName", first_name)?;
        }
        if let Some(last_name) = patch.last_name.as_deref() {
            require_non_blank("lastName", last_name)?;
        }
        if let Some(password) = patch.new_password() {
            account.password_hash = hash_password(password)?;
        }
        if let Some(first_name) = patch.first_name {
            account.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            account.last_name = last_name;
        }

        account.touch(Utc::now());
        let updated = self.accounts.update(&account).await?;

        tracing::info!(account_id = %updated.id, "Account updated");
        Ok(updated)
    }

    /// Mark the account's email as verified.
    ///
    /// Verifying an already verified account returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotFound` if the account does not exist.
    pub async fn verify_email(&self, email: &Email) -> Result<Account, AccountError> {
        let mut account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or(AccountError::NotFound)?;

        if account.email_verified {
            tracing::debug!(account_id = %account.id, "Email already verified");
            return Ok(account);
        }

        account.email_verified = true;
        account.touch(Utc::now());
        let verified = self.accounts.update(&account).await?;

        tracing::info!(account_id = %verified.id, "Email verified");
        Ok(verified)
    }

    /// Validate a verification token and verify the account it names.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Token` with `Expired` or `Invalid` for a bad
    /// token, and `AccountError::NotFound` if the account no longer exists.
    pub async fn verify_with_token(&self, token: &str) -> Result<Account, AccountError> {
        let result = match self.tokens.validate(token) {
            Ok(email) => self.verify_email(&email).await,
            Err(e) => Err(e.into()),
        };
        self.metrics
            .record(Operation::EmailVerify, Outcome::of(&result));
        result
    }

    /// Issue and publish a fresh verification link for an unverified account.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotFound` if the account does not exist and
    /// `AccountError::Publish` if delivery fails.
    pub async fn resend_verification(&self, email: &Email) -> Result<ResendOutcome, AccountError> {
        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or(AccountError::NotFound)?;

        if account.email_verified {
            return Ok(ResendOutcome::AlreadyVerified);
        }

        self.send_verification(&account).await?;
        tracing::info!(account_id = %account.id, "Verification link re-sent");
        Ok(ResendOutcome::Sent)
    }

    async fn send_verification(&self, account: &Account) -> Result<(), AccountError> {
        let token = self.tokens.issue(&account.email)?;
        let message = VerificationMessage {
            account_id: account.id,
            email: account.email.to_string(),
            verify_url: self.verify_url(&token),
            token,
        };
        let published = self.publisher.publish(&message).await;
        self.metrics
            .record(Operation::VerificationPublish, Outcome::of(&published));
        published?;
        Ok(())
    }

    /// `{base_url}/v1/user/verify?token=...`
    fn verify_url(&self, token: &str) -> String {
        let mut url = self.base_url.clone();
        let path = format!("{}/v1/user/verify", self.base_url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut().clear().append_pair("token", token);
        url.into()
    }
}

fn require_non_blank(field: &str, value: &str) -> Result<(), AccountError> {
    if value.trim().is_empty() {
        return Err(AccountError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}
