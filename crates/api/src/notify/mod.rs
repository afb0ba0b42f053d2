//! Delivery of verification links.
//!
//! The account service hands a [`VerificationMessage`] to a
//! [`VerificationPublisher`] and does not wait for any delivery receipt.
//! Which publisher runs is decided once at startup from
//! [`NotificationConfig`].

pub mod email;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use userhub_core::AccountId;

use crate::config::NotificationConfig;

pub use email::SmtpPublisher;
pub use webhook::WebhookPublisher;

/// Errors that can occur while publishing a verification message.
#[derive(Debug, Error)]
pub enum PublishError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    /// Webhook request failed.
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Webhook answered with a non-success status.
    #[error("webhook returned status {0}")]
    Status(u16),

    /// Publishing is switched off or failing on purpose.
    #[error("publisher unavailable: {0}")]
    Unavailable(String),
}

/// A verification event for one account.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMessage {
    pub account_id: AccountId,
    pub email: String,
    pub token: String,
    pub verify_url: String,
}

impl std::fmt::Debug for VerificationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationMessage")
            .field("account_id", &self.account_id)
            .field("email", &self.email)
            .field("token", &"[REDACTED]")
            .field("verify_url", &"[REDACTED]")
            .finish()
    }
}

/// Fire-and-forget sink for verification messages.
#[async_trait]
pub trait VerificationPublisher: Send + Sync {
    /// Hand the message to the delivery channel.
    async fn publish(&self, message: &VerificationMessage) -> Result<(), PublishError>;
}

/// Publisher that only records the event in the log.
///
/// Used when no delivery channel is configured. The token is never logged,
/// so accounts created under this publisher need `userhub-cli verification
/// resend` once a real channel is configured.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

#[async_trait]
impl VerificationPublisher for LogPublisher {
    async fn publish(&self, message: &VerificationMessage) -> Result<(), PublishError> {
        tracing::info!(
            account_id = %message.account_id,
            email = %message.email,
            "Verification link issued (no delivery channel configured)"
        );
        Ok(())
    }
}

/// Build the publisher selected by configuration.
///
/// `ttl_hours` is only quoted in message bodies.
///
/// # Errors
///
/// Returns `PublishError::Smtp` if the SMTP transport cannot be configured.
pub fn publisher_from_config(
    config: &NotificationConfig,
    ttl_hours: i64,
) -> Result<Arc<dyn VerificationPublisher>, PublishError> {
    Ok(match config {
        NotificationConfig::Smtp(email) => {
            Arc::new(SmtpPublisher::new(email)?.with_ttl_hours(ttl_hours))
        }
        NotificationConfig::Webhook(hook) => Arc::new(WebhookPublisher::new(hook)),
        NotificationConfig::Log => Arc::new(LogPublisher),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message() -> VerificationMessage {
        VerificationMessage {
            account_id: AccountId::new(5),
            email: "alice@example.com".to_string(),
            token: "header.claims.sig".to_string(),
            verify_url: "http://localhost/v1/user/verify?token=header.claims.sig".to_string(),
        }
    }

    #[test]
    fn test_message_json_shape() {
        let json = serde_json::to_value(message()).unwrap();
        assert_eq!(json["accountId"], 5);
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["token"], "header.claims.sig");
        assert!(json["verifyUrl"].as_str().unwrap().ends_with("token=header.claims.sig"));
    }

    #[test]
    fn test_message_debug_redacts_token() {
        let debug = format!("{:?}", message());
        assert!(!debug.contains("header.claims.sig"));
        assert!(debug.contains("alice@example.com"));
    }

    #[tokio::test]
    async fn test_log_publisher_succeeds() {
        assert!(LogPublisher.publish(&message()).await.is_ok());
    }

    #[test]
    fn test_log_config_selects_log_publisher() {
        assert!(publisher_from_config(&NotificationConfig::Log, 24).is_ok());
    }
}
