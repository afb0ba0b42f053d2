//! Verification events posted to a webhook endpoint.
//!
//! The JSON body is the [`VerificationMessage`]. When a secret is configured
//! the body is signed with HMAC-SHA256 and the hex digest sent in
//! `x-userhub-signature` as `sha256=<hex>`, so the receiver can reject
//! forged events.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, instrument};
use url::Url;

use super::{PublishError, VerificationMessage, VerificationPublisher};
use crate::config::WebhookConfig;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-userhub-signature";

/// Posts verification events as JSON.
#[derive(Clone)]
pub struct WebhookPublisher {
    client: Client,
    url: Url,
    secret: Option<SecretString>,
}

impl std::fmt::Debug for WebhookPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookPublisher")
            .field("url", &self.url.as_str())
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl WebhookPublisher {
    #[must_use]
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.url.clone(),
            secret: config.secret.clone(),
        }
    }

    /// `sha256=<hex>` signature of `body`, if a secret is configured.
    fn signature(&self, body: &[u8]) -> Result<Option<String>, PublishError> {
        let Some(secret) = &self.secret else {
            return Ok(None);
        };

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| PublishError::Unavailable(format!("invalid signing key: {e}")))?;
        mac.update(body);
        Ok(Some(format!(
            "sha256={}",
            hex::encode(mac.finalize().into_bytes())
        )))
    }
}

#[async_trait]
impl VerificationPublisher for WebhookPublisher {
    #[instrument(skip(self, message), fields(account_id = %message.account_id))]
    async fn publish(&self, message: &VerificationMessage) -> Result<(), PublishError> {
        let body = serde_json::to_vec(message)
            .map_err(|e| PublishError::Unavailable(format!("failed to encode message: {e}")))?;

        let mut request = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(signature) = self.signature(&body)? {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Status(status.as_u16()));
        }

        debug!(status = status.as_u16(), "Verification webhook delivered");
        Ok(())
    }
}
