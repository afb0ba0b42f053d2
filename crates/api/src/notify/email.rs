//! Verification emails over SMTP.
//!
//! Uses lettre for delivery with Askama text and HTML templates.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret;

use super::{PublishError, VerificationMessage, VerificationPublisher};
use crate::config::EmailConfig;

const SUBJECT: &str = "Verify your email address";

/// HTML template for the verification email.
#[derive(Template)]
#[template(path = "email/verify.html")]
struct VerifyEmailHtml<'a> {
    verify_url: &'a str,
    ttl_hours: i64,
}

/// Plain text template for the verification email.
#[derive(Template)]
#[template(path = "email/verify.txt")]
struct VerifyEmailText<'a> {
    verify_url: &'a str,
    ttl_hours: i64,
}

/// Sends verification links as multipart emails.
#[derive(Clone)]
pub struct SmtpPublisher {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    ttl_hours: i64,
}

impl std::fmt::Debug for SmtpPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpPublisher")
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

impl SmtpPublisher {
    /// Create a new SMTP publisher from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, PublishError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            ttl_hours: crate::config::DEFAULT_TOKEN_TTL_HOURS,
        })
    }

    /// Mention a different link lifetime in the email body.
    #[must_use]
    pub const fn with_ttl_hours(mut self, ttl_hours: i64) -> Self {
        self.ttl_hours = ttl_hours;
        self
    }

    fn build_message(&self, to: &str, verify_url: &str) -> Result<Message, PublishError> {
        let html = VerifyEmailHtml {
            verify_url,
            ttl_hours: self.ttl_hours,
        }
        .render()?;
        let text = VerifyEmailText {
            verify_url,
            ttl_hours: self.ttl_hours,
        }
        .render()?;

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| PublishError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| PublishError::InvalidAddress(to.to_string()))?)
            .subject(SUBJECT)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        Ok(message)
    }
}

#[async_trait]
impl VerificationPublisher for SmtpPublisher {
    async fn publish(&self, message: &VerificationMessage) -> Result<(), PublishError> {
        let email = self.build_message(&message.email, &message.verify_url)?;
        self.mailer.send(email).await?;

        tracing::info!(
            account_id = %message.account_id,
            to = %message.email,
            "Verification email sent"
        );
        Ok(())
    }
}
