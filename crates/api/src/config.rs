//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `USERHUB_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `USERHUB_TOKEN_SECRET` - Verification token signing key (min 32 chars, high entropy)
//! - `USERHUB_BASE_URL` - Public URL of the API, used to build verification links
//! - `USERHUB_STORAGE_URL` - Picture bucket, `s3://bucket` or `memory://bucket`
//!
//! ## Optional
//! - `USERHUB_HOST` - Bind address (default: 127.0.0.1)
//! - `USERHUB_PORT` - Listen port (default: 8080)
//! - `USERHUB_PICTURE_MAX_BYTES` - Upload ceiling in bytes (default: 1048576)
//! - `USERHUB_TOKEN_TTL_HOURS` - Verification link lifetime, 1 to 8760
//!   (default: 24)
//! - `USERHUB_PUBLIC_BLOB_URL` - Base of returned picture URLs
//!   (default: `https://{bucket}.s3.{region}.amazonaws.com`)
//! - `USERHUB_LOG_JSON` - Emit JSON logs when set
//! - `AWS_REGION` - S3 region (default: us-east-1)
//! - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` - Static S3 credentials
//! - `AWS_ENDPOINT` - Custom S3 endpoint (`MinIO`, localstack)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   Deliver verification links by email
//! - `USERHUB_VERIFICATION_WEBHOOK_URL`, `USERHUB_VERIFICATION_WEBHOOK_SECRET` -
//!   Deliver verification events to a webhook when SMTP is not configured
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default upload ceiling for profile pictures (1 MiB).
pub const DEFAULT_PICTURE_MAX_BYTES: usize = 1024 * 1024;

/// Default lifetime of a verification link.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Longest accepted verification link lifetime (one year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: Url,
    /// Verification token settings
    pub tokens: TokenConfig,
    /// Profile picture storage settings
    pub storage: StorageConfig,
    /// How verification links are delivered
    pub notifications: NotificationConfig,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Verification token settings.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC signing key.
    pub secret: SecretString,
    /// How long an issued link stays valid.
    pub ttl_hours: i64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

/// Which object store backs picture blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Amazon S3 or an S3-compatible service.
    S3,
    /// Process-local memory, for development and tests.
    Memory,
}

/// Profile picture storage settings.
#[derive(Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    /// Base that picture URLs are built from (no trailing slash).
    pub public_base_url: String,
    /// Largest accepted upload in bytes.
    pub max_picture_bytes: usize,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_base_url", &self.public_base_url)
            .field("max_picture_bytes", &self.max_picture_bytes)
            .finish()
    }
}

/// SMTP delivery settings.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Webhook delivery settings.
#[derive(Clone)]
pub struct WebhookConfig {
    pub url: Url,
    /// Optional HMAC key for the `x-userhub-signature` header.
    pub secret: Option<SecretString>,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url.as_str())
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Verification link delivery, picked in order SMTP, webhook, log.
#[derive(Debug, Clone)]
pub enum NotificationConfig {
    Smtp(EmailConfig),
    Webhook(WebhookConfig),
    Log,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ApiConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let database_url = env.database_url("USERHUB_DATABASE_URL")?;
        let host = env.parsed_or_default::<IpAddr>("USERHUB_HOST", "127.0.0.1")?;
        let port = env.parsed_or_default::<u16>("USERHUB_PORT", "8080")?;
        let base_url = env.required_url("USERHUB_BASE_URL")?;

        let token_secret = env.validated_secret("USERHUB_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "USERHUB_TOKEN_SECRET")?;
        let ttl_hours = env.parsed_or_default::<i64>(
            "USERHUB_TOKEN_TTL_HOURS",
            &DEFAULT_TOKEN_TTL_HOURS.to_string(),
        )?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&ttl_hours) {
            return Err(ConfigError::InvalidEnvVar(
                "USERHUB_TOKEN_TTL_HOURS".to_string(),
                format!("must be between 1 and {MAX_TOKEN_TTL_HOURS}"),
            ));
        }

        let storage = StorageConfig::from_env(&env)?;
        let notifications = NotificationConfig::from_env(&env)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            tokens: TokenConfig {
                secret: token_secret,
                ttl_hours,
            },
            storage,
            notifications,
            log_json: env.optional("USERHUB_LOG_JSON").is_some(),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StorageConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let (backend, bucket) = parse_storage_url(&env.required("USERHUB_STORAGE_URL")?)?;
        let region = env.or_default("AWS_REGION", "us-east-1");
        let public_base_url = env.optional("USERHUB_PUBLIC_BLOB_URL").map_or_else(
            || format!("https://{bucket}.s3.{region}.amazonaws.com"),
            |url| url.trim_end_matches('/').to_string(),
        );
        let max_picture_bytes = env.parsed_or_default::<usize>(
            "USERHUB_PICTURE_MAX_BYTES",
            &DEFAULT_PICTURE_MAX_BYTES.to_string(),
        )?;

        Ok(Self {
            backend,
            bucket,
            region,
            endpoint: env.optional("AWS_ENDPOINT"),
            access_key_id: env.optional("AWS_ACCESS_KEY_ID"),
            secret_access_key: env.optional("AWS_SECRET_ACCESS_KEY").map(SecretString::from),
            public_base_url,
            max_picture_bytes,
        })
    }
}

impl NotificationConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        if let Some(smtp_host) = env.optional("SMTP_HOST") {
            return Ok(Self::Smtp(EmailConfig {
                smtp_host,
                smtp_port: env.parsed_or_default::<u16>("SMTP_PORT", "587")?,
                smtp_username: env.required("SMTP_USERNAME")?,
                smtp_password: SecretString::from(env.required("SMTP_PASSWORD")?),
                from_address: env.required("EMAIL_FROM")?,
            }));
        }

        if env.optional("USERHUB_VERIFICATION_WEBHOOK_URL").is_some() {
            let url = env.required_url("USERHUB_VERIFICATION_WEBHOOK_URL")?;
            let secret = match env.optional("USERHUB_VERIFICATION_WEBHOOK_SECRET") {
                Some(value) => {
                    validate_secret_strength(&value, "USERHUB_VERIFICATION_WEBHOOK_SECRET")?;
                    Some(SecretString::from(value))
                }
                None => None,
            };
            return Ok(Self::Webhook(WebhookConfig { url, secret }));
        }

        Ok(Self::Log)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup with the typed accessors used while loading.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional environment variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required environment variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an environment variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed_or_default<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn required_url(&self, key: &str) -> Result<Url, ConfigError> {
        Url::parse(&self.required(key)?)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Load and validate a secret from environment.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Split `s3://bucket` or `memory://bucket` into backend and bucket name.
fn parse_storage_url(raw: &str) -> Result<(StorageBackend, String), ConfigError> {
    let invalid = |msg: &str| ConfigError::InvalidEnvVar("USERHUB_STORAGE_URL".into(), msg.into());

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    let backend = match url.scheme() {
        "s3" => StorageBackend::S3,
        "memory" => StorageBackend::Memory,
        other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
    };
    let bucket = url
        .host_str()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| invalid("missing bucket name"))?;

    Ok((backend, bucket.to_string()))
}

/// Validate that the token signing key meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
