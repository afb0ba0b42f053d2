//! Operation counters.
//!
//! Services report the outcome of each operation through the [`Metrics`]
//! port. [`PrometheusMetrics`] keeps them in a `prometheus` registry that
//! the `/metrics` route renders in the text exposition format.
//!
//! # Metric Specification
//!
//! - **Name**: `userhub_operations_total`
//! - **Type**: Counter
//! - **Labels**:
//!   - `operation`: see [`Operation::as_str`]
//!   - `outcome`: `success` or `error`

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Something the service layer counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Signup,
    /// Handing a verification link to the publisher.
    VerificationPublish,
    EmailVerify,
    PictureUpload,
    PictureGet,
    PictureDelete,
    /// Removing a picture row whose blob is gone.
    OrphanRepair,
    /// Removing a freshly written blob after its row could not be saved.
    BlobDiscard,
}

impl Operation {
    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::VerificationPublish => "verification_publish",
            Self::EmailVerify => "email_verify",
            Self::PictureUpload => "picture_upload",
            Self::PictureGet => "picture_get",
            Self::PictureDelete => "picture_delete",
            Self::OrphanRepair => "orphan_repair",
            Self::BlobDiscard => "blob_discard",
        }
    }
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    /// `Success` for `Ok`, `Error` for `Err`.
    #[must_use]
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(_) => Self::Error,
        }
    }

    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Port for operation counters.
pub trait Metrics: Send + Sync {
    /// Count one `operation` ending in `outcome`.
    fn record(&self, operation: Operation, outcome: Outcome);
}

/// Discards everything. Used by one-shot CLI commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn record(&self, _operation: Operation, _outcome: Outcome) {}
}

/// Prometheus-backed counters with their own registry.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    operations_total: IntCounterVec,
}

impl PrometheusMetrics {
    /// Create the counters and register them with a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric cannot be created or registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let operations_total = IntCounterVec::new(
            Opts::new(
                "userhub_operations_total",
                "Service operations by outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;
        Ok(Self {
            registry,
            operations_total,
        })
    }

    /// Current value of one counter.
    #[must_use]
    pub fn count(&self, operation: Operation, outcome: Outcome) -> u64 {
        self.operations_total
            .with_label_values(&[operation.as_str(), outcome.as_str()])
            .get()
    }

    /// Every registered metric in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Metrics for PrometheusMetrics {
    fn record(&self, operation: Operation, outcome: Outcome) {
        self.operations_total
            .with_label_values(&[operation.as_str(), outcome.as_str()])
            .inc();
    }
}
