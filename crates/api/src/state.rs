//! Application state shared across handlers.

use std::sync::Arc;

use crate::metrics::PrometheusMetrics;
use crate::services::{AccountService, PictureService};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Holds the two services and the counters
/// they report to; everything else (repositories, blob store, publisher) is
/// reached through the services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    accounts: AccountService,
    pictures: PictureService,
    metrics: Arc<PrometheusMetrics>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        accounts: AccountService,
        pictures: PictureService,
        metrics: Arc<PrometheusMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                accounts,
                pictures,
                metrics,
            }),
        }
    }

    /// Account lifecycle service.
    #[must_use]
    pub fn accounts(&self) -> &AccountService {
        &self.inner.accounts
    }

    /// Profile picture service.
    #[must_use]
    pub fn pictures(&self) -> &PictureService {
        &self.inner.pictures
    }

    /// Operation counters.
    #[must_use]
    pub fn metrics(&self) -> &PrometheusMetrics {
        &self.inner.metrics
    }
}
