//! Recording publisher for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{PublishError, VerificationMessage, VerificationPublisher};

/// Keeps every published message, or fails on demand.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<VerificationMessage>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose every call fails.
    #[must_use]
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.set_failing(true);
        publisher
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages published so far.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn messages(&self) -> Vec<VerificationMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Token from the most recent message.
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.messages().last().map(|m| m.token.clone())
    }
}

#[async_trait]
impl VerificationPublisher for RecordingPublisher {
    async fn publish(&self, message: &VerificationMessage) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable("recording publisher set to fail".into()));
        }
        self.messages
            .lock()
            .map_err(|_| PublishError::Unavailable("lock poisoned".into()))?
            .push(message.clone());
        Ok(())
    }
}
