//! Best-effort operator notifications.
//!
//! Lifecycle failures (a worker that failed to start, a restart that failed
//! midway, a worker that crashed) are reported to an operator channel. A
//! notification that cannot be delivered is logged and otherwise ignored; it
//! never turns into a lifecycle error of its own.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// Errors a notification sink can report.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink has no destination configured (e.g. no admin chat).
    #[error("no notification destination configured")]
    NoDestination,

    /// Delivery failed.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// A channel that can deliver a short text message to the operator.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

/// Sends a notification, logging instead of propagating a failure.
pub async fn notify_best_effort(sink: &dyn Notify, text: &str) {
    if let Err(e) = sink.notify(text).await {
        warn!(error = %e, message = text, "Failed to deliver notification");
    }
}
