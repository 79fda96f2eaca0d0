//! The external session a worker drives.
//!
//! A [`Session`] is the worker's connection to the command channel: it is
//! initialized once, yields inbound updates, delivers replies, and is torn
//! down in three ordered steps (stop intake, flush, shutdown).
//!
//! `next_update` must be cancel-safe: the worker races it against its
//! cancellation token and drops the future when cancellation wins. An update
//! is only acknowledged by a later `next_update` or by `flush`, so a dropped
//! poll loses nothing.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChatId, PrincipalId};

/// One inbound message from the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Monotonic id assigned by the channel, used for acknowledgement.
    pub update_id: i64,
    /// Who sent it.
    pub caller: PrincipalId,
    /// Where replies go.
    pub chat: ChatId,
    pub text: String,
}

/// Errors reported by a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Setup failed; the worker never reached steady state.
    #[error("session initialization failed: {0}")]
    Init(String),

    /// A network or upstream failure that may succeed if retried.
    #[error("transient transport error: {0}")]
    Transient(String),

    /// A failure that retrying will not fix.
    #[error("session failed: {0}")]
    Fatal(String),
}

impl SessionError {
    /// Returns true if the operation may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Transient(_))
    }

    /// Suggested delay before retrying a transient failure.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// A connection to the command channel.
#[async_trait]
pub trait Session: Send {
    /// Establishes the session. Called exactly once before anything else.
    async fn initialize(&mut self) -> Result<(), SessionError>;

    /// Waits for the next update.
    ///
    /// Returns `Ok(None)` when the channel has closed for good.
    async fn next_update(&mut self) -> Result<Option<Update>, SessionError>;

    /// Delivers a reply.
    async fn send(&mut self, chat: ChatId, text: &str) -> Result<(), SessionError>;

    /// Stops accepting new updates.
    async fn stop_intake(&mut self) -> Result<(), SessionError>;

    /// Acknowledges every update handed out so far.
    async fn flush(&mut self) -> Result<(), SessionError>;

    /// Releases session resources.
    async fn shutdown(&mut self) -> Result<(), SessionError>;
}

/// Creates a fresh [`Session`] for every worker generation.
pub trait SessionFactory: Send + Sync {
    fn create(&self) -> Box<dyn Session>;
}
