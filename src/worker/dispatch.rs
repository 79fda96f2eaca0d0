//! Routing of inbound updates to the command handler.
//!
//! The worker knows nothing about commands. It hands each [`Update`] to a
//! [`Dispatch`] implementation and sends back whatever replies come out. A
//! handler may also ask the worker to stop itself, which is how the stop
//! command hands control to the restart endpoint.

use async_trait::async_trait;

use super::session::Update;
use crate::types::ChatId;

/// A message to send back over the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chat: ChatId,
    pub text: String,
}

impl Reply {
    pub fn new(chat: ChatId, text: impl Into<String>) -> Self {
        Reply {
            chat,
            text: text.into(),
        }
    }
}

/// What handling one update produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub replies: Vec<Reply>,
    /// The worker should stop after delivering `replies`.
    pub stop_requested: bool,
}

impl DispatchOutcome {
    /// An outcome with a single reply.
    pub fn reply(chat: ChatId, text: impl Into<String>) -> Self {
        DispatchOutcome {
            replies: vec![Reply::new(chat, text)],
            stop_requested: false,
        }
    }

    /// An outcome with no replies.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Marks the outcome as requesting a worker stop.
    pub fn and_stop(mut self) -> Self {
        self.stop_requested = true;
        self
    }
}

/// Handles updates on behalf of the worker.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, update: &Update) -> DispatchOutcome;
}
