//! Remote restart handshake.
//!
//! The command side asks for a token ([`RestartCoordinator::issue_token`])
//! and shows the operator a restart link. The HTTP side presents the token
//! back ([`RestartCoordinator::request_restart`]), which stops and restarts
//! the worker at most once per token and never runs two restarts at once.

use thiserror::Error;

mod coordinator;
mod token;


pub use coordinator::{RestartCoordinator, RestartPhase, RestartReport, RestartStage};
pub use token::{IssuedToken, TokenIssuer};

use crate::store::StoreError;
use crate::supervisor::SupervisorError;

/// Errors from issuing tokens or restarting.
#[derive(Debug, Error)]
pub enum RestartError {
    /// The presented token does not match the outstanding one.
    #[error("invalid restart token")]
    Unauthorized,

    /// Another restart holds the restart lock.
    #[error("restart already in progress")]
    Conflict,

    /// Stopping or starting the worker failed inside the critical section.
    #[error("failed to {stage} worker: {source}")]
    RestartFailed {
        stage: RestartStage,
        #[source]
        source: SupervisorError,
    },

    /// No deploy URL is stored or configured, so no restart link can be built.
    #[error("web url has not been set")]
    BaseUrlUnset,

    /// The token store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
