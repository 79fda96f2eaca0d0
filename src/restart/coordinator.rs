//! Token-authorized, serialized restarts.
//!
//! A restart attempt goes through:
//!
//! 1. validate the presented token against the store (`Unauthorized` on mismatch)
//! 2. `try_lock` the restart lock (`Conflict` if held; never queued)
//! 3. validate again under the lock
//! 4. `stop()` then `start()` the supervisor (`RestartFailed` on error)
//! 5. consume the token
//!
//! The lock and the phase are released by guards, so every exit path
//! (including a panic inside the critical section) leaves the coordinator
//! `Idle` and unlocked.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, instrument, warn};

use super::RestartError;
use super::token::{IssuedToken, TokenIssuer};
use crate::notify::{Notify, notify_best_effort};
use crate::supervisor::{StartOutcome, StopOutcome, Supervisor};

/// Where a restart attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPhase {
    Idle,
    LockHeld,
    Stopping,
    Starting,
}

/// Which half of the critical section failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStage {
    Stop,
    Start,
}

impl std::fmt::Display for RestartStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartStage::Stop => f.write_str("stop"),
            RestartStage::Start => f.write_str("start"),
        }
    }
}

/// What a successful restart did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartReport {
    pub stopped: StopOutcome,
    pub started: StartOutcome,
}

/// Resets the phase to `Idle` when dropped.
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<RestartPhase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a watch::Sender<RestartPhase>) -> Self {
        phase.send_replace(RestartPhase::LockHeld);
        PhaseGuard { phase }
    }

    fn set(&self, to: RestartPhase) {
        self.phase.send_replace(to);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(RestartPhase::Idle);
    }
}

/// Issues restart tokens and performs authorized restarts.
pub struct RestartCoordinator {
    issuer: Arc<TokenIssuer>,
    supervisor: Arc<Supervisor>,
    notifier: Arc<dyn Notify>,
    lock: Mutex<()>,
    phase: watch::Sender<RestartPhase>,
}

impl RestartCoordinator {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        supervisor: Arc<Supervisor>,
        notifier: Arc<dyn Notify>,
    ) -> Self {
        let (phase, _rx) = watch::channel(RestartPhase::Idle);
        RestartCoordinator {
            issuer,
            supervisor,
            notifier,
            lock: Mutex::new(()),
            phase,
        }
    }

    /// Mints a fresh token, invalidating any previous one.
    pub async fn issue_token(&self) -> Result<IssuedToken, RestartError> {
        self.issuer.issue().await
    }

    /// The current attempt phase. Rejected attempts never leave `Idle`.
    pub fn phase(&self) -> RestartPhase {
        *self.phase.borrow()
    }

    /// Watches phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<RestartPhase> {
        self.phase.subscribe()
    }

    /// True while a restart holds the lock.
    pub fn restart_in_progress(&self) -> bool {
        self.phase() != RestartPhase::Idle
    }

    /// The supervisor being restarted.
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Restarts the worker if `presented` is the outstanding token.
    #[instrument(skip_all)]
    pub async fn request_restart(&self, presented: &str) -> Result<RestartReport, RestartError> {
        if self.issuer.check(presented).await?.is_none() {
            warn!("Restart rejected: token mismatch");
            return Err(RestartError::Unauthorized);
        }

        let Ok(_lock) = self.lock.try_lock() else {
            warn!("Restart rejected: another restart is in progress");
            return Err(RestartError::Conflict);
        };
        let phase = PhaseGuard::enter(&self.phase);

        // A restart that finished between the first check and the lock has
        // consumed the token; re-read it so that attempt cannot replay it.
        let Some(stored) = self.issuer.check(presented).await? else {
            warn!("Restart rejected: token consumed or replaced by a concurrent restart");
            return Err(RestartError::Unauthorized);
        };

        match self.restart_worker(&phase).await {
            Ok(report) => {
                match self.issuer.consume(&stored).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!("Restart token was replaced during restart, keeping the new one")
                    }
                    Err(e) => error!(error = %e, "Failed to consume restart token"),
                }
                info!(stopped = ?report.stopped, started = ?report.started, "Bot restarted");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Restart failed");
                notify_best_effort(
                    self.notifier.as_ref(),
                    &format!("Failed to restart bot: {}", e),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn restart_worker(&self, phase: &PhaseGuard<'_>) -> Result<RestartReport, RestartError> {
        phase.set(RestartPhase::Stopping);
        let stopped = self
            .supervisor
            .stop()
            .await
            .map_err(|source| RestartError::RestartFailed {
                stage: RestartStage::Stop,
                source,
            })?;

        phase.set(RestartPhase::Starting);
        let started = self
            .supervisor
            .start()
            .await
            .map_err(|source| RestartError::RestartFailed {
                stage: RestartStage::Start,
                source,
            })?;

        Ok(RestartReport { stopped, started })
    }
}
