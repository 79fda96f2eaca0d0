//! The supervised worker loop.
//!
//! A [`Worker`] owns one [`Session`] for its whole life:
//!
//! 1. `initialize()` and report the result to whoever spawned it
//! 2. pull updates until cancelled, told to stop, or failed
//! 3. tear down: stop intake, flush, shut down
//!
//! Teardown runs on every exit path after a successful initialization,
//! including steady-state failures, which are caught at the loop boundary
//! rather than propagated.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::dispatch::Dispatch;
use super::session::{Session, SessionError};

/// Why a worker task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The cancellation token fired from outside.
    Cancelled,
    /// A handled command asked the worker to stop.
    StopRequested,
    /// The command channel closed.
    IntakeClosed,
    /// A steady-state failure ended the loop.
    Failed(String),
    /// Initialization failed or was cancelled; steady state never began.
    StartupFailed(String),
}

impl WorkerExit {
    /// Returns true if the worker ended on its own rather than being stopped.
    pub fn is_self_initiated(&self) -> bool {
        matches!(
            self,
            WorkerExit::StopRequested | WorkerExit::IntakeClosed | WorkerExit::Failed(_)
        )
    }
}

/// Signals the spawner once initialization has finished.
pub type ReadySender = oneshot::Sender<Result<(), SessionError>>;

/// One generation of the worker.
pub struct Worker {
    session: Box<dyn Session>,
    dispatch: Arc<dyn Dispatch>,
    generation: u64,
}

impl Worker {
    pub fn new(session: Box<dyn Session>, dispatch: Arc<dyn Dispatch>, generation: u64) -> Self {
        Worker {
            session,
            dispatch,
            generation,
        }
    }

    /// Runs the worker until it is cancelled or exits on its own.
    ///
    /// `ready` receives the initialization result. `cancel` is this worker's
    /// own token; a stop requested by a command cancels it too.
    #[instrument(skip(self, ready, cancel), fields(generation = self.generation))]
    pub async fn run(mut self, ready: ReadySender, cancel: CancellationToken) -> WorkerExit {
        let init = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SessionError::Init("cancelled during initialization".into())),
            r = self.session.initialize() => r,
        };

        if let Err(e) = init {
            warn!(error = %e, "Worker failed to initialize");
            let reason = e.to_string();
            let _ = ready.send(Err(e));
            if let Err(e) = self.session.shutdown().await {
                debug!(error = %e, "Session shutdown after failed init also failed");
            }
            return WorkerExit::StartupFailed(reason);
        }

        // The spawner may have given up waiting; keep going regardless, the
        // token tells us if we are unwanted.
        let _ = ready.send(Ok(()));
        info!("Worker event loop started");

        let exit = self.steady_state(&cancel).await;
        match &exit {
            WorkerExit::Failed(reason) => error!(reason = %reason, "Worker loop failed"),
            other => info!(exit = ?other, "Worker loop ended"),
        }

        self.teardown().await;
        exit
    }

    async fn steady_state(&mut self, cancel: &CancellationToken) -> WorkerExit {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return WorkerExit::Cancelled,
                next = self.session.next_update() => next,
            };

            let update = match next {
                Ok(Some(update)) => update,
                Ok(None) => return WorkerExit::IntakeClosed,
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Transient error fetching updates, retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return WorkerExit::Cancelled,
                        _ = tokio::time::sleep(e.retry_delay()) => continue,
                    }
                }
                Err(e) => return WorkerExit::Failed(e.to_string()),
            };

            debug!(
                update_id = update.update_id,
                caller = %update.caller,
                "Dispatching update"
            );

            let outcome = match AssertUnwindSafe(self.dispatch.dispatch(&update))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    return WorkerExit::Failed(format!(
                        "handler panicked on update {}",
                        update.update_id
                    ));
                }
            };

            for reply in &outcome.replies {
                match self.session.send(reply.chat, &reply.text).await {
                    Ok(()) => {}
                    Err(e) if e.is_transient() => {
                        warn!(error = %e, chat = %reply.chat, "Failed to deliver reply");
                    }
                    Err(e) => return WorkerExit::Failed(e.to_string()),
                }
            }

            if outcome.stop_requested {
                info!("Stop requested by command");
                cancel.cancel();
                return WorkerExit::StopRequested;
            }
        }
    }

    /// Stop intake, then flush, then release. Errors are logged and the
    /// remaining steps still run.
    async fn teardown(&mut self) {
        if let Err(e) = self.session.stop_intake().await {
            warn!(error = %e, "Failed to stop intake");
        }
        if let Err(e) = self.session.flush().await {
            warn!(error = %e, "Failed to flush pending acknowledgements");
        }
        if let Err(e) = self.session.shutdown().await {
            warn!(error = %e, "Failed to shut down session");
        }
        debug!("Worker teardown complete");
    }
}
