//! The process-wide worker supervisor.
//!
//! Owns at most one [`WorkerHandle`] and the [`RunState`]. Every mutation of
//! either happens while holding `inner`, so `start()`, `stop()` and the reaper
//! never interleave. The state is mirrored into a `watch` channel so readers
//! (`is_running()`, the status endpoint) never wait on the mutex.
//!
//! # Self-initiated exits
//!
//! A worker can end without `stop()` being called: a stop command, a closed
//! intake, a steady-state failure. The worker's task cannot take the mutex
//! itself (a concurrent `stop()` may hold it while joining that very task),
//! so it spawns a separate reaper that takes the mutex later and only acts if
//! that worker generation is still the current one.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::events::{Bus, LifecycleEvent};
use super::state::{RunState, TransitionError};
use crate::config::LifecycleConfig;
use crate::notify::{Notify, notify_best_effort};
use crate::worker::{Dispatch, SessionFactory, Worker, WorkerExit};

/// Capacity of the lifecycle event bus.
const EVENT_BUS_CAPACITY: usize = 64;

/// Errors from supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker failed to initialize or did not report in time.
    #[error("worker failed to start: {reason}")]
    StartupFailure { reason: String },

    /// An internal transition broke the state graph.
    #[error("lifecycle invariant violated: {0}")]
    Transition(#[from] TransitionError),
}

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// What `start()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new worker generation is running.
    Started { generation: u64 },
    /// A worker was already running; nothing changed.
    AlreadyRunning,
}

/// What `stop()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker exited within the timeout.
    Stopped,
    /// The worker did not exit in time and was detached.
    Unclean,
    /// Nothing was running.
    NotRunning,
}

/// The live worker task.
struct WorkerHandle {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<WorkerExit>,
}

struct Inner {
    handle: Option<WorkerHandle>,
    generation: u64,
}

/// Singleton owner of the worker lifecycle.
///
/// Construct once per process with [`Supervisor::new`] and share the `Arc`.
pub struct Supervisor {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<RunState>,
    bus: Bus,
    factory: Arc<dyn SessionFactory>,
    dispatch: Arc<dyn Dispatch>,
    notifier: Arc<dyn Notify>,
    config: LifecycleConfig,
    weak_self: Weak<Supervisor>,
}

impl Supervisor {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        dispatch: Arc<dyn Dispatch>,
        notifier: Arc<dyn Notify>,
        config: LifecycleConfig,
    ) -> Arc<Self> {
        let (state_tx, _rx) = watch::channel(RunState::Stopped);
        Arc::new_cyclic(|weak_self| Supervisor {
            inner: Mutex::new(Inner {
                handle: None,
                generation: 0,
            }),
            state_tx,
            bus: Bus::new(EVENT_BUS_CAPACITY),
            factory,
            dispatch,
            notifier,
            config,
            weak_self: weak_self.clone(),
        })
    }

    /// Current run state. Never blocks.
    pub fn state(&self) -> RunState {
        *self.state_tx.borrow()
    }

    /// True while starting or running. Never blocks.
    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    /// Watches run-state changes.
    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    /// Subscribes to lifecycle events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.bus.subscribe()
    }

    /// Starts a worker unless one is already starting or running.
    ///
    /// Returns once the new worker has finished initializing, or with
    /// [`SupervisorError::StartupFailure`] if it failed or did not report
    /// within the startup timeout. In the failure case the state is back to
    /// `Stopped` and the operator has been notified.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<StartOutcome> {
        let mut inner = self.inner.lock().await;

        if inner.handle.is_some() || self.state().is_active() {
            info!(state = %self.state(), "Start requested but worker already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        self.transition(RunState::Starting)?;
        inner.generation += 1;
        let generation = inner.generation;

        let session = self.factory.create();
        let worker = Worker::new(session, Arc::clone(&self.dispatch), generation);
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let task = tokio::spawn(Self::supervised(
            worker,
            ready_tx,
            cancel.clone(),
            self.weak_self.clone(),
            generation,
        ));

        let failure = match tokio::time::timeout(self.config.startup_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(e.to_string()),
            Ok(Err(_)) => Some("worker exited before reporting initialization".to_string()),
            Err(_) => Some(format!(
                "initialization did not finish within {:?}",
                self.config.startup_timeout
            )),
        };

        if let Some(reason) = failure {
            cancel.cancel();
            if tokio::time::timeout(self.config.stop_timeout, task)
                .await
                .is_err()
            {
                warn!(generation, "Worker that failed to start did not exit, detaching");
            }
            self.transition(RunState::Stopped)?;
            self.bus.publish(LifecycleEvent::StartupFailed {
                generation,
                reason: reason.clone(),
            });
            drop(inner);

            error!(generation, reason = %reason, "Worker failed to start");
            notify_best_effort(
                self.notifier.as_ref(),
                &format!("Worker failed to start: {}", reason),
            )
            .await;
            return Err(SupervisorError::StartupFailure { reason });
        }

        inner.handle = Some(WorkerHandle {
            generation,
            cancel,
            task,
        });
        self.transition(RunState::Running)?;
        info!(generation, "Worker started");
        Ok(StartOutcome::Started { generation })
    }

    /// Stops the running worker, waiting at most the stop timeout.
    ///
    /// Always ends in `Stopped`. A worker that does not exit in time is
    /// detached (its token is already cancelled) and reported as
    /// [`StopOutcome::Unclean`].
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<StopOutcome> {
        let mut inner = self.inner.lock().await;

        let Some(handle) = inner.handle.take() else {
            debug!("Stop requested but no worker is running");
            return Ok(StopOutcome::NotRunning);
        };

        handle.cancel.cancel();
        self.transition(RunState::Stopping)?;

        let generation = handle.generation;
        let timeout = self.config.stop_timeout;
        let outcome = match tokio::time::timeout(timeout, handle.task).await {
            Ok(Ok(exit)) => {
                debug!(generation, exit = ?exit, "Worker exited");
                self.bus
                    .publish(LifecycleEvent::WorkerExited { generation, exit });
                StopOutcome::Stopped
            }
            Ok(Err(join_error)) => {
                warn!(generation, error = %join_error, "Worker task ended abnormally");
                StopOutcome::Stopped
            }
            Err(_) => {
                warn!(generation, ?timeout, "Worker did not stop in time, detaching");
                self.bus
                    .publish(LifecycleEvent::UncleanShutdown { generation, timeout });
                StopOutcome::Unclean
            }
        };

        self.transition(RunState::Stopped)?;
        info!(generation, outcome = ?outcome, "Worker stopped");
        Ok(outcome)
    }

    /// Runs a worker generation and arranges reaping if it ends on its own.
    async fn supervised(
        worker: Worker,
        ready: crate::worker::ReadySender,
        cancel: CancellationToken,
        supervisor: Weak<Supervisor>,
        generation: u64,
    ) -> WorkerExit {
        let exit = match AssertUnwindSafe(worker.run(ready, cancel)).catch_unwind().await {
            Ok(exit) => exit,
            Err(_) => WorkerExit::Failed("worker task panicked".to_string()),
        };

        if exit.is_self_initiated()
            && let Some(supervisor) = supervisor.upgrade()
        {
            let reaped = exit.clone();
            tokio::spawn(async move { supervisor.reap(generation, reaped).await });
        }
        exit
    }

    /// Retires a worker generation that exited on its own.
    async fn reap(&self, generation: u64, exit: WorkerExit) {
        let mut inner = self.inner.lock().await;

        let is_current = inner
            .handle
            .as_ref()
            .is_some_and(|h| h.generation == generation);
        if !is_current {
            debug!(generation, "Worker already retired");
            return;
        }
        let Some(handle) = inner.handle.take() else {
            return;
        };

        if let Err(e) = self.reap_transitions(handle).await {
            error!(generation, error = %e, "Failed to retire worker");
        }
        self.bus.publish(LifecycleEvent::WorkerExited {
            generation,
            exit: exit.clone(),
        });
        drop(inner);

        match exit {
            WorkerExit::Failed(reason) => {
                error!(generation, reason = %reason, "Worker stopped after a failure");
                notify_best_effort(
                    self.notifier.as_ref(),
                    &format!("Worker stopped after a failure: {}", reason),
                )
                .await;
            }
            other => info!(generation, exit = ?other, "Worker stopped on its own"),
        }
    }

    async fn reap_transitions(&self, handle: WorkerHandle) -> Result<()> {
        self.transition(RunState::Stopping)?;
        // The task has already returned its exit; this only collects it.
        if tokio::time::timeout(self.config.stop_timeout, handle.task)
            .await
            .is_err()
        {
            warn!(generation = handle.generation, "Exited worker did not finish, detaching");
        }
        self.transition(RunState::Stopped)?;
        Ok(())
    }

    /// Moves along one edge of the state graph and publishes it.
    ///
    /// Callers must hold `inner`.
    fn transition(&self, to: RunState) -> std::result::Result<(), TransitionError> {
        let from = self.state();
        from.transition(to)?;
        self.state_tx.send_replace(to);
        debug!(%from, %to, "Run state changed");
        self.bus.publish(LifecycleEvent::StateChanged {
            from,
            to,
            at: Utc::now(),
        });
        Ok(())
    }
}
