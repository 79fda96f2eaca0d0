//! Lifecycle events published by the supervisor.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]: publishing never blocks, slow
//! receivers observe `RecvError::Lagged(n)` and skip the oldest events, and
//! events sent while nobody is subscribed are dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::state::RunState;
use crate::worker::WorkerExit;

/// Something that happened to the supervised worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The run state moved along an edge of the state graph.
    StateChanged {
        from: RunState,
        to: RunState,
        at: DateTime<Utc>,
    },

    /// The worker did not finish initializing.
    StartupFailed { generation: u64, reason: String },

    /// The worker did not exit within the stop timeout and was detached.
    UncleanShutdown { generation: u64, timeout: Duration },

    /// A worker task finished.
    WorkerExited { generation: u64, exit: WorkerExit },
}

/// Broadcast channel for [`LifecycleEvent`]s.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl Bus {
    /// Creates a bus holding at most `capacity` undelivered events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Bus { tx }
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event);
    }

    /// Creates a receiver for events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(LifecycleEvent::StartupFailed {
            generation: 1,
            reason: "boom".into(),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            LifecycleEvent::StartupFailed {
                generation: 1,
                reason: "boom".into()
            }
        );
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = Bus::new(0);
        bus.publish(LifecycleEvent::UncleanShutdown {
            generation: 3,
            timeout: Duration::from_secs(5),
        });
    }
}
