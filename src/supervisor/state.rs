//! Run-state machine for the supervised worker.
//!
//! Pure transition validation. The only allowed edges are
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`, plus
//! `Starting -> Stopped` when the worker fails to initialize.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl RunState {
    /// Returns true while a worker exists or is being brought up.
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Starting | RunState::Running)
    }

    /// Whether `self -> to` is an edge of the state graph.
    pub fn can_transition_to(self, to: RunState) -> bool {
        matches!(
            (self, to),
            (RunState::Stopped, RunState::Starting)
                | (RunState::Starting, RunState::Running)
                | (RunState::Starting, RunState::Stopped)
                | (RunState::Running, RunState::Stopping)
                | (RunState::Stopping, RunState::Stopped)
        )
    }

    /// Validates and performs the transition.
    pub fn transition(self, to: RunState) -> Result<RunState, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Stopped => "stopped",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a transition is not an edge of the state graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: RunState,
    pub to: RunState,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid run-state transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}
