//! Worker lifecycle supervision.
//!
//! The [`Supervisor`] is the single owner of the worker task and of the
//! [`RunState`]. It exposes `start()`, `stop()` and `is_running()`, publishes
//! every transition on a [`Bus`] of [`LifecycleEvent`]s, and retires workers
//! that exit on their own.

mod events;
mod state;
#[allow(clippy::module_inception)]
mod supervisor;


pub use events::{Bus, LifecycleEvent};
pub use state::{RunState, TransitionError};
pub use supervisor::{Result, StartOutcome, StopOutcome, Supervisor, SupervisorError};
