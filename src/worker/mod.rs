//! The supervised worker and its seams.
//!
//! # Module Structure
//!
//! - [`session`]: the external command-channel session a worker drives
//! - [`dispatch`]: how updates reach the command handler
//! - [`worker`]: the loop itself, with ordered teardown

pub mod dispatch;
pub mod session;
#[allow(clippy::module_inception)]
mod worker;


pub use dispatch::{Dispatch, DispatchOutcome, Reply};
pub use session::{Session, SessionError, SessionFactory, Update};
pub use worker::{ReadySender, Worker, WorkerExit};
