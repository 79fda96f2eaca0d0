//! botkeeper - a Telegram bot that can be stopped from chat and restarted
//! in place over HTTP with a one-time link.
//!
//! The lifecycle core is the [`supervisor`] (one worker at a time, bounded
//! start and stop) and the [`restart`] coordinator (token check, fail-fast
//! lock, stop then start). Everything else plugs into it through traits:
//! [`worker::Session`] for the chat transport, [`worker::Dispatch`] for
//! command handling, [`store::KvStore`] for shared state and
//! [`notify::Notify`] for operator alerts.

pub mod access;
pub mod commands;
pub mod config;
pub mod notify;
pub mod probe;
pub mod restart;
pub mod server;
pub mod settings;
pub mod shutdown;
pub mod store;
pub mod supervisor;
pub mod telegram;
pub mod types;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
