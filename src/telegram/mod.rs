//! Telegram Bot API transport.
//!
//! Provides the worker's [`Session`](crate::worker::Session) (long polling),
//! and a [`Notify`](crate::notify::Notify) sink that messages the admin.

pub mod client;
pub mod error;
pub mod notifier;
pub mod session;
pub mod types;

pub use client::TelegramClient;
pub use error::{TelegramError, TelegramErrorKind};
pub use notifier::TelegramNotifier;
pub use session::{TelegramSession, TelegramSessionFactory};
