//! Long-polling [`Session`] over the Bot API.
//!
//! Updates are fetched in batches and handed out one at a time. The offset
//! sent with each `getUpdates` acknowledges everything before it, so an update
//! is only acknowledged once the worker has asked for the next one (or once
//! `flush` runs). Dropping a `next_update` future mid-request loses nothing:
//! the batch is buffered before any update leaves the session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::client::TelegramClient;
use super::error::TelegramError;
use crate::types::ChatId;
use crate::worker::{Session, SessionError, SessionFactory, Update};

/// A Bot API session for one worker generation.
pub struct TelegramSession {
    client: TelegramClient,
    poll_timeout: Duration,
    /// Id of the next update to request; everything below is acknowledged.
    offset: Option<i64>,
    pending: VecDeque<Update>,
    intake_open: bool,
}

impl TelegramSession {
    pub fn new(client: TelegramClient, poll_timeout: Duration) -> Self {
        TelegramSession {
            client,
            poll_timeout,
            offset: None,
            pending: VecDeque::new(),
            intake_open: true,
        }
    }

    /// Fetches the next batch into `pending`.
    async fn poll(&mut self) -> Result<(), SessionError> {
        let batch = self
            .client
            .get_updates(self.offset, self.poll_timeout)
            .await
            .map_err(into_session_error)?;

        for raw in batch {
            let next = raw.update_id + 1;
            if self.offset.is_none_or(|offset| next > offset) {
                self.offset = Some(next);
            }
            match raw.into_update() {
                Some(update) => self.pending.push_back(update),
                None => debug!(offset = ?self.offset, "Skipping non-text update"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Session for TelegramSession {
    #[instrument(skip(self))]
    async fn initialize(&mut self) -> Result<(), SessionError> {
        let me = self
            .client
            .get_me()
            .await
            .map_err(|e| SessionError::Init(e.to_string()))?;
        info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or(""),
            "Connected to Telegram"
        );
        Ok(())
    }

    async fn next_update(&mut self) -> Result<Option<Update>, SessionError> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Ok(Some(update));
            }
            if !self.intake_open {
                return Ok(None);
            }
            self.poll().await?;
        }
    }

    async fn send(&mut self, chat: ChatId, text: &str) -> Result<(), SessionError> {
        match self.client.send_message(chat, text).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unauthorized() => Err(SessionError::Fatal(e.to_string())),
            // Any other failure only affects this reply.
            Err(e) => Err(SessionError::Transient(e.to_string())),
        }
    }

    async fn stop_intake(&mut self) -> Result<(), SessionError> {
        self.intake_open = false;
        if !self.pending.is_empty() {
            warn!(
                dropped = self.pending.len(),
                "Dropping buffered updates; they will be redelivered"
            );
            // Rewind so the dropped updates stay unacknowledged.
            if let Some(first) = self.pending.front() {
                self.offset = Some(first.update_id);
            }
            self.pending.clear();
        }
        Ok(())
    }

    /// Acknowledges everything handed out with a zero-timeout `getUpdates`.
    async fn flush(&mut self) -> Result<(), SessionError> {
        let Some(offset) = self.offset else {
            return Ok(());
        };
        self.client
            .get_updates(Some(offset), Duration::ZERO)
            .await
            .map_err(into_session_error)?;
        debug!(offset, "Acknowledged handled updates");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), SessionError> {
        self.pending.clear();
        Ok(())
    }
}

fn into_session_error(e: TelegramError) -> SessionError {
    if e.is_transient() {
        SessionError::Transient(e.to_string())
    } else {
        SessionError::Fatal(e.to_string())
    }
}

/// Creates a [`TelegramSession`] per worker generation, sharing one client.
pub struct TelegramSessionFactory {
    client: TelegramClient,
    poll_timeout: Duration,
}

impl TelegramSessionFactory {
    pub fn new(client: TelegramClient, poll_timeout: Duration) -> Arc<Self> {
        Arc::new(TelegramSessionFactory {
            client,
            poll_timeout,
        })
    }
}

impl SessionFactory for TelegramSessionFactory {
    fn create(&self) -> Box<dyn Session> {
        Box::new(TelegramSession::new(self.client.clone(), self.poll_timeout))
    }
}
