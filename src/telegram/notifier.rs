//! Operator notifications delivered to the admin's private chat.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::TelegramClient;
use crate::access::AccessPolicy;
use crate::notify::{Notify, NotifyError};
use crate::types::ChatId;

/// Sends notifications to whoever the access policy names as admin.
///
/// The admin is looked up on every call, so a `/set`-style change to the
/// stored admin takes effect without a restart.
pub struct TelegramNotifier {
    client: TelegramClient,
    access: Arc<dyn AccessPolicy>,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, access: Arc<dyn AccessPolicy>) -> Self {
        TelegramNotifier { client, access }
    }
}

#[async_trait]
impl Notify for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let admin = self
            .access
            .admin_id()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?
            .ok_or(NotifyError::NoDestination)?;
        self.client
            .send_message(ChatId::from(admin), text)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}
