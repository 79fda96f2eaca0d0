//! Bot API payloads.
//!
//! Only the fields the bot reads are modeled; serde ignores the rest.

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, PrincipalId};
use crate::worker::Update;

/// The envelope every Bot API method returns.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
    pub parameters: Option<ResponseParameters>,
}

/// Extra details on a failed call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before retrying a rate-limited call.
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

/// One entry from `getUpdates`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    pub message: Option<Message>,
}

impl TgUpdate {
    /// Converts to a worker update.
    ///
    /// Updates that are not text messages from a user (edits, joins, channel
    /// posts) yield `None`; they are still acknowledged by offset.
    pub fn into_update(self) -> Option<Update> {
        let message = self.message?;
        let from = message.from?;
        let text = message.text?;
        Some(Update {
            update_id: self.update_id,
            caller: PrincipalId(from.id),
            chat: ChatId(message.chat.id),
            text,
        })
    }
}

/// Parameters for `getUpdates`.
#[derive(Debug, Clone, Serialize)]
pub struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

/// Parameters for `sendMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}
