//! A thin Bot API client over `reqwest`.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::error::TelegramError;
use super::types::{ApiResponse, GetUpdates, Message, SendMessage, TgUpdate, User};
use crate::types::ChatId;

/// The public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Request timeout for calls that do not long-poll.
const CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Slack added to the long-poll timeout so the server answers first.
const POLL_SLACK: Duration = Duration::from_secs(10);

pub type Result<T> = std::result::Result<T, TelegramError>;

/// A Bot API client bound to one bot token.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    /// `{api_base}/bot{token}`. Never logged.
    endpoint: String,
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, token: &str) -> Self {
        Self::with_api_base(http, DEFAULT_API_BASE, token)
    }

    /// Creates a client against a different API server.
    pub fn with_api_base(http: reqwest::Client, api_base: &str, token: &str) -> Self {
        TelegramClient {
            http,
            endpoint: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    async fn call<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        trace!(method, "Calling Bot API");
        let response = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(|e| TelegramError::transport(e.without_url()))?;

        let status = response.status();
        let body: ApiResponse<R> = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(TelegramError::malformed(format!(
                    "{} returned an unreadable body: {}",
                    method, e
                )));
            }
            // An error page that is not JSON, e.g. from a proxy.
            Err(_) => return Err(TelegramError::api(status.as_u16(), None, None)),
        };

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { ok: true, .. } => Err(TelegramError::malformed(format!(
                "{} succeeded without a result",
                method
            ))),
            ApiResponse {
                error_code,
                description,
                parameters,
                ..
            } => Err(TelegramError::api(
                error_code.unwrap_or(status.as_u16()),
                description,
                parameters.and_then(|p| p.retry_after),
            )),
        }
    }

    /// Returns the bot's own account. Used to verify the token.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({}), CALL_TIMEOUT)
            .await
    }

    /// Long-polls for updates after `offset`.
    ///
    /// Passing an offset acknowledges every update with a smaller id.
    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<TgUpdate>> {
        let params = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &params, timeout.saturating_add(POLL_SLACK)).await
    }

    pub async fn send_message(&self, chat: ChatId, text: &str) -> Result<Message> {
        let params = SendMessage {
            chat_id: chat.0,
            text,
        };
        self.call("sendMessage", &params, CALL_TIMEOUT).await
    }
}
