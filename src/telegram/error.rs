//! Bot API error types.
//!
//! Errors are split the way retry logic needs them:
//!
//! - **Transient** errors may succeed later (network failures, 429, 5xx)
//! - **Permanent** errors will not (bad token, unknown chat, malformed request)

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Whether a failed call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramErrorKind {
    Transient,
    Permanent,
}

/// A failed Bot API call.
#[derive(Debug, Error)]
pub struct TelegramError {
    pub kind: TelegramErrorKind,

    /// The API's `error_code` (or HTTP status), if a response arrived.
    pub status_code: Option<u16>,

    pub message: String,

    /// How long the API asked us to back off, for 429 responses.
    pub retry_after: Option<Duration>,

    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for TelegramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "Telegram API error ({}): {}", code, self.message),
            None => write!(f, "Telegram API error: {}", self.message),
        }
    }
}

impl TelegramError {
    /// A failure before any API response arrived.
    pub fn transport(source: reqwest::Error) -> Self {
        let kind = if source.is_builder() {
            TelegramErrorKind::Permanent
        } else {
            TelegramErrorKind::Transient
        };
        TelegramError {
            kind,
            status_code: source.status().map(|s| s.as_u16()),
            message: source.to_string(),
            retry_after: None,
            source: Some(source),
        }
    }

    /// An `ok: false` response.
    pub fn api(status_code: u16, description: Option<String>, retry_after: Option<u64>) -> Self {
        TelegramError {
            kind: categorize(status_code),
            status_code: Some(status_code),
            message: description.unwrap_or_else(|| "no description".to_string()),
            retry_after: retry_after.map(Duration::from_secs),
            source: None,
        }
    }

    /// A response that could not be understood.
    pub fn malformed(message: impl Into<String>) -> Self {
        TelegramError {
            kind: TelegramErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            retry_after: None,
            source: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == TelegramErrorKind::Transient
    }

    /// The token was rejected. Nothing will work until it is fixed.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status_code, Some(401) | Some(404))
    }
}

/// Categorizes an API error code.
///
/// The Bot API answers 404 for an unknown token, so it is grouped with 401.
/// 409 means another poller holds the update stream, which may resolve once
/// a previous generation finishes shutting down.
pub fn categorize(status_code: u16) -> TelegramErrorKind {
    match status_code {
        409 | 429 => TelegramErrorKind::Transient,
        code if code >= 500 => TelegramErrorKind::Transient,
        _ => TelegramErrorKind::Permanent,
    }
}
