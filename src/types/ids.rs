//! Newtype wrappers for domain identifiers.
//!
//! Telegram identifies users and chats with signed 64-bit integers. Wrapping
//! them keeps a chat id from being passed where a caller id is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identity of whoever sent a command (a Telegram user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub i64);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PrincipalId {
    fn from(n: i64) -> Self {
        PrincipalId(n)
    }
}

impl FromStr for PrincipalId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PrincipalId)
    }
}

/// A chat that replies are delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(n: i64) -> Self {
        ChatId(n)
    }
}

impl From<PrincipalId> for ChatId {
    /// Private chats share the user's id, which is how the admin is messaged.
    fn from(id: PrincipalId) -> Self {
        ChatId(id.0)
    }
}

/// A one-time credential authorizing a single restart.
///
/// Minted fresh for every stop request. The textual form is the hyphenated
/// UUID, which is what ends up in the store and in the restart link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestartToken(Uuid);

impl RestartToken {
    /// Mints a new random token.
    pub fn generate() -> Self {
        RestartToken(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if `presented` is the textual form of this token.
    pub fn matches(&self, presented: &str) -> bool {
        Uuid::parse_str(presented.trim()).is_ok_and(|u| u == self.0)
    }
}

impl fmt::Display for RestartToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RestartToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(RestartToken)
    }
}
