//! Chat command types.
//!
//! These commands are parsed from the text of Telegram messages.

use serde::{Deserialize, Serialize};

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Greeting: `/start`
    Start,

    /// Reports the caller's id: `/getid`
    GetId,

    /// Lists commands: `/help`
    Help,

    /// Reports keep-alive URL health: `/status`
    Status,

    /// Issues a restart token and stops the worker: `/stop`
    Stop,

    /// Writes a setting: `/set <key> <value>`
    ///
    /// `value` is everything after the key, so it may contain spaces.
    Set { key: String, value: String },

    /// `/set` without both a key and a value.
    SetUsage,

    /// Reads a setting: `/get <key>`
    Get { key: String },

    /// `/get` without a key.
    GetUsage,

    /// Any other slash command, holding the lowercased command name.
    Unknown(String),
}

impl Command {
    /// Whether the caller must pass the access gate.
    pub fn is_gated(&self) -> bool {
        !matches!(self, Command::Start | Command::GetId | Command::Unknown(_))
    }
}
