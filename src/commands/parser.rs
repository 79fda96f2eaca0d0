//! Parser for slash commands in message text.
//!
//! A pure function from message text to an optional [`Command`].

use super::types::Command;

/// Parses a slash command from message text.
///
/// # Arguments
///
/// * `text` - The message text
/// * `bot_name` - The bot's username without the `@` prefix
///
/// # Parsing Rules
///
/// - The command must be the first thing in the message, starting with `/`
/// - Command names are case-insensitive
/// - `/cmd@bot_name` is accepted; `/cmd@other_bot` is not for us and yields `None`
/// - An empty `bot_name` accepts any `@` suffix
/// - Plain text (no leading `/`) yields `None`
///
/// # Examples
///
/// ```
/// use botkeeper::commands::{parse_command, Command};
///
/// assert_eq!(parse_command("/stop", "keeper_bot"), Some(Command::Stop));
/// assert_eq!(parse_command("/STATUS@keeper_bot", "keeper_bot"), Some(Command::Status));
/// assert_eq!(
///     parse_command("/get web", "keeper_bot"),
///     Some(Command::Get { key: "web".to_string() })
/// );
/// assert_eq!(parse_command("/stop@someone_else", "keeper_bot"), None);
/// assert_eq!(parse_command("hello", "keeper_bot"), None);
/// ```
pub fn parse_command(text: &str, bot_name: &str) -> Option<Command> {
    let text = text.trim_start();
    let text = text.strip_prefix('/')?;

    let (word, rest) = split_first_word(text);
    let name = match word.split_once('@') {
        Some((name, target)) => {
            if !bot_name.is_empty() && !target.eq_ignore_ascii_case(bot_name) {
                return None;
            }
            name
        }
        None => word,
    };
    if name.is_empty() {
        return None;
    }

    let command = match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "getid" => Command::GetId,
        "help" => Command::Help,
        "status" => Command::Status,
        "stop" => Command::Stop,
        "set" => parse_set(rest),
        "get" => parse_get(rest),
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

/// Parses `<key> <value>`, where the value runs to the end of the message.
fn parse_set(text: &str) -> Command {
    let (key, rest) = split_first_word(text.trim_start());
    let value = rest.trim();
    if key.is_empty() || value.is_empty() {
        return Command::SetUsage;
    }
    Command::Set {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Parses `<key>`; anything after the key is ignored.
fn parse_get(text: &str) -> Command {
    let (key, _) = split_first_word(text.trim_start());
    if key.is_empty() {
        return Command::GetUsage;
    }
    Command::Get {
        key: key.to_string(),
    }
}

/// Splits text at the first whitespace, returning (word, rest).
/// If no whitespace, returns (text, "").
fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    }
}
