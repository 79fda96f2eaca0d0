//! Chat commands.
//!
//! Operators talk to the bot with slash commands in Telegram messages.
//!
//! # Supported Commands
//!
//! - `/start`, `/getid` - open to everyone
//! - `/help`, `/status` - command list and keep-alive URL health
//! - `/stop` - issues a restart link and stops the worker
//! - `/set <key> <value>`, `/get <key>` - read and write settings
//!
//! Everything but `/start`, `/getid` and unknown commands requires the
//! caller to pass the access gate.
//!
//! # Example
//!
//! ```
//! use botkeeper::commands::{parse_command, Command};
//!
//! assert_eq!(parse_command("/getid", "keeper_bot"), Some(Command::GetId));
//! assert_eq!(
//!     parse_command("/set alive https://a;https://b", "keeper_bot"),
//!     Some(Command::Set { key: "alive".into(), value: "https://a;https://b".into() })
//! );
//! ```

mod handler;
mod parser;
mod types;

pub use handler::{CommandHandler, GREETING, HELP_TEXT, STOP_WITHOUT_URL, UNKNOWN_COMMAND};
pub use parser::parse_command;
pub use types::Command;
