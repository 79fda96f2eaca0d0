//! Turns parsed commands into replies.
//!
//! [`CommandHandler`] is the worker's [`Dispatch`] implementation. Gated
//! commands are checked against the [`AccessGate`] before anything else runs,
//! so a denied caller gets the fixed denial text and nothing changes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use super::parser::parse_command;
use super::types::Command;
use crate::access::AccessGate;
use crate::probe::{HealthProbe, render_report};
use crate::restart::{RestartError, TokenIssuer};
use crate::settings::{Settings, SettingsError};
use crate::worker::{Dispatch, DispatchOutcome, Update};

/// Reply to `/start`.
pub const GREETING: &str = "I'm a bot, please talk to me!";

/// Reply to an unrecognized slash command.
pub const UNKNOWN_COMMAND: &str = "Sorry, I didn't understand that command.";

/// Reply to `/stop` when no restart link can be built.
pub const STOP_WITHOUT_URL: &str = "Cannot stop bot - web url has not been set";

/// Reply to `/help`.
pub const HELP_TEXT: &str = "\
Available commands:
/start - Start the bot
/status - Get web status
/stop - Stop the bot
/getid - Get your Telegram ID
/set <key> <value> - Set configuration
    Keys => page, user, cf_node, alive, path, web
    page: web page => name-content  /  name-url
    user: grant access => user_id
    cf_node: cf node url => url;url
    alive: keep web alive => url;url
    path: subscription path => cf-aaa;container-bbb
    web: deploy url => url
/get <key> - Get configuration
    Keys: all, page, user, cf_node, alive, path, web";

/// Handles chat commands for the worker.
pub struct CommandHandler {
    bot_name: String,
    gate: AccessGate,
    issuer: Arc<TokenIssuer>,
    settings: Settings,
    probe: Arc<dyn HealthProbe>,
}

impl CommandHandler {
    pub fn new(
        bot_name: impl Into<String>,
        gate: AccessGate,
        issuer: Arc<TokenIssuer>,
        settings: Settings,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        CommandHandler {
            bot_name: bot_name.into(),
            gate,
            issuer,
            settings,
            probe,
        }
    }

    async fn handle(&self, command: Command, update: &Update) -> DispatchOutcome {
        let chat = update.chat;
        match command {
            Command::Start => DispatchOutcome::reply(chat, GREETING),
            Command::GetId => {
                DispatchOutcome::reply(chat, format!("Your Telegram ID is: {}", update.caller))
            }
            Command::Help => DispatchOutcome::reply(chat, HELP_TEXT),
            Command::Unknown(name) => {
                info!(command = %name, "Unknown command");
                DispatchOutcome::reply(chat, UNKNOWN_COMMAND)
            }
            Command::Status => {
                let text = match self.probe.check().await {
                    Ok(statuses) => render_report(&statuses),
                    Err(e) => {
                        error!(error = %e, "Failed to get web status");
                        format!("Failed to get web status: {}", e)
                    }
                };
                DispatchOutcome::reply(chat, text)
            }
            Command::Stop => self.stop(update).await,
            Command::SetUsage => DispatchOutcome::reply(chat, "Input format: /set <key> <value>"),
            Command::GetUsage => DispatchOutcome::reply(chat, "Input format: /get <key>"),
            Command::Set { key, value } => {
                let text = match self.settings.set(&key, &value).await {
                    Ok(key) => format!("Successfully set {}", key),
                    Err(e @ SettingsError::UnknownKey(_)) => e.to_string(),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to set");
                        format!("Error setting {}: {}", key, e)
                    }
                };
                DispatchOutcome::reply(chat, text)
            }
            Command::Get { key } => {
                let text = match self.settings.get(&key).await {
                    Ok(text) => text,
                    Err(e @ SettingsError::UnknownKey(_)) => e.to_string(),
                    Err(e) => {
                        error!(key = %key, error = %e, "Failed to get");
                        format!("Error getting {}: {}", key, e)
                    }
                };
                DispatchOutcome::reply(chat, text)
            }
        }
    }

    /// Issues a restart token, shows the link, and asks the worker to stop.
    async fn stop(&self, update: &Update) -> DispatchOutcome {
        match self.issuer.issue().await {
            Ok(issued) => {
                info!(caller = %update.caller, "Stop command received, initiating shutdown");
                DispatchOutcome::reply(
                    update.chat,
                    format!(
                        "Shutting down the bot...\nRestart url: {}",
                        issued.restart_url()
                    ),
                )
                .and_stop()
            }
            Err(RestartError::BaseUrlUnset) => {
                warn!("Cannot stop bot - web url has not been set");
                DispatchOutcome::reply(update.chat, STOP_WITHOUT_URL)
            }
            Err(e) => {
                error!(error = %e, "Failed to issue restart token");
                DispatchOutcome::reply(update.chat, format!("Cannot stop bot - {}", e))
            }
        }
    }
}

#[async_trait]
impl Dispatch for CommandHandler {
    #[instrument(skip_all, fields(update_id = update.update_id))]
    async fn dispatch(&self, update: &Update) -> DispatchOutcome {
        let Some(command) = parse_command(&update.text, &self.bot_name) else {
            if update.text.trim_start().starts_with('/') {
                // Addressed to another bot.
                return DispatchOutcome::silent();
            }
            return DispatchOutcome::reply(update.chat, update.text.clone());
        };

        if command.is_gated()
            && let Err(denied) = self.gate.check(update.caller).await
        {
            return DispatchOutcome::reply(update.chat, denied.to_string());
        }

        self.handle(command, update).await
    }
}
