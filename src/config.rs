//! Process configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `TELEGRAM_BOT_TOKEN` | required |
//! | `TELEGRAM_BOT_USERNAME` | unset (accept any `@` suffix) |
//! | `ADMIN_ID` | unset |
//! | `WEB_HOST` / `WEB_PORT` | `0.0.0.0` / `8000` |
//! | `BOTKEEPER_BASE_URL` | unset |
//! | `BOTKEEPER_STORE_PATH` | `botkeeper-state.json` |
//! | `BOTKEEPER_STOP_TIMEOUT_SECS` | `5` |
//! | `BOTKEEPER_STARTUP_TIMEOUT_SECS` | `30` |
//! | `BOTKEEPER_POLL_TIMEOUT_SECS` | `30` |
//! | `INTERVAL_TIME` | `60` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::types::PrincipalId;

/// Default HTTP port.
const DEFAULT_WEB_PORT: u16 = 8000;

/// Default bounded wait for a worker to exit after cancellation.
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

/// Default bounded wait for a worker to finish initializing.
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;

/// Default long-poll timeout for fetching updates.
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Default interval between keep-alive pings.
const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 60;

/// Longest accepted interval or timeout, in seconds.
const MAX_DURATION_SECS: u64 = 86_400;

/// Default location of the durable store.
const DEFAULT_STORE_PATH: &str = "botkeeper-state.json";

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Lifecycle timeouts used by the supervisor and worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// How long `stop()` waits for the worker to exit before giving up.
    ///
    /// Default: 5 seconds. Configure via `BOTKEEPER_STOP_TIMEOUT_SECS`.
    pub stop_timeout: Duration,

    /// How long `start()` waits for the worker to report initialization.
    ///
    /// Default: 30 seconds. Configure via `BOTKEEPER_STARTUP_TIMEOUT_SECS`.
    pub startup_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
            startup_timeout: Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS),
        }
    }
}

/// Everything the binary needs to wire itself up.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// Bot username used to filter `/cmd@name` commands. Empty accepts all.
    pub bot_username: String,
    pub admin_id: Option<PrincipalId>,
    pub bind_addr: SocketAddr,
    /// Fallback for restart links when no deploy URL is stored.
    pub base_url: Option<String>,
    pub store_path: PathBuf,
    pub lifecycle: LifecycleConfig,
    pub poll_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let bot_username = get("TELEGRAM_BOT_USERNAME")
            .map(|name| name.trim().trim_start_matches('@').to_string())
            .unwrap_or_default();
        let admin_id = parse_opt::<PrincipalId>(&get, "ADMIN_ID")?;
        let host = parse_opt::<IpAddr>(&get, "WEB_HOST")?
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = parse_opt::<u16>(&get, "WEB_PORT")?.unwrap_or(DEFAULT_WEB_PORT);

        let base_url = get("BOTKEEPER_BASE_URL").map(|u| u.trim_end_matches('/').to_string());
        let store_path = get("BOTKEEPER_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

        // Zero would spin (or panic in `interval`); huge values overflow `Instant`.
        let secs = |var: &'static str, default: u64| -> Result<Duration, ConfigError> {
            let secs = parse_opt::<u64>(&get, var)?.unwrap_or(default);
            if !(1..=MAX_DURATION_SECS).contains(&secs) {
                return Err(ConfigError::Invalid {
                    var,
                    value: secs.to_string(),
                });
            }
            Ok(Duration::from_secs(secs))
        };

        Ok(Config {
            bot_token,
            bot_username,
            admin_id,
            bind_addr: SocketAddr::new(host, port),
            base_url,
            store_path,
            lifecycle: LifecycleConfig {
                stop_timeout: secs("BOTKEEPER_STOP_TIMEOUT_SECS", DEFAULT_STOP_TIMEOUT_SECS)?,
                startup_timeout: secs(
                    "BOTKEEPER_STARTUP_TIMEOUT_SECS",
                    DEFAULT_STARTUP_TIMEOUT_SECS,
                )?,
            },
            poll_timeout: secs("BOTKEEPER_POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT_SECS)?,
            keepalive_interval: secs("INTERVAL_TIME", DEFAULT_KEEPALIVE_INTERVAL_SECS)?,
        })
    }
}

fn parse_opt<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match get(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "123:abc")])).unwrap();

        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.bot_username, "");
        assert_eq!(config.admin_id, None);
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.base_url, None);
        assert_eq!(config.store_path, PathBuf::from("botkeeper-state.json"));
        assert_eq!(config.lifecycle, LifecycleConfig::default());
        assert_eq!(config.lifecycle.stop_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_timeout, Duration::from_secs(30));
        assert_eq!(config.keepalive_interval, Duration::from_secs(60));
    }

    #[test]
    fn missing_token_is_an_error() {
        assert_eq!(
            Config::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("TELEGRAM_BOT_TOKEN")
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        let err = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_BOT_USERNAME", "@keeper_bot"),
            ("ADMIN_ID", "42"),
            ("WEB_HOST", "127.0.0.1"),
            ("WEB_PORT", "9000"),
            ("BOTKEEPER_BASE_URL", "https://bot.example/"),
            ("BOTKEEPER_STOP_TIMEOUT_SECS", "2"),
            ("INTERVAL_TIME", "15"),
        ]))
        .unwrap();

        assert_eq!(config.bot_username, "keeper_bot");
        assert_eq!(config.admin_id, Some(PrincipalId(42)));
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.base_url.as_deref(), Some("https://bot.example"));
        assert_eq!(config.lifecycle.stop_timeout, Duration::from_secs(2));
        assert_eq!(config.keepalive_interval, Duration::from_secs(15));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("INTERVAL_TIME", "0"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "INTERVAL_TIME",
                value: "0".to_string()
            }
        );
    }

    #[test]
    fn out_of_range_timeouts_are_rejected() {
        for var in [
            "BOTKEEPER_POLL_TIMEOUT_SECS",
            "BOTKEEPER_STOP_TIMEOUT_SECS",
            "BOTKEEPER_STARTUP_TIMEOUT_SECS",
        ] {
            let err = Config::from_lookup(lookup(&[
                ("TELEGRAM_BOT_TOKEN", "t"),
                (var, "18446744073709551615"),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { var: v, .. } if v == var));
        }
    }

    #[test]
    fn unparseable_port_is_reported() {
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("WEB_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "WEB_PORT",
                value: "eighty".to_string()
            }
        );
    }
}
