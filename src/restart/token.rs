//! One-time restart tokens.
//!
//! There is exactly one token slot in the store. Issuing overwrites it, so a
//! freshly issued token invalidates whatever was issued before. Consuming is a
//! compare-and-delete: it only removes the slot if it still holds the value
//! that was validated, so a token issued concurrently survives.

use std::sync::Arc;

use tracing::{debug, info};

use super::RestartError;
use crate::store::{self, KvStore, keys};
use crate::types::RestartToken;

/// A token together with the base URL it should be presented against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: RestartToken,
    pub base_url: String,
}

impl IssuedToken {
    /// The link an operator follows to trigger the restart.
    pub fn restart_url(&self) -> String {
        format!(
            "{}/restart?token={}",
            self.base_url.trim_end_matches('/'),
            self.token
        )
    }
}

/// Mints, reads and consumes the single outstanding restart token.
pub struct TokenIssuer {
    store: Arc<dyn KvStore>,
    fallback_base_url: Option<String>,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn KvStore>, fallback_base_url: Option<String>) -> Self {
        TokenIssuer {
            store,
            fallback_base_url,
        }
    }

    /// The stored deploy URL, or the configured fallback.
    pub async fn base_url(&self) -> store::Result<Option<String>> {
        let stored = self
            .store
            .get(keys::DEPLOY_URL)
            .await?
            .filter(|u| !u.trim().is_empty());
        Ok(stored.or_else(|| self.fallback_base_url.clone()))
    }

    /// Mints a new token, replacing any outstanding one.
    ///
    /// Fails with [`RestartError::BaseUrlUnset`] before minting if there is
    /// no URL to build a restart link from.
    pub async fn issue(&self) -> Result<IssuedToken, RestartError> {
        let base_url = self.base_url().await?.ok_or(RestartError::BaseUrlUnset)?;
        let token = RestartToken::generate();
        self.store
            .set(keys::RESTART_TOKEN, &token.to_string())
            .await?;
        info!("Issued restart token");
        Ok(IssuedToken { token, base_url })
    }

    /// Returns the stored token text, if any.
    pub async fn current(&self) -> store::Result<Option<String>> {
        self.store.get(keys::RESTART_TOKEN).await
    }

    /// Returns the stored token text if `presented` matches it.
    pub async fn check(&self, presented: &str) -> store::Result<Option<String>> {
        let Some(stored) = self.current().await? else {
            debug!("No restart token outstanding");
            return Ok(None);
        };
        Ok(token_matches(&stored, presented).then_some(stored))
    }

    /// Deletes the stored token if it is still `stored`.
    pub async fn consume(&self, stored: &str) -> store::Result<bool> {
        self.store
            .compare_and_delete(keys::RESTART_TOKEN, stored)
            .await
    }
}

/// Compares a stored token against a presented one.
///
/// Both sides are parsed as UUIDs when possible so that case and surrounding
/// whitespace do not matter; anything else must match exactly.
fn token_matches(stored: &str, presented: &str) -> bool {
    match stored.parse::<RestartToken>() {
        Ok(token) => token.matches(presented),
        Err(_) => !stored.is_empty() && stored == presented,
    }
}
