//! Operator-editable settings behind `/set` and `/get`.
//!
//! | Key | Stored as | `/set` value |
//! |---|---|---|
//! | `page` | hash `page` | `name-content` or `name-https://url` |
//! | `user` | set `user` | `id` or `id;id` |
//! | `cf_node` | set `cf_node` | `node;node` |
//! | `alive` | set `alive` | `url;url` |
//! | `path` | hash `path` | `key-value;key-value` |
//! | `web` | string `deploy_url` | `https://url` |
//!
//! Malformed values are rejected before anything is written.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::access::AccessPolicy;
use crate::store::{KvStore, StoreError, keys};
use crate::types::PrincipalId;

/// A settable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Page,
    User,
    CfNode,
    Alive,
    Path,
    Web,
}

impl SettingKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::Page => "page",
            SettingKey::User => "user",
            SettingKey::CfNode => "cf_node",
            SettingKey::Alive => "alive",
            SettingKey::Path => "path",
            SettingKey::Web => "web",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(SettingKey::Page),
            "user" => Ok(SettingKey::User),
            "cf_node" => Ok(SettingKey::CfNode),
            "alive" => Ok(SettingKey::Alive),
            "path" => Ok(SettingKey::Path),
            "web" => Ok(SettingKey::Web),
            other => Err(SettingsError::UnknownKey(other.to_string())),
        }
    }
}

/// Errors from reading or writing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("{0}")]
    Invalid(String),

    #[error("failed to fetch page content: {0}")]
    Fetch(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Fetches page content when a page is set from a URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, String>;
}

/// [`PageFetcher`] over `reqwest`.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        HttpPageFetcher { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        response.text().await.map_err(|e| e.to_string())
    }
}

/// Reads and writes the settings table.
pub struct Settings {
    store: Arc<dyn KvStore>,
    access: Arc<dyn AccessPolicy>,
    pages: Arc<dyn PageFetcher>,
}

impl Settings {
    pub fn new(
        store: Arc<dyn KvStore>,
        access: Arc<dyn AccessPolicy>,
        pages: Arc<dyn PageFetcher>,
    ) -> Self {
        Settings {
            store,
            access,
            pages,
        }
    }

    /// Writes `value` under `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<SettingKey, SettingsError> {
        let key: SettingKey = key.parse()?;
        let value = value.trim();
        match key {
            SettingKey::Page => {
                let (name, content) = split_pair(value)
                    .ok_or_else(|| SettingsError::Invalid("Data must be in format 'name-content'".into()))?;
                let content = if is_http_url(content) {
                    debug!(url = content, "Fetching page content");
                    self.pages.fetch(content).await.map_err(SettingsError::Fetch)?
                } else {
                    content.to_string()
                };
                self.store
                    .hash_set(keys::PAGE, &[(name.to_string(), content)])
                    .await?;
            }
            SettingKey::User => {
                let ids = split_list(value)
                    .into_iter()
                    .map(|s| {
                        s.parse::<PrincipalId>()
                            .map_err(|_| SettingsError::Invalid(format!("invalid user id: {}", s)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if ids.is_empty() {
                    return Err(SettingsError::Invalid("no user id given".into()));
                }
                self.access.grant(&ids).await?;
            }
            SettingKey::CfNode | SettingKey::Alive => {
                let items: Vec<String> = split_list(value).into_iter().map(String::from).collect();
                if items.is_empty() {
                    return Err(SettingsError::Invalid("no values given".into()));
                }
                let store_key = if key == SettingKey::Alive {
                    keys::ALIVE
                } else {
                    keys::CF_NODE
                };
                self.store.set_add(store_key, &items).await?;
            }
            SettingKey::Path => {
                let entries = split_list(value)
                    .into_iter()
                    .map(|item| {
                        split_pair(item)
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .ok_or_else(|| {
                                SettingsError::Invalid(format!(
                                    "path entry {:?} must be key-value",
                                    item
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if entries.is_empty() {
                    return Err(SettingsError::Invalid("no path entries given".into()));
                }
                self.store.hash_set(keys::PATH, &entries).await?;
            }
            SettingKey::Web => {
                if !is_http_url(value) {
                    return Err(SettingsError::Invalid(
                        "web url must start with http:// or https://".into(),
                    ));
                }
                self.store
                    .set(keys::DEPLOY_URL, value.trim_end_matches('/'))
                    .await?;
            }
        }
        info!(key = %key, "Setting updated");
        Ok(key)
    }

    /// Renders the value of `key`, or of every key for `all`.
    pub async fn get(&self, key: &str) -> Result<String, SettingsError> {
        if key == "all" {
            return Ok([
                self.render(SettingKey::User).await?,
                self.render(SettingKey::CfNode).await?,
                self.render(SettingKey::Path).await?,
                self.render(SettingKey::Alive).await?,
                self.render(SettingKey::Web).await?,
            ]
            .join("\n"));
        }
        self.render(key.parse()?).await
    }

    async fn render(&self, key: SettingKey) -> Result<String, SettingsError> {
        let text = match key {
            SettingKey::Page => {
                let names: Vec<String> = self.store.hash_get_all(keys::PAGE).await?.into_keys().collect();
                format!("pages: {}", names.join(";"))
            }
            SettingKey::User => {
                let users: Vec<String> = self.store.set_members(keys::USER).await?.into_iter().collect();
                format!("user: {}", users.join(";"))
            }
            SettingKey::CfNode => {
                let nodes: Vec<String> = self.store.set_members(keys::CF_NODE).await?.into_iter().collect();
                format!("cf_node: [\n{}\n]", nodes.join("\n"))
            }
            SettingKey::Alive => {
                let urls: Vec<String> = self.store.set_members(keys::ALIVE).await?.into_iter().collect();
                if urls.is_empty() {
                    "alive url is not set".to_string()
                } else {
                    format!("alive: [\n{}\n]", urls.join("\n"))
                }
            }
            SettingKey::Path => {
                let lines: Vec<String> = self
                    .store
                    .hash_get_all(keys::PATH)
                    .await?
                    .into_iter()
                    .map(|(k, v)| format!("{}=>{}", k, v))
                    .collect();
                format!("path: [\n{}\n]", lines.join("\n"))
            }
            SettingKey::Web => match self.store.get(keys::DEPLOY_URL).await? {
                Some(url) => format!("web: {}", url),
                None => "web: not set".to_string(),
            },
        };
        Ok(text)
    }
}

/// Splits `a;b;c`, trimming and dropping empty items.
fn split_list(value: &str) -> Vec<&str> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits `key-value` at the first dash. Both sides must be non-empty.
fn split_pair(value: &str) -> Option<(&str, &str)> {
    let (key, rest) = value.split_once('-')?;
    let (key, rest) = (key.trim(), rest.trim());
    (!key.is_empty() && !rest.is_empty()).then_some((key, rest))
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::StoreAccessPolicy;
    use crate::store::MemoryStore;

    struct FixedFetcher;

    #[async_trait]
    impl PageFetcher for FixedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, String> {
            if url.contains("broken") {
                Err("404 Not Found".into())
            } else {
                Ok(format!("<p>from {}</p>", url))
            }
        }
    }

    fn settings() -> (Settings, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let access = Arc::new(StoreAccessPolicy::new(store.clone(), None));
        (
            Settings::new(store.clone(), access, Arc::new(FixedFetcher)),
            store,
        )
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let (settings, _) = settings();
        let err = settings.set("color", "blue").await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown key: color");
        assert_eq!(
            settings.get("color").await.unwrap_err().to_string(),
            "Unknown key: color"
        );
    }

    #[tokio::test]
    async fn web_sets_deploy_url() {
        let (settings, store) = settings();
        settings.set("web", "https://bot.example/").await.unwrap();
        assert_eq!(
            store.get(keys::DEPLOY_URL).await.unwrap().as_deref(),
            Some("https://bot.example")
        );
        assert_eq!(settings.get("web").await.unwrap(), "web: https://bot.example");
    }

    #[tokio::test]
    async fn web_requires_http_scheme() {
        let (settings, store) = settings();
        assert!(matches!(
            settings.set("web", "ftp://nope").await,
            Err(SettingsError::Invalid(_))
        ));
        assert_eq!(store.get(keys::DEPLOY_URL).await.unwrap(), None);
    }

    #[tokio::test]
    async fn alive_and_cf_node_split_on_semicolons() {
        let (settings, store) = settings();
        settings.set("alive", "https://a; https://b;").await.unwrap();
        settings.set("cf_node", "n1;n2").await.unwrap();

        assert_eq!(store.set_members(keys::ALIVE).await.unwrap().len(), 2);
        assert_eq!(
            settings.get("alive").await.unwrap(),
            "alive: [\nhttps://a\nhttps://b\n]"
        );
        assert_eq!(settings.get("cf_node").await.unwrap(), "cf_node: [\nn1\nn2\n]");
    }

    #[tokio::test]
    async fn user_grants_access() {
        let (settings, store) = settings();
        settings.set("user", "42;43").await.unwrap();
        assert!(store.is_member(keys::USER, "42").await.unwrap());
        assert_eq!(settings.get("user").await.unwrap(), "user: 42;43");
    }

    #[tokio::test]
    async fn user_rejects_non_numeric_without_writing() {
        let (settings, store) = settings();
        assert!(matches!(
            settings.set("user", "42;bob").await,
            Err(SettingsError::Invalid(_))
        ));
        assert!(store.set_members(keys::USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_entries_parse() {
        let (settings, _) = settings();
        settings.set("path", "cf-aaa;container-bbb-ccc").await.unwrap();
        assert_eq!(
            settings.get("path").await.unwrap(),
            "path: [\ncf=>aaa\ncontainer=>bbb-ccc\n]"
        );
        assert!(matches!(
            settings.set("path", "nodash").await,
            Err(SettingsError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn page_inline_and_fetched() {
        let (settings, store) = settings();
        settings.set("page", "home-<h1>Hi</h1>").await.unwrap();
        settings.set("page", "remote-https://pages.example/x").await.unwrap();

        let pages = store.hash_get_all(keys::PAGE).await.unwrap();
        assert_eq!(pages["home"], "<h1>Hi</h1>");
        assert_eq!(pages["remote"], "<p>from https://pages.example/x</p>");
        assert_eq!(settings.get("page").await.unwrap(), "pages: home;remote");
    }

    #[tokio::test]
    async fn page_fetch_failure_writes_nothing() {
        let (settings, store) = settings();
        assert!(matches!(
            settings.set("page", "bad-https://broken.example").await,
            Err(SettingsError::Fetch(_))
        ));
        assert!(store.hash_get_all(keys::PAGE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_all_lists_every_section() {
        let (settings, _) = settings();
        settings.set("web", "https://bot.example").await.unwrap();
        let all = settings.get("all").await.unwrap();
        assert!(all.starts_with("user: "));
        assert!(all.contains("cf_node: ["));
        assert!(all.contains("path: ["));
        assert!(all.contains("alive url is not set"));
        assert!(all.ends_with("web: https://bot.example"));
    }
}
