//! Health checks for the configured keep-alive URLs.
//!
//! The store set `alive` lists URLs the operator cares about. A probe fetches
//! all of them concurrently and reports one [`UrlStatus`] per URL; a URL that
//! errors never prevents the others from being reported.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::store::{self, KvStore, keys};

/// Per-request timeout for a single URL check.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// The result of checking one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Ok,
    BadStatus { status: u16 },
    Error { message: String },
}

/// One URL and how its check went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlStatus {
    pub url: String,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

impl UrlStatus {
    /// One line of the chat status report.
    pub fn render(&self) -> String {
        match &self.outcome {
            ProbeOutcome::Ok => format!("{} is ok", self.url),
            ProbeOutcome::BadStatus { status } => {
                format!("{} is error, status: {}", self.url, status)
            }
            ProbeOutcome::Error { message } => format!("{} is error: {}", self.url, message),
        }
    }
}

/// Renders a whole report for the chat channel.
pub fn render_report(statuses: &[UrlStatus]) -> String {
    if statuses.is_empty() {
        return "Keep alive urls have not been set".to_string();
    }
    statuses
        .iter()
        .map(UrlStatus::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Checks the configured URLs.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> store::Result<Vec<UrlStatus>>;
}

/// [`HealthProbe`] issuing GET requests with `reqwest`.
pub struct HttpHealthProbe {
    store: Arc<dyn KvStore>,
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new(store: Arc<dyn KvStore>, client: reqwest::Client) -> Self {
        HttpHealthProbe { store, client }
    }

    async fn check_url(&self, url: String) -> UrlStatus {
        let outcome = match self
            .client
            .get(&url)
            .timeout(DEFAULT_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => ProbeOutcome::Ok,
            Ok(response) => ProbeOutcome::BadStatus {
                status: response.status().as_u16(),
            },
            Err(e) => ProbeOutcome::Error {
                message: e.to_string(),
            },
        };
        debug!(url = %url, outcome = ?outcome, "Checked URL");
        UrlStatus { url, outcome }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> store::Result<Vec<UrlStatus>> {
        let urls = self.store.set_members(keys::ALIVE).await?;
        Ok(join_all(urls.into_iter().map(|url| self.check_url(url))).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn render_lines() {
        let report = render_report(&[
            UrlStatus {
                url: "https://a".into(),
                outcome: ProbeOutcome::Ok,
            },
            UrlStatus {
                url: "https://b".into(),
                outcome: ProbeOutcome::BadStatus { status: 502 },
            },
            UrlStatus {
                url: "https://c".into(),
                outcome: ProbeOutcome::Error {
                    message: "timed out".into(),
                },
            },
        ]);
        assert_eq!(
            report,
            "https://a is ok\nhttps://b is error, status: 502\nhttps://c is error: timed out"
        );
    }

    #[test]
    fn empty_report_says_unset() {
        assert_eq!(render_report(&[]), "Keep alive urls have not been set");
    }

    #[test]
    fn status_serializes_flat() {
        let json = serde_json::to_value(UrlStatus {
            url: "https://b".into(),
            outcome: ProbeOutcome::BadStatus { status: 503 },
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"url": "https://b", "result": "bad_status", "status": 503})
        );
    }

    #[tokio::test]
    async fn no_urls_means_no_requests() {
        let probe = HttpHealthProbe::new(Arc::new(MemoryStore::new()), reqwest::Client::new());
        assert!(probe.check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_url_is_reported_not_raised() {
        let store = Arc::new(MemoryStore::new());
        // Port 9 (discard) on localhost is expected to refuse connections.
        store
            .set_add(keys::ALIVE, &["http://127.0.0.1:9/".to_string()])
            .await
            .unwrap();
        let probe = HttpHealthProbe::new(store, reqwest::Client::new());

        let statuses = probe.check().await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert!(matches!(statuses[0].outcome, ProbeOutcome::Error { .. }));
    }
}
