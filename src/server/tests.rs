//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::*;
use crate::config::LifecycleConfig;
use crate::probe::{ProbeOutcome, UrlStatus};
use crate::restart::{RestartPhase, TokenIssuer};
use crate::store::{self, MemoryStore, keys};
use crate::supervisor::RunState;
use crate::test_utils::{EchoDispatch, InitBehavior, RecordingNotifier, ScriptedFactory};

struct StaticProbe(Vec<UrlStatus>);

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn check(&self) -> store::Result<Vec<UrlStatus>> {
        Ok(self.0.clone())
    }
}

struct Fixture {
    state: AppState,
    store: Arc<MemoryStore>,
    factory: Arc<ScriptedFactory>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let factory = ScriptedFactory::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let supervisor = Supervisor::new(
            factory.clone(),
            Arc::new(EchoDispatch),
            notifier.clone(),
            LifecycleConfig {
                stop_timeout: Duration::from_secs(1),
                startup_timeout: Duration::from_secs(1),
            },
        );
        let issuer = Arc::new(TokenIssuer::new(
            store.clone(),
            Some("https://bot.example".to_string()),
        ));
        let coordinator = Arc::new(RestartCoordinator::new(issuer, supervisor, notifier));
        let probe = Arc::new(StaticProbe(vec![UrlStatus {
            url: "https://a.example".into(),
            outcome: ProbeOutcome::Ok,
        }]));
        Fixture {
            state: AppState::new(coordinator, store.clone(), probe),
            store,
            factory,
        }
    }

    async fn send(&self, method: &str, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.send("GET", uri).await
    }

    async fn issue(&self) -> String {
        self.state
            .coordinator()
            .issue_token()
            .await
            .unwrap()
            .token
            .to_string()
    }
}

// ─── Health endpoint tests ───

#[tokio::test]
async fn health_returns_200() {
    let f = Fixture::new();
    assert_eq!(f.get("/health").await, (StatusCode::OK, "OK".to_string()));
}

// ─── Restart endpoint tests ───

#[tokio::test]
async fn restart_without_token_is_forbidden() {
    let f = Fixture::new();
    f.issue().await;
    let (status, body) = f.get("/restart").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Invalid restart token");
    assert_eq!(f.factory.created(), 0);
}

#[tokio::test]
async fn restart_with_wrong_token_is_forbidden() {
    let f = Fixture::new();
    f.state.supervisor().start().await.unwrap();
    f.issue().await;

    let (status, _) = f.get("/restart?token=nope").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(f.factory.created(), 1);
    assert_eq!(f.state.supervisor().state(), RunState::Running);
}

#[tokio::test]
async fn restart_with_valid_token_restarts_once() {
    let f = Fixture::new();
    f.state.supervisor().start().await.unwrap();
    let token = f.issue().await;

    let (status, body) = f.get(&format!("/restart?token={}", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Bot restarted successfully");
    assert_eq!(f.factory.created(), 2);
    assert!(f.state.supervisor().is_running());

    // Single use.
    let (status, _) = f.get(&format!("/restart?token={}", token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn restart_accepts_uuid_parameter() {
    let f = Fixture::new();
    let token = f.issue().await;
    let (status, _) = f.get(&format!("/restart?uuid={}", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(f.state.supervisor().is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_restart_is_a_bad_request() {
    let f = Fixture::new();
    f.factory.set_teardown_delay(Duration::from_millis(300));
    f.state.supervisor().start().await.unwrap();
    let token = f.issue().await;

    let first = {
        let app = build_router(f.state.clone());
        let uri = format!("/restart?token={}", token);
        tokio::spawn(async move {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            app.oneshot(request).await.unwrap().status()
        })
    };
    let mut phase = f.state.coordinator().watch_phase();
    tokio::time::timeout(
        Duration::from_secs(2),
        phase.wait_for(|p| *p == RestartPhase::Stopping),
    )
    .await
    .unwrap()
    .unwrap();

    let (status, body) = f.get(&format!("/restart?token={}", token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Restart already in progress");

    assert_eq!(first.await.unwrap(), StatusCode::OK);
    assert_eq!(f.factory.created(), 2);
}

#[tokio::test]
async fn failed_restart_is_a_server_error() {
    let f = Fixture::new();
    f.factory.script_init([InitBehavior::Fail("api down".into())]);
    let token = f.issue().await;

    let (status, body) = f.get(&format!("/restart?token={}", token)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.starts_with("Failed to restart: "), "{}", body);
    assert!(body.contains("api down"), "{}", body);
    assert_eq!(f.state.supervisor().state(), RunState::Stopped);
}

// ─── Status endpoint tests ───

#[tokio::test]
async fn status_reports_state_and_health() {
    let f = Fixture::new();
    f.state.supervisor().start().await.unwrap();

    let (status, body) = f.get("/status").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json,
        json!({
            "state": "running",
            "running": true,
            "restart_in_progress": false,
            "restart_phase": "idle",
            "health": [{"url": "https://a.example", "result": "ok"}]
        })
    );
}

#[tokio::test]
async fn status_when_stopped() {
    let f = Fixture::new();
    let (_, body) = f.get("/status").await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["state"], "stopped");
    assert_eq!(json["running"], false);
}

// ─── Page endpoint tests ───

#[tokio::test]
async fn named_page_is_served() {
    let f = Fixture::new();
    f.store
        .hash_set(keys::PAGE, &[("home".into(), "<h1>hi</h1>".into())])
        .await
        .unwrap();

    let (status, body) = f.get("/?name=home").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>hi</h1>");

    let (status, body) = f.get("/?name=missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Page not found");
}

#[tokio::test]
async fn random_page_comes_from_the_store() {
    let f = Fixture::new();
    let (status, body) = f.get("/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "No pages available");

    f.store
        .hash_set(
            keys::PAGE,
            &[("a".into(), "page a".into()), ("b".into(), "page b".into())],
        )
        .await
        .unwrap();
    for _ in 0..5 {
        let (status, body) = f.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body == "page a" || body == "page b");
    }
}

#[tokio::test]
async fn page_list_is_json() {
    let f = Fixture::new();
    f.store
        .hash_set(keys::PAGE, &[("home".into(), "x".into())])
        .await
        .unwrap();
    let (_, body) = f.get("/page").await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json, json!({"status": "success", "result": {"home": "x"}}));
}

// ─── Node endpoint tests ───

#[tokio::test]
async fn node_table_crud() {
    let f = Fixture::new();

    let (status, body) = f.send("POST", "/node?name=edge&node=1.2.3.4").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["result"], json!({"edge": "1.2.3.4"}));

    f.send("PUT", "/node?name=edge&node=5.6.7.8").await;
    let (_, body) = f.get("/node").await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json, json!({"status": "success", "result": {"edge": "5.6.7.8"}}));

    let (_, body) = f.send("DELETE", "/node?name=edge").await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["result"], 1);

    let (_, body) = f.get("/node").await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["result"], json!({}));
}

#[tokio::test]
async fn node_upsert_requires_both_fields() {
    let f = Fixture::new();
    let (status, _) = f.send("POST", "/node?name=edge").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
