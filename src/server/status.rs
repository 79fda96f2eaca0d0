//! Status endpoint.
//!
//! Reports the worker's run state and the health of the configured keep-alive
//! URLs. A failing health probe degrades the report instead of failing it.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::warn;

use super::AppState;
use crate::probe::UrlStatus;
use crate::restart::RestartPhase;
use crate::supervisor::RunState;

/// JSON body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub state: RunState,
    pub running: bool,
    pub restart_in_progress: bool,
    pub restart_phase: RestartPhase,
    pub health: Vec<UrlStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_error: Option<String>,
}

/// Status handler.
///
/// # Example
///
/// ```ignore
/// GET /status HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {
///   "state": "running",
///   "running": true,
///   "restart_in_progress": false,
///   "restart_phase": "idle",
///   "health": [{"url": "https://a.example", "result": "ok"}]
/// }
/// ```
pub async fn status_handler(State(app_state): State<AppState>) -> Json<StatusReport> {
    let supervisor = app_state.supervisor();
    let coordinator = app_state.coordinator();

    let (health, health_error) = match app_state.probe().check().await {
        Ok(health) => (health, None),
        Err(e) => {
            warn!(error = %e, "Health probe failed");
            (Vec::new(), Some(e.to_string()))
        }
    };

    Json(StatusReport {
        state: supervisor.state(),
        running: supervisor.is_running(),
        restart_in_progress: coordinator.restart_in_progress(),
        restart_phase: coordinator.phase(),
        health,
        health_error,
    })
}
