//! Restart endpoint.
//!
//! The operator follows the link shown by the `/stop` command. The token
//! travels as a query parameter; `uuid` is accepted as an alias so links
//! rendered by older deployments keep working.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::AppState;
use crate::restart::RestartError;

#[derive(Debug, Default, Deserialize)]
pub struct RestartQuery {
    #[serde(alias = "uuid")]
    pub token: Option<String>,
}

impl IntoResponse for RestartError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RestartError::Unauthorized => {
                (StatusCode::FORBIDDEN, "Invalid restart token".to_string())
            }
            RestartError::Conflict => (
                StatusCode::BAD_REQUEST,
                "Restart already in progress".to_string(),
            ),
            RestartError::RestartFailed { .. }
            | RestartError::BaseUrlUnset
            | RestartError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to restart: {}", self),
            ),
        };
        (status, message).into_response()
    }
}

/// Restart handler.
///
/// # Response
///
/// - 200 OK: the worker was stopped (if running) and started again
/// - 403 Forbidden: the token is missing, wrong, or already used
/// - 400 Bad Request: another restart holds the lock
/// - 500 Internal Server Error: stop or start failed
///
/// The restart runs in its own task so that a client hanging up cannot
/// cancel it between the stop and the start.
pub async fn restart_handler(
    State(app_state): State<AppState>,
    Query(query): Query<RestartQuery>,
) -> Response {
    let token = query.token.unwrap_or_default();
    let coordinator = app_state.coordinator().clone();
    let outcome = tokio::spawn(async move { coordinator.request_restart(&token).await }).await;

    match outcome {
        Ok(Ok(report)) => {
            info!(stopped = ?report.stopped, started = ?report.started, "Bot restarted");
            (StatusCode::OK, "Bot restarted successfully").into_response()
        }
        Ok(Err(e)) => {
            match &e {
                RestartError::Unauthorized => warn!("Restart rejected: invalid token"),
                RestartError::Conflict => warn!("Restart rejected: already in progress"),
                _ => error!(error = %e, "Restart failed"),
            }
            e.into_response()
        }
        Err(join_error) => {
            error!(error = %join_error, "Restart task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to restart: {}", join_error),
            )
                .into_response()
        }
    }
}
