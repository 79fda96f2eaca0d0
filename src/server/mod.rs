//! HTTP control surface.
//!
//! # Endpoints
//!
//! - `GET /restart?token=<value>` - Restarts the worker with a one-time token
//!   (200, 403 on a bad token, 400 while another restart runs, 500 on failure)
//! - `GET /status` - Run state, restart phase and keep-alive URL health as JSON
//! - `GET /health` - Returns 200 if the server is running
//! - `GET /?name=<page>` - Serves a stored page, or a random one
//! - `GET /page` - Lists stored pages as JSON
//! - `GET|POST|PUT|DELETE /node` - Manages the node table

use std::sync::Arc;

pub mod health;
pub mod keepalive;
pub mod nodes;
pub mod pages;
pub mod restart;
pub mod status;

pub use health::health_handler;
pub use keepalive::{local_health_url, run_keepalive};
pub use nodes::{delete_node_handler, list_nodes_handler, upsert_node_handler};
pub use pages::{index_handler, list_pages_handler};
pub use restart::restart_handler;
pub use status::status_handler;

use crate::probe::HealthProbe;
use crate::restart::RestartCoordinator;
use crate::store::KvStore;
use crate::supervisor::Supervisor;

/// Shared application state.
///
/// Passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    coordinator: Arc<RestartCoordinator>,
    store: Arc<dyn KvStore>,
    probe: Arc<dyn HealthProbe>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<RestartCoordinator>,
        store: Arc<dyn KvStore>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                coordinator,
                store,
                probe,
            }),
        }
    }

    pub fn coordinator(&self) -> &Arc<RestartCoordinator> {
        &self.inner.coordinator
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        self.inner.coordinator.supervisor()
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.inner.store
    }

    pub fn probe(&self) -> &Arc<dyn HealthProbe> {
        &self.inner.probe
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/", get(index_handler))
        .route("/restart", get(restart_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/page", get(list_pages_handler))
        .route(
            "/node",
            get(list_nodes_handler)
                .post(upsert_node_handler)
                .put(upsert_node_handler)
                .delete(delete_node_handler),
        )
        .with_state(app_state)
}

#[cfg(test)]
mod tests;
