//! The node table: a name-to-address hash edited over HTTP.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info};

use super::AppState;
use super::pages::Envelope;
use crate::store::{StoreError, keys};

/// A store failure surfaced as a 500.
#[derive(Debug)]
pub struct NodeError(StoreError);

impl From<StoreError> for NodeError {
    fn from(e: StoreError) -> Self {
        NodeError(e)
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Node table access failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    pub node: String,
}

#[derive(Debug, Deserialize)]
pub struct NodeName {
    pub name: String,
}

type Table = Json<Envelope<BTreeMap<String, String>>>;

pub async fn list_nodes_handler(State(app_state): State<AppState>) -> Result<Table, NodeError> {
    let nodes = app_state.store().hash_get_all(keys::NODE).await?;
    Ok(Envelope::success(nodes))
}

/// Creates or replaces a node; answers with the updated table.
pub async fn upsert_node_handler(
    State(app_state): State<AppState>,
    Query(entry): Query<NodeEntry>,
) -> Result<Table, NodeError> {
    let store = app_state.store();
    store
        .hash_set(keys::NODE, &[(entry.name.clone(), entry.node)])
        .await?;
    info!(name = %entry.name, "Node saved");
    Ok(Envelope::success(store.hash_get_all(keys::NODE).await?))
}

/// Removes a node; answers with how many entries were removed.
pub async fn delete_node_handler(
    State(app_state): State<AppState>,
    Query(target): Query<NodeName>,
) -> Result<Json<Envelope<usize>>, NodeError> {
    let removed = app_state
        .store()
        .hash_delete(keys::NODE, std::slice::from_ref(&target.name))
        .await?;
    info!(name = %target.name, removed, "Node deleted");
    Ok(Envelope::success(removed))
}
