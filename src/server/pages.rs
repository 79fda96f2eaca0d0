//! Stored HTML pages.
//!
//! Pages are written with `/set page name-content` and served at the root.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use super::AppState;
use crate::store::{StoreError, keys};

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Page not found")]
    NotFound,

    #[error("No pages available")]
    NoPages,

    #[error("Error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = match &self {
            PageError::NotFound | PageError::NoPages => StatusCode::NOT_FOUND,
            PageError::Store(e) => {
                error!(error = %e, "Failed to read pages");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Html(self.to_string())).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub name: Option<String>,
}

/// The JSON envelope shared by the table endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub result: T,
}

impl<T> Envelope<T> {
    pub fn success(result: T) -> Json<Self> {
        Json(Envelope {
            status: "success",
            result,
        })
    }
}

/// Serves the named page, or a random page when no name is given.
pub async fn index_handler(
    State(app_state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, PageError> {
    let pages = app_state.store().hash_get_all(keys::PAGE).await?;
    let page = match query.name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => pages.get(name).cloned().ok_or(PageError::NotFound)?,
        None => pages
            .into_values()
            .choose(&mut rand::thread_rng())
            .ok_or(PageError::NoPages)?,
    };
    Ok(Html(page))
}

/// Lists every stored page by name.
pub async fn list_pages_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Envelope<BTreeMap<String, String>>>, PageError> {
    let pages = app_state.store().hash_get_all(keys::PAGE).await?;
    Ok(Envelope::success(pages))
}
