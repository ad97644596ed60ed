//! Operational HTTP surface: a key-protected maintenance endpoint and a
//! liveness probe. This is deliberately not a user-facing API; the shared
//! key gates scheduled jobs and operators, nothing else.


use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::Result;
use crate::config::FlagProvider;
use crate::embeddings::EmbeddingProvider;
use crate::indexer::{RagIndexer, RebuildRequest};

const MIGRATION_KEY_HEADER: &str = "x-migration-key";

pub struct AppState<E> {
    pub indexer: Arc<RagIndexer<E>>,
    pub flags: Arc<dyn FlagProvider>,
}

impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            indexer: Arc::clone(&self.indexer),
            flags: Arc::clone(&self.flags),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeyParams {
    key: Option<String>,
}

pub fn router<E: EmbeddingProvider + 'static>(state: AppState<E>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rag-index-maintenance", post(run_maintenance))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve<E: EmbeddingProvider + 'static>(state: AppState<E>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Maintenance endpoint listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /rag-index-maintenance?key=...` (or `x-migration-key` header).
/// The body, when present, is a [`RebuildRequest`]; an absent or
/// unreadable body falls back to defaults. Wrong key is a 403; other
/// methods are rejected by the router with a 405.
async fn run_maintenance<E: EmbeddingProvider + 'static>(
    State(state): State<AppState<E>>,
    Query(params): Query<KeyParams>,
    headers: HeaderMap,
    body: Option<Json<RebuildRequest>>,
) -> Response {
    let provided = params.key.as_deref().or_else(|| {
        headers
            .get(MIGRATION_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
    });

    if provided != Some(state.flags.migration_key().as_str()) {
        warn!("Maintenance request rejected: invalid migration key");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Forbidden - invalid migration key" })),
        )
            .into_response();
    }

    if let Err(error) = state.indexer.database().ping().await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": error.to_string() })),
        )
            .into_response();
    }

    let Json(request) = body.unwrap_or_default();
    let report = state.indexer.rebuild(&request).await;
    Json(report).into_response()
}
