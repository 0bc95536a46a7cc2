//! HTTP surface of the gateway.
//!
//! Thin plumbing over the pipelines: request bodies are validated into fixed
//! shapes before entering the core, errors map to stable kinds and status
//! codes, and every endpoint except `/health` requires a bearer credential
//! resolved by the injected [`Authenticator`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/documents` | Embed and upsert a document |
//! | `POST` | `/query` | Similarity query over resolved partitions |
//! | `DELETE` | `/documents/{id}` | Delete a document (idempotent) |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "kind": "validation", "message": "invalid request: ..." } }
//! ```
//!
//! Kinds: `validation` (400), `auth` (401), `rate_limited` (429),
//! `unavailable` (502), `malformed` (400), `resolution` (500).

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::Authenticator;
use crate::error::{GatewayError, GatewayResult};
use crate::ingest::IngestionPipeline;
use crate::models::{
    CallerId, DegradedPartition, DocumentInput, Metadata, MetadataFilter, QueryRequest, Scope,
    SearchHit,
};
use crate::query::QueryOrchestrator;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn Authenticator>,
    pub ingest: Arc<IngestionPipeline>,
    pub query: Arc<QueryOrchestrator>,
}

/// Build the gateway router. Exposed separately from [`run_server`] so tests
/// can serve it on an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/documents", post(handle_upsert_document))
        .route("/documents/{id}", delete(handle_delete_document))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn run_server(bind: &str, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Validate a loosely-typed JSON body into a fixed request shape.
///
/// Shape errors are caller mistakes and map to `Validation` (400) rather
/// than the extractor's default rejection.
fn parse_body<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> GatewayResult<T> {
    serde_json::from_value(value)
        .map_err(|e| GatewayError::Validation(format!("invalid request body: {e}")))
}

/// Resolve the caller from the `Authorization: Bearer` header.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> GatewayResult<CallerId> {
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| GatewayError::Auth("missing bearer credential".to_string()))?;
    state.auth.authenticate(credential).await
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct UpsertBody {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    metadata: Metadata,
    scope: Scope,
}

#[derive(Serialize)]
struct UpsertResponse {
    id: String,
}

async fn handle_upsert_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<UpsertResponse>, GatewayError> {
    let caller = authenticate(&state, &headers).await?;
    let body: UpsertBody = parse_body(value)?;
    let id = state
        .ingest
        .ingest(
            &caller,
            body.scope,
            DocumentInput {
                id: body.id,
                text: body.text,
                metadata: body.metadata,
            },
        )
        .await?;
    Ok(Json(UpsertResponse { id }))
}

// ============ DELETE /documents/{id} ============

#[derive(Deserialize)]
struct DeleteParams {
    scope: Scope,
}

async fn handle_delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, GatewayError> {
    let caller = authenticate(&state, &headers).await?;
    state.ingest.delete(&caller, params.scope, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryBody {
    text: String,
    scope: Scope,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    filter: Option<MetadataFilter>,
}

#[derive(Serialize)]
struct QueryResponse {
    results: Vec<SearchHit>,
    partial: bool,
    degraded: Vec<DegradedPartition>,
}

async fn handle_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<QueryResponse>, GatewayError> {
    let caller = authenticate(&state, &headers).await?;
    let body: QueryBody = parse_body(value)?;
    let request = QueryRequest {
        text: body.text,
        scope: body.scope,
        top_k: body.top_k.unwrap_or_else(|| state.query.default_top_k()),
        filter: body.filter,
    };
    let outcome = state.query.query(&caller, request).await?;
    Ok(Json(QueryResponse {
        results: outcome.hits,
        partial: outcome.partial,
        degraded: outcome.degraded,
    }))
}
