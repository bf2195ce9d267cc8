//! HTTP API surface.
//!
//! - `POST /v1/chat`                         — run one conversation turn
//! - `POST /v1/backends/:tenant/connect`     — announce a backend
//! - `POST /v1/backends/:tenant/disconnect`  — remove a backend
//! - `POST /v1/backends/:tenant/allow`       — lift a removal cooldown
//! - `GET  /v1/backends/:tenant`             — list a tenant's backends
//! - `POST /v1/operations/:tenant/call`      — direct operation invocation
//! - `GET  /v1/graph/:tenant`                — mermaid view of the graph
//! - `GET  /health`                          — liveness + counters

pub mod backends;
pub mod chat;
pub mod graph;
pub mod operations;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};

use sy_domain::error::Error;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat::chat))
        .route("/v1/backends/:tenant", get(backends::list))
        .route("/v1/backends/:tenant/connect", post(backends::connect))
        .route("/v1/backends/:tenant/disconnect", post(backends::disconnect))
        .route("/v1/backends/:tenant/allow", post(backends::allow))
        .route("/v1/operations/:tenant/call", post(operations::call))
        .route("/v1/graph/:tenant", get(graph::diagram))
        .with_state(state)
}

// ── Health ─────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.registry.descriptors().stats();
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();
    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "tenants": stats.tenant_count,
        "backends": stats.backend_count,
        "blacklisted": stats.blacklisted_count,
    }))
}

// ── Error mapping ──────────────────────────────────────────────────

/// Map a domain error onto an HTTP response. Everything in the core scopes
/// to one tenant's turn or rebuild; nothing here is process-fatal.
pub(crate) fn error_response(e: &Error) -> (StatusCode, Json<Value>) {
    let status = match e {
        Error::Connection { .. } | Error::Catalog { .. } => StatusCode::BAD_GATEWAY,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::GraphBuild { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::OperationNotFound { .. } => StatusCode::NOT_FOUND,
        Error::CooldownActive { .. } => StatusCode::CONFLICT,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}
