//! Backend connect/disconnect notifications.
//!
//! These arrive from the front-end collaborator when an end user attaches
//! or detaches a tool backend. Both mutations schedule a tracked rebuild
//! rather than racing one inline.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use sy_domain::backend::BackendDescriptor;
use sy_domain::trace::TraceEvent;

use crate::state::AppState;

use super::error_response;

// ── POST /v1/backends/:tenant/connect ──────────────────────────────

pub async fn connect(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(descriptor): Json<BackendDescriptor>,
) -> impl IntoResponse {
    let backend = descriptor.name.clone();
    if let Err(e) = state.registry.descriptors().add(&tenant, descriptor) {
        return error_response(&e).into_response();
    }

    TraceEvent::BackendConnected {
        tenant: tenant.clone(),
        backend,
    }
    .emit();

    state.registry.schedule_rebuild(&tenant);
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "rebuild scheduled" })),
    )
        .into_response()
}

// ── POST /v1/backends/:tenant/disconnect ───────────────────────────

#[derive(Debug, Deserialize)]
pub struct DisconnectRequest {
    pub name: String,
}

pub async fn disconnect(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<DisconnectRequest>,
) -> impl IntoResponse {
    let was_present = state.registry.descriptors().remove(&tenant, &body.name);
    state.registry.schedule_rebuild(&tenant);

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "rebuild scheduled",
            "removed": was_present,
        })),
    )
}

// ── POST /v1/backends/:tenant/allow ────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AllowRequest {
    pub name: String,
}

/// Lift a removal cooldown early so the backend can be re-announced.
pub async fn allow(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<AllowRequest>,
) -> impl IntoResponse {
    let store = state.registry.descriptors();
    let remaining = store
        .cooldown_remaining(&tenant, &body.name)
        .map(|d| d.as_secs());
    store.allow_reconnect(&tenant, &body.name);

    Json(json!({
        "status": "cooldown lifted",
        "was_active": remaining.is_some(),
        "remaining_secs": remaining,
    }))
}

// ── GET /v1/backends/:tenant ───────────────────────────────────────

pub async fn list(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> impl IntoResponse {
    let store = state.registry.descriptors();
    Json(json!({
        "backends": store.list(&tenant),
        "stats": store.stats(),
    }))
}
