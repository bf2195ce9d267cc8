//! Direct operation invocation, bypassing the orchestrator.
//!
//! Used by polling callers (e.g. a job monitor asking a backend for log
//! tails) that need a tool result without a model in the loop.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

use super::error_response;

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

// ── POST /v1/operations/:tenant/call ───────────────────────────────

pub async fn call(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<CallRequest>,
) -> impl IntoResponse {
    let arguments = if body.arguments.is_null() {
        json!({})
    } else {
        body.arguments
    };

    match state
        .registry
        .call_operation(&tenant, &body.name, arguments)
        .await
    {
        Ok(result) => Json(json!({ "result": result })).into_response(),
        Err(e) => {
            tracing::warn!(%tenant, operation = %body.name, error = %e, "direct call failed");
            error_response(&e).into_response()
        }
    }
}
