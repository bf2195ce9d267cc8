//! Graph introspection.

use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::state::AppState;

use super::error_response;

// ── GET /v1/graph/:tenant ──────────────────────────────────────────

/// Render the tenant's compiled decision graph as a mermaid flowchart,
/// building it first if needed.
pub async fn diagram(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = state.registry.ensure_ready(&tenant).await {
        return error_response(&e).into_response();
    }

    match state.registry.graph(&tenant) {
        Some(graph) => graph.to_mermaid().into_response(),
        None => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "no graph available",
        )
            .into_response(),
    }
}
