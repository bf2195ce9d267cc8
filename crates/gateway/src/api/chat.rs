//! Conversation-turn entry point.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::runtime::{run_turn, TurnInput};
use crate::state::AppState;

use super::error_response;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub tenant_id: String,
    pub conversation_id: String,
    pub message: String,
}

// ── POST /v1/chat ──────────────────────────────────────────────────

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    let input = TurnInput {
        tenant_id: body.tenant_id,
        conversation_id: body.conversation_id,
        message: body.message,
    };

    match run_turn(&state, input).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "turn failed");
            error_response(&e).into_response()
        }
    }
}
