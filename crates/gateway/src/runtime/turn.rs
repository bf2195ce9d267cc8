//! Turn entry point: one incoming human message, through the tenant's
//! decision graph, to a terminal response.

use tracing::Instrument;

use sy_domain::error::{Error, Result};
use sy_domain::message::ChatMessage;

use crate::state::AppState;

/// Input to a single turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub tenant_id: String,
    pub conversation_id: String,
    pub message: String,
}

/// The terminal result of a turn.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TurnOutcome {
    pub output: String,
    pub invocations_executed: usize,
    pub cycles: u32,
}

/// Run one turn for one tenant. Readiness is ensured first (waiting on any
/// pending rebuild), then the compiled graph drives the state machine; the
/// produced messages are checkpointed for the next turn.
pub async fn run_turn(state: &AppState, input: TurnInput) -> Result<TurnOutcome> {
    let turn_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "turn",
        %turn_id,
        tenant = %input.tenant_id,
        conversation = %input.conversation_id,
    );

    async move {
        state.registry.ensure_ready(&input.tenant_id).await?;
        let graph = state
            .registry
            .graph(&input.tenant_id)
            .ok_or_else(|| Error::GraphBuild {
                tenant: input.tenant_id.clone(),
                message: "no graph available after ensure_ready".into(),
            })?;

        let mut history = state
            .checkpoints
            .history(&input.tenant_id, &input.conversation_id);
        let human = ChatMessage::human(input.message.clone());
        history.push(human.clone());

        let run = graph
            .run_turn(
                &input.tenant_id,
                &history,
                &input.message,
                state.registry.as_ref(),
            )
            .await?;

        tracing::info!(
            invocations = run.invocations_executed,
            cycles = run.cycles,
            output_chars = run.output.len(),
            "turn finished"
        );

        state.checkpoints.append(
            &input.tenant_id,
            &input.conversation_id,
            std::iter::once(human).chain(run.appended),
        );

        Ok(TurnOutcome {
            output: run.output,
            invocations_executed: run.invocations_executed,
            cycles: run.cycles,
        })
    }
    .instrument(span)
    .await
}
