use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard bound on decide→invoke→synthesize cycles per turn. The
    /// continuation heuristic usually ends turns well before this.
    #[serde(default = "d_8")]
    pub max_cycles: u32,
    /// How many conversational turns of history are kept when dispatching
    /// to the inference endpoint (system messages always kept).
    #[serde(default = "d_20")]
    pub history_window_turns: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_cycles: 8,
            history_window_turns: 20,
        }
    }
}

fn d_8() -> u32 {
    8
}

fn d_20() -> usize {
    20
}
