use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Per-request timeout for backend calls. This is the only bound on a
    /// tool invocation; the orchestrator adds no timeout of its own.
    #[serde(default = "d_30")]
    pub http_timeout_secs: u64,
    /// Pause after closing a non-empty connection set, giving detached
    /// async cleanup time to finish before slots are reused.
    #[serde(default = "d_500")]
    pub teardown_delay_ms: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            teardown_delay_ms: 500,
        }
    }
}

fn d_30() -> u64 {
    30
}

fn d_500() -> u64 {
    500
}
