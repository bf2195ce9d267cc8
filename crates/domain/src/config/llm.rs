use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Inference endpoint configuration (any OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat-completions endpoint.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. If the env var is unset,
    /// requests are sent without an Authorization header (local endpoints).
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    /// Sampling temperature. Tool decisions want determinism.
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds for inference calls.
    #[serde(default = "d_120")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            temperature: d_temperature(),
            request_timeout_secs: 120,
        }
    }
}

fn d_base_url() -> String {
    "http://localhost:11434/v1".into()
}

fn d_api_key_env() -> String {
    "SY_LLM_API_KEY".into()
}

fn d_model() -> String {
    "gpt-4o-mini".into()
}

fn d_temperature() -> f32 {
    0.0
}

fn d_120() -> u64 {
    120
}
