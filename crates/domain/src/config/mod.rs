mod llm;
mod mcp;
mod orchestrator;
mod server;
mod tenancy;

pub use llm::*;
pub use mcp::*;
pub use orchestrator::*;
pub use server::*;
pub use tenancy::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub tenancy: TenancyConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    /// Sanity-check values that would otherwise fail at runtime.
    /// Returns human-readable warnings; nothing here is fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.llm.base_url.is_empty() {
            warnings.push("llm.base_url is empty — turns will fail until set".into());
        }
        if self.orchestrator.max_cycles == 0 {
            warnings
                .push("orchestrator.max_cycles is 0 — every turn ends after one decision".into());
        }
        if self.tenancy.removal_cooldown_secs > self.tenancy.inactivity_ttl_secs {
            warnings.push(
                "tenancy.removal_cooldown_secs exceeds inactivity_ttl_secs — cooldowns may outlive their tenant"
                    .into(),
            );
        }
        warnings
    }
}
