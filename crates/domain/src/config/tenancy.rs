use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tenancy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// A removed backend cannot be re-announced for the same tenant within
    /// this window.
    #[serde(default = "d_10")]
    pub removal_cooldown_secs: u64,
    /// Tenants idle longer than this are evicted and their connections closed.
    #[serde(default = "d_3600")]
    pub inactivity_ttl_secs: u64,
    /// How often the eviction sweep runs.
    #[serde(default = "d_300")]
    pub cleanup_interval_secs: u64,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            removal_cooldown_secs: 10,
            inactivity_ttl_secs: 3600,
            cleanup_interval_secs: 300,
        }
    }
}

fn d_10() -> u64 {
    10
}

fn d_3600() -> u64 {
    3600
}

fn d_300() -> u64 {
    300
}
