//! Wires the application state together and owns the background sweep.

use std::sync::Arc;
use std::time::Duration;

use sy_domain::config::Config;
use sy_domain::error::Result;
use sy_mcp_client::HttpConnector;
use sy_providers::OpenAiCompatProvider;
use sy_tenancy::DescriptorStore;

use crate::runtime::{CheckpointStore, TenantRegistry, TurnPolicy};
use crate::state::AppState;

/// Build the shared application state from config. Everything stateful is
/// constructed here and injected; nothing reaches for a global.
pub fn build_state(config: Arc<Config>) -> Result<AppState> {
    let provider = Arc::new(OpenAiCompatProvider::from_config(&config.llm)?);
    let connector = Arc::new(HttpConnector::new(Duration::from_secs(
        config.mcp.http_timeout_secs,
    )));
    let descriptors = Arc::new(DescriptorStore::new(Duration::from_secs(
        config.tenancy.removal_cooldown_secs,
    )));
    let registry = Arc::new(TenantRegistry::new(
        config.clone(),
        provider,
        connector,
        descriptors,
        Arc::new(TurnPolicy::new()),
    ));

    Ok(AppState {
        config,
        registry,
        checkpoints: Arc::new(CheckpointStore::new()),
        started_at: chrono::Utc::now(),
    })
}

/// Periodic eviction of idle tenants. Evicted tenants lose their registry
/// state, connections, and checkpointed conversations.
pub fn spawn_eviction_sweep(state: &AppState) -> tokio::task::JoinHandle<()> {
    let registry = state.registry.clone();
    let checkpoints = state.checkpoints.clone();
    let interval = Duration::from_secs(state.config.tenancy.cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_idle().await;
            for tenant in &evicted {
                checkpoints.remove_tenant(tenant);
            }
            if !evicted.is_empty() {
                tracing::info!(count = evicted.len(), "evicted idle tenants");
            }
        }
    })
}
