use std::sync::Arc;

use chrono::{DateTime, Utc};

use sy_domain::config::Config;

use crate::runtime::{CheckpointStore, TenantRegistry};

/// Shared application state passed to all API handlers.
///
/// The registry is injected here rather than living in a global; every
/// collaborator that needs per-tenant state receives it explicitly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<TenantRegistry>,
    pub checkpoints: Arc<CheckpointStore>,
    pub started_at: DateTime<Utc>,
}
