//! Backend descriptors: how a tenant's tool backends are announced.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Descriptor for one remote tool backend, supplied on connect and removed
/// on disconnect. Connections are opened from this; the descriptor itself
/// carries no live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Display name, unique per tenant.
    pub name: String,
    /// Transport address (streamable-HTTP endpoint).
    pub url: String,
    /// Optional auth headers sent on every request to this backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub kind: BackendKind,
}

/// What the backend's catalog represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Catalog entries are directly invocable operations.
    #[default]
    Standard,
    /// The backend indexes workflows: a designated discovery operation
    /// returns sub-operations that are folded into the catalog.
    WorkflowIndex,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: None,
            kind: BackendKind::Standard,
        }
    }
}
