//! In-memory conversation checkpoints.
//!
//! Durable thread storage is an external collaborator; this store only
//! keeps the working history each conversation needs between turns, scoped
//! per tenant so eviction can drop everything a tenant owns.

use std::collections::HashMap;

use parking_lot::RwLock;

use sy_domain::message::ChatMessage;

/// tenant id → conversation id → accumulated messages.
#[derive(Default)]
pub struct CheckpointStore {
    inner: RwLock<HashMap<String, HashMap<String, Vec<ChatMessage>>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one conversation's history (empty if unknown).
    pub fn history(&self, tenant: &str, conversation: &str) -> Vec<ChatMessage> {
        self.inner
            .read()
            .get(tenant)
            .and_then(|c| c.get(conversation))
            .cloned()
            .unwrap_or_default()
    }

    /// Append messages produced by a finished turn.
    pub fn append(
        &self,
        tenant: &str,
        conversation: &str,
        messages: impl IntoIterator<Item = ChatMessage>,
    ) {
        let mut inner = self.inner.write();
        inner
            .entry(tenant.to_owned())
            .or_default()
            .entry(conversation.to_owned())
            .or_default()
            .extend(messages);
    }

    /// Drop every conversation a tenant owns (on eviction).
    pub fn remove_tenant(&self, tenant: &str) {
        self.inner.write().remove(tenant);
    }

    pub fn conversation_count(&self, tenant: &str) -> usize {
        self.inner.read().get(tenant).map_or(0, |c| c.len())
    }
}
