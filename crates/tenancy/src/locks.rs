//! Per-tenant rebuild serialization.
//!
//! Within one tenant, rebuilds must run one at a time: one completes
//! (success or failure) before the next starts. Rebuilds for different
//! tenants never block each other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Manages per-tenant rebuild locks.
///
/// Each tenant id maps to its own async mutex. Holding the guard for the
/// duration of a rebuild gives full serialization per tenant.
pub struct RebuildLockMap {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Default for RebuildLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RebuildLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the rebuild lock for a tenant, waiting behind any rebuild
    /// already in flight. The guard auto-releases on drop.
    pub async fn acquire(&self, tenant: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(tenant.to_owned())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked tenants (for monitoring).
    pub fn tenant_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop lock entries that are not currently held.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, lock| lock.try_lock().is_err());
    }

    /// Forget one tenant's lock entry (after eviction).
    pub fn remove(&self, tenant: &str) {
        self.locks.lock().remove(tenant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_acquire_on_one_tenant() {
        let map = RebuildLockMap::new();

        let g1 = map.acquire("u1").await;
        drop(g1);
        let g2 = map.acquire("u1").await;
        drop(g2);
    }

    #[tokio::test]
    async fn different_tenants_do_not_block() {
        let map = Arc::new(RebuildLockMap::new());

        let g1 = map.acquire("u1").await;
        // Must not deadlock even though u1 is held.
        let g2 = map.acquire("u2").await;
        assert_eq!(map.tenant_count(), 2);

        drop(g1);
        drop(g2);
    }

    #[tokio::test]
    async fn same_tenant_waits_for_release() {
        let map = Arc::new(RebuildLockMap::new());
        let map2 = map.clone();

        let g1 = map.acquire("u1").await;

        let waiter = tokio::spawn(async move {
            let _g2 = map2.acquire("u1").await;
            42
        });

        // Give the waiter a moment to queue.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(g1);
        assert_eq!(waiter.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let map = RebuildLockMap::new();
        let guard = map.acquire("held").await;
        let _ = map.acquire("idle").await; // released immediately

        map.prune_idle();
        assert_eq!(map.tenant_count(), 1);
        drop(guard);
    }
}
