//! Per-tenant backend descriptor storage.
//!
//! Keyed by tenant id. Tracks which backends each tenant has announced, a
//! removal blacklist (a removed backend cannot be re-announced within the
//! cooldown window), and last-activity timestamps for inactivity eviction.
//!
//! Time-dependent methods take an explicit `now` so tests stay
//! deterministic; the `_at`-less wrappers use `Instant::now()`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use sy_domain::backend::BackendDescriptor;
use sy_domain::error::{Error, Result};
use sy_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct TenantEntry {
    /// Announced backends, in announcement order (the catalog builder's
    /// first-wins rule depends on this order being stable).
    descriptors: Vec<BackendDescriptor>,
    /// Backend name → removal time, for the cooldown window.
    removed: HashMap<String, Instant>,
    last_activity: Option<Instant>,
}

/// Storage statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub tenant_count: usize,
    pub backend_count: usize,
    pub blacklisted_count: usize,
}

/// Thread-safe descriptor store shared by the registry and the API layer.
pub struct DescriptorStore {
    cooldown: Duration,
    tenants: RwLock<HashMap<String, TenantEntry>>,
}

impl DescriptorStore {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    // ── Descriptors ────────────────────────────────────────────────

    /// Announce (or update) a backend for a tenant. Fails while the name
    /// is still inside its removal cooldown.
    pub fn add(&self, tenant: &str, descriptor: BackendDescriptor) -> Result<()> {
        self.add_at(tenant, descriptor, Instant::now())
    }

    pub fn add_at(
        &self,
        tenant: &str,
        descriptor: BackendDescriptor,
        now: Instant,
    ) -> Result<()> {
        let mut tenants = self.tenants.write();
        let entry = tenants.entry(tenant.to_owned()).or_default();
        entry.last_activity = Some(now);

        if let Some(removed_at) = entry.removed.get(&descriptor.name) {
            let elapsed = now.saturating_duration_since(*removed_at);
            if elapsed < self.cooldown {
                return Err(Error::CooldownActive {
                    backend: descriptor.name.clone(),
                    elapsed_secs: elapsed.as_secs(),
                    cooldown_secs: self.cooldown.as_secs(),
                });
            }
            // Cooldown expired; clear the blacklist entry.
            entry.removed.remove(&descriptor.name);
        }

        match entry
            .descriptors
            .iter_mut()
            .find(|d| d.name == descriptor.name)
        {
            Some(existing) => *existing = descriptor,
            None => entry.descriptors.push(descriptor),
        }
        Ok(())
    }

    /// Remove a backend for a tenant and start its cooldown. Returns
    /// whether the backend was present.
    pub fn remove(&self, tenant: &str, backend: &str) -> bool {
        self.remove_at(tenant, backend, Instant::now())
    }

    pub fn remove_at(&self, tenant: &str, backend: &str, now: Instant) -> bool {
        let mut tenants = self.tenants.write();
        let entry = tenants.entry(tenant.to_owned()).or_default();
        entry.last_activity = Some(now);

        let before = entry.descriptors.len();
        entry.descriptors.retain(|d| d.name != backend);
        let was_present = entry.descriptors.len() != before;

        // Blacklist regardless: a disconnect notification for an unknown
        // backend still blocks an immediate re-announce.
        entry.removed.insert(backend.to_owned(), now);

        TraceEvent::BackendRemoved {
            tenant: tenant.to_owned(),
            backend: backend.to_owned(),
            cooldown_secs: self.cooldown.as_secs(),
        }
        .emit();

        was_present
    }

    /// Snapshot of a tenant's announced backends.
    pub fn list(&self, tenant: &str) -> Vec<BackendDescriptor> {
        self.tenants
            .read()
            .get(tenant)
            .map(|e| e.descriptors.clone())
            .unwrap_or_default()
    }

    // ── Cooldown ───────────────────────────────────────────────────

    /// Remaining cooldown for a removed backend; `None` when not in
    /// cooldown.
    pub fn cooldown_remaining(&self, tenant: &str, backend: &str) -> Option<Duration> {
        self.cooldown_remaining_at(tenant, backend, Instant::now())
    }

    pub fn cooldown_remaining_at(
        &self,
        tenant: &str,
        backend: &str,
        now: Instant,
    ) -> Option<Duration> {
        let tenants = self.tenants.read();
        let removed_at = tenants.get(tenant)?.removed.get(backend)?;
        self.cooldown
            .checked_sub(now.saturating_duration_since(*removed_at))
            .filter(|d| !d.is_zero())
    }

    /// Lift the cooldown for a backend early (operator action).
    pub fn allow_reconnect(&self, tenant: &str, backend: &str) {
        let mut tenants = self.tenants.write();
        if let Some(entry) = tenants.get_mut(tenant) {
            if entry.removed.remove(backend).is_some() {
                tracing::info!(tenant, backend, "removal cooldown lifted");
            }
        }
    }

    // ── Activity & eviction ────────────────────────────────────────

    /// Record activity for a tenant (creating it if new).
    pub fn touch(&self, tenant: &str) {
        self.touch_at(tenant, Instant::now())
    }

    pub fn touch_at(&self, tenant: &str, now: Instant) {
        let mut tenants = self.tenants.write();
        tenants.entry(tenant.to_owned()).or_default().last_activity = Some(now);
    }

    /// Remove tenants idle longer than `ttl` and return them with their
    /// idle durations. The caller owns closing their live resources.
    pub fn evict_idle(&self, ttl: Duration) -> Vec<(String, Duration)> {
        self.evict_idle_at(ttl, Instant::now())
    }

    pub fn evict_idle_at(&self, ttl: Duration, now: Instant) -> Vec<(String, Duration)> {
        let mut tenants = self.tenants.write();
        let mut evicted = Vec::new();
        tenants.retain(|tenant, entry| {
            let idle = entry
                .last_activity
                .map(|t| now.saturating_duration_since(t))
                .unwrap_or(Duration::ZERO);
            if idle > ttl {
                evicted.push((tenant.clone(), idle));
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Drop all state for one tenant (explicit cleanup).
    pub fn remove_tenant(&self, tenant: &str) -> bool {
        self.tenants.write().remove(tenant).is_some()
    }

    // ── Monitoring ─────────────────────────────────────────────────

    pub fn stats(&self) -> StoreStats {
        let tenants = self.tenants.read();
        StoreStats {
            tenant_count: tenants.len(),
            backend_count: tenants.values().map(|e| e.descriptors.len()).sum(),
            blacklisted_count: tenants.values().map(|e| e.removed.len()).sum(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn store(cooldown_secs: u64) -> DescriptorStore {
        DescriptorStore::new(Duration::from_secs(cooldown_secs))
    }

    fn descriptor(name: &str) -> BackendDescriptor {
        BackendDescriptor::new(name, format!("http://{name}/mcp"))
    }

    #[test]
    fn add_and_list_preserves_order() {
        let s = store(10);
        s.add("u1", descriptor("alpha")).unwrap();
        s.add("u1", descriptor("beta")).unwrap();
        let names: Vec<String> = s.list("u1").into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn tenants_are_isolated() {
        let s = store(10);
        s.add("u1", descriptor("alpha")).unwrap();
        assert!(s.list("u2").is_empty());
        s.remove("u1", "alpha");
        // u2 is unaffected by u1's cooldown.
        s.add("u2", descriptor("alpha")).unwrap();
    }

    #[test]
    fn re_add_replaces_in_place() {
        let s = store(10);
        s.add("u1", descriptor("alpha")).unwrap();
        let mut updated = descriptor("alpha");
        updated.url = "http://alpha-two/mcp".into();
        s.add("u1", updated).unwrap();

        let listed = s.list("u1");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].url, "http://alpha-two/mcp");
    }

    #[test]
    fn cooldown_blocks_re_add_until_expiry() {
        let s = store(10);
        let t0 = Instant::now();
        s.add_at("u1", descriptor("alpha"), t0).unwrap();
        s.remove_at("u1", "alpha", t0);

        // T + ε: rejected.
        let err = s
            .add_at("u1", descriptor("alpha"), t0 + Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::CooldownActive { .. }));

        // T + cooldown + ε: accepted.
        s.add_at("u1", descriptor("alpha"), t0 + Duration::from_secs(11))
            .unwrap();
        assert_eq!(s.list("u1").len(), 1);
    }

    #[test]
    fn cooldown_remaining_counts_down() {
        let s = store(10);
        let t0 = Instant::now();
        s.remove_at("u1", "alpha", t0);

        let remaining = s
            .cooldown_remaining_at("u1", "alpha", t0 + Duration::from_secs(4))
            .unwrap();
        assert_eq!(remaining, Duration::from_secs(6));
        assert!(s
            .cooldown_remaining_at("u1", "alpha", t0 + Duration::from_secs(10))
            .is_none());
    }

    #[test]
    fn allow_reconnect_lifts_cooldown() {
        let s = store(1000);
        let t0 = Instant::now();
        s.add_at("u1", descriptor("alpha"), t0).unwrap();
        s.remove_at("u1", "alpha", t0);

        s.allow_reconnect("u1", "alpha");
        s.add_at("u1", descriptor("alpha"), t0 + Duration::from_secs(1))
            .unwrap();
    }

    #[test]
    fn evict_idle_removes_only_stale_tenants() {
        let s = store(10);
        let t0 = Instant::now();
        s.touch_at("old", t0);
        s.touch_at("fresh", t0 + Duration::from_secs(3500));

        let evicted = s.evict_idle_at(Duration::from_secs(3600), t0 + Duration::from_secs(3700));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, "old");
        assert!(s.list("fresh").is_empty()); // still tracked, no backends
        assert_eq!(s.stats().tenant_count, 1);
    }

    #[test]
    fn stats_counts_backends_and_blacklist() {
        let s = store(10);
        s.add("u1", descriptor("alpha")).unwrap();
        s.add("u1", descriptor("beta")).unwrap();
        s.remove("u1", "beta");

        let stats = s.stats();
        assert_eq!(stats.tenant_count, 1);
        assert_eq!(stats.backend_count, 1);
        assert_eq!(stats.blacklisted_count, 1);
    }
}
