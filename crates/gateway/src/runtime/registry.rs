//! Tenant Session Registry.
//!
//! Keyed by tenant id, each entry holds the compiled decision graph (or
//! none), the tenant's live backend connections, and the operation →
//! connection index. Rebuilds are serialized per tenant and never block
//! other tenants; scheduled rebuilds are tracked so a new turn waits on a
//! pending one instead of racing it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::watch;

use sy_domain::config::Config;
use sy_domain::error::{Error, Result};
use sy_domain::trace::TraceEvent;
use sy_mcp_client::{build_catalog, close_all, format_tool_result, Connection, Connector};
use sy_providers::LlmProvider;
use sy_tenancy::{DescriptorStore, RebuildLockMap};

use super::graph::{DecisionGraph, OperationInvoker};
use super::policy::TurnPolicy;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tenant session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Live state for one tenant. The graph may be absent after `invalidate`
/// or a failed rebuild; connections are exclusively owned by this tenant.
struct TenantSession {
    graph: Option<Arc<DecisionGraph>>,
    connections: Vec<Arc<Connection>>,
    owners: HashMap<String, Arc<Connection>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The per-tenant lifecycle manager. Explicitly injected everywhere it is
/// needed; there are no process-wide singletons.
pub struct TenantRegistry {
    config: Arc<Config>,
    provider: Arc<dyn LlmProvider>,
    connector: Arc<dyn Connector>,
    descriptors: Arc<DescriptorStore>,
    policy: Arc<TurnPolicy>,
    locks: RebuildLockMap,
    sessions: RwLock<HashMap<String, TenantSession>>,
    /// Scheduled rebuilds in flight, per tenant; the receiver flips to
    /// `true` when the rebuild finishes (success or failure).
    pending: Mutex<HashMap<String, watch::Receiver<bool>>>,
}

impl TenantRegistry {
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn LlmProvider>,
        connector: Arc<dyn Connector>,
        descriptors: Arc<DescriptorStore>,
        policy: Arc<TurnPolicy>,
    ) -> Self {
        Self {
            config,
            provider,
            connector,
            descriptors,
            policy,
            locks: RebuildLockMap::new(),
            sessions: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn descriptors(&self) -> &DescriptorStore {
        &self.descriptors
    }

    fn teardown_delay(&self) -> Duration {
        Duration::from_millis(self.config.mcp.teardown_delay_ms)
    }

    /// The tenant's compiled graph, if one is installed.
    pub fn graph(&self, tenant: &str) -> Option<Arc<DecisionGraph>> {
        self.sessions.read().get(tenant)?.graph.clone()
    }

    fn owner_of(&self, tenant: &str, operation: &str) -> Option<Arc<Connection>> {
        self.sessions.read().get(tenant)?.owners.get(operation).cloned()
    }

    // ── ensure_ready ───────────────────────────────────────────────

    /// No-op when the tenant already has a graph; builds one otherwise.
    /// Safe from any number of concurrent callers.
    pub async fn ensure_ready(&self, tenant: &str) -> Result<()> {
        self.descriptors.touch(tenant);
        if self.graph(tenant).is_some() {
            return Ok(());
        }

        // A scheduled rebuild may already be doing the work.
        self.await_pending(tenant).await;
        if self.graph(tenant).is_some() {
            return Ok(());
        }

        let _guard = self.locks.acquire(tenant).await;
        if self.graph(tenant).is_some() {
            return Ok(());
        }
        self.rebuild_locked(tenant).await
    }

    // ── rebuild ────────────────────────────────────────────────────

    /// Tear down and rebuild one tenant's connections and graph. Fully
    /// serialized per tenant; cross-tenant rebuilds run independently.
    pub async fn rebuild(&self, tenant: &str) -> Result<()> {
        let _guard = self.locks.acquire(tenant).await;
        self.rebuild_locked(tenant).await
    }

    async fn rebuild_locked(&self, tenant: &str) -> Result<()> {
        let started = Instant::now();
        let descriptors = self.descriptors.list(tenant);
        TraceEvent::RebuildStarted {
            tenant: tenant.to_owned(),
            backend_count: descriptors.len(),
        }
        .emit();

        // Retire the old session first: concurrent callers see "no graph"
        // from here on, never a graph over closed connections.
        let old = self.sessions.write().remove(tenant);
        if let Some(old) = old {
            close_all(old.connections, self.teardown_delay()).await;
        }

        let catalog = build_catalog(self.connector.as_ref(), &descriptors).await;
        if !catalog.failures.is_empty() && catalog.is_model_only() {
            // Every backend failed; the tenant still gets a graph rather
            // than being stuck unreadied.
            tracing::warn!(
                tenant,
                failures = catalog.failures.len(),
                "all backends failed, compiling model-only graph"
            );
        }

        let graph = match DecisionGraph::compile(
            tenant,
            self.provider.clone(),
            catalog.operations,
            self.policy.clone(),
            self.config.orchestrator.clone(),
        ) {
            Ok(graph) => Arc::new(graph),
            Err(e) => {
                // Leave the tenant graph-less; the next ensure_ready
                // retries from scratch.
                tracing::error!(tenant, error = %e, "graph compilation failed");
                close_all(catalog.connections, self.teardown_delay()).await;
                return Err(e);
            }
        };

        let operation_count = graph.operations().len();
        let failed_backends = catalog.failures.len();
        self.sessions.write().insert(
            tenant.to_owned(),
            TenantSession {
                graph: Some(graph),
                connections: catalog.connections,
                owners: catalog.owners,
            },
        );

        TraceEvent::RebuildFinished {
            tenant: tenant.to_owned(),
            operation_count,
            failed_backends,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        Ok(())
    }

    // ── invalidate ─────────────────────────────────────────────────

    /// Drop only the compiled graph; connections stay open. The next
    /// `ensure_ready` performs a full rebuild.
    pub fn invalidate(&self, tenant: &str) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(tenant) {
            session.graph = None;
            tracing::info!(tenant, "graph invalidated, will rebuild on next access");
        }
    }

    // ── call_operation ─────────────────────────────────────────────

    /// Direct invocation path (polling callers bypass the orchestrator).
    /// A closed-connection failure triggers exactly one rebuild and one
    /// retry; everything else propagates.
    pub async fn call_operation(
        &self,
        tenant: &str,
        operation: &str,
        arguments: Value,
    ) -> Result<String> {
        self.descriptors.touch(tenant);
        if self.owner_of(tenant, operation).is_none() {
            self.ensure_ready(tenant).await?;
        }

        let conn = self
            .owner_of(tenant, operation)
            .ok_or_else(|| Error::OperationNotFound {
                tenant: tenant.to_owned(),
                operation: operation.to_owned(),
            })?;

        match conn.call_operation(operation, arguments.clone()).await {
            Ok(result) => Ok(format_tool_result(&result)),
            Err(e) if e.is_connection_interrupted() => {
                tracing::warn!(
                    tenant,
                    operation,
                    error = %e,
                    "connection closed mid-call, rebuilding and retrying once"
                );
                self.rebuild(tenant).await?;

                let conn =
                    self.owner_of(tenant, operation)
                        .ok_or_else(|| Error::OperationNotFound {
                            tenant: tenant.to_owned(),
                            operation: operation.to_owned(),
                        })?;
                let result = conn.call_operation(operation, arguments).await?;
                Ok(format_tool_result(&result))
            }
            Err(e) => Err(e),
        }
    }

    // ── scheduled rebuilds ─────────────────────────────────────────

    /// Kick off a rebuild in the background, tracked per tenant so turns
    /// can wait on it instead of racing it. A newer schedule supersedes
    /// the tracked entry; serialization still comes from the per-tenant
    /// lock.
    pub fn schedule_rebuild(self: &Arc<Self>, tenant: &str) {
        let (tx, rx) = watch::channel(false);
        self.pending.lock().insert(tenant.to_owned(), rx);

        let registry = Arc::clone(self);
        let tenant_owned = tenant.to_owned();
        tokio::spawn(async move {
            if let Err(e) = registry.rebuild(&tenant_owned).await {
                tracing::warn!(tenant = %tenant_owned, error = %e, "scheduled rebuild failed");
            }
            let _ = tx.send(true);
            // Only clear the tracking entry if it is still ours (a newer
            // schedule may have replaced it).
            let mut pending = registry.pending.lock();
            if pending.get(&tenant_owned).map(|rx| *rx.borrow()) == Some(true) {
                pending.remove(&tenant_owned);
            }
        });
    }

    async fn await_pending(&self, tenant: &str) {
        let rx = self.pending.lock().get(tenant).cloned();
        let Some(mut rx) = rx else {
            return;
        };
        while !*rx.borrow() {
            // A dropped sender also means the rebuild is over.
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    // ── eviction ───────────────────────────────────────────────────

    /// Evict tenants idle past the TTL: close their connections and drop
    /// all registry state. Returns the evicted tenant ids so the caller
    /// can clear collaborating stores.
    pub async fn evict_idle(&self) -> Vec<String> {
        let ttl = Duration::from_secs(self.config.tenancy.inactivity_ttl_secs);
        let stale = self.descriptors.evict_idle(ttl);

        let mut evicted = Vec::with_capacity(stale.len());
        for (tenant, idle) in stale {
            // Let an in-flight scheduled rebuild finish rather than
            // killing it over half-open connections.
            self.await_pending(&tenant).await;
            self.pending.lock().remove(&tenant);

            let session = self.sessions.write().remove(&tenant);
            if let Some(session) = session {
                close_all(session.connections, self.teardown_delay()).await;
            }
            self.locks.remove(&tenant);

            TraceEvent::TenantEvicted {
                tenant: tenant.clone(),
                idle_secs: idle.as_secs(),
            }
            .emit();
            evicted.push(tenant);
        }
        evicted
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invoker impl
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl OperationInvoker for TenantRegistry {
    async fn invoke(&self, tenant: &str, operation: &str, arguments: Value) -> Result<String> {
        self.call_operation(tenant, operation, arguments).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use sy_domain::backend::BackendDescriptor;
    use sy_mcp_client::protocol::JsonRpcResponse;
    use sy_mcp_client::{McpTransport, TransportError};
    use sy_providers::{ChatRequest, ChatResponse};

    struct StaticProvider;

    #[async_trait]
    impl LlmProvider for StaticProvider {
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: "ok".into(),
                invocations: Vec::new(),
                usage: None,
                model: "static".into(),
                finish_reason: Some("stop".into()),
            })
        }

        fn provider_id(&self) -> &str {
            "static"
        }
    }

    /// Transport whose `tools/call` can be flipped to fail closed; counts
    /// shutdowns.
    struct FlippableTransport {
        tools: Value,
        fail_calls: Arc<AtomicBool>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl McpTransport for FlippableTransport {
        async fn send_request(
            &self,
            method: &str,
            params: Option<Value>,
        ) -> std::result::Result<JsonRpcResponse, TransportError> {
            let result = match method {
                "initialize" => serde_json::json!({}),
                "tools/list" => self.tools.clone(),
                "tools/call" => {
                    if self.fail_calls.load(Ordering::SeqCst) {
                        return Err(TransportError::ConnectionClosed);
                    }
                    let name = params
                        .and_then(|p| p.get("name").and_then(|n| n.as_str()).map(str::to_owned))
                        .unwrap_or_default();
                    serde_json::json!({
                        "content": [{ "type": "text", "text": format!("ran {name}") }]
                    })
                }
                other => return Err(TransportError::Protocol(format!("unexpected {other}"))),
            };
            Ok(JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: 1,
                result: Some(result),
                error: None,
            })
        }

        async fn send_notification(&self, _method: &str) -> std::result::Result<(), TransportError> {
            Ok(())
        }

        fn is_alive(&self) -> bool {
            true
        }

        async fn shutdown(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Connector tracking connection attempts; each fresh connection heals
    /// the failure flag (a reconnected backend works again).
    struct TestConnector {
        connects: AtomicUsize,
        refuse: AtomicBool,
        fail_calls: Arc<AtomicBool>,
        closed: Arc<AtomicUsize>,
    }

    impl TestConnector {
        fn new() -> Self {
            Self {
                connects: AtomicUsize::new(0),
                refuse: AtomicBool::new(false),
                fail_calls: Arc::new(AtomicBool::new(false)),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Connector for TestConnector {
        async fn connect(&self, descriptor: &BackendDescriptor) -> Result<Connection> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(Error::Connection {
                    backend: descriptor.name.clone(),
                    message: "connection refused".into(),
                });
            }
            // A fresh connection is healthy.
            self.fail_calls.store(false, Ordering::SeqCst);
            Ok(Connection::new(
                &descriptor.name,
                Box::new(FlippableTransport {
                    tools: serde_json::json!({
                        "tools": [{ "name": "search_code", "description": "search" }]
                    }),
                    fail_calls: self.fail_calls.clone(),
                    closed: self.closed.clone(),
                }),
            ))
        }
    }

    fn test_config() -> Arc<Config> {
        let mut config = Config::default();
        config.mcp.teardown_delay_ms = 0;
        Arc::new(config)
    }

    fn registry_with(connector: Arc<TestConnector>) -> Arc<TenantRegistry> {
        Arc::new(TenantRegistry::new(
            test_config(),
            Arc::new(StaticProvider),
            connector,
            Arc::new(DescriptorStore::new(Duration::from_secs(10))),
            Arc::new(TurnPolicy::new()),
        ))
    }

    #[tokio::test]
    async fn ensure_ready_is_idempotent() {
        let connector = Arc::new(TestConnector::new());
        let registry = registry_with(connector.clone());
        registry
            .descriptors()
            .add("u1", BackendDescriptor::new("alpha", "http://alpha/mcp"))
            .unwrap();

        registry.ensure_ready("u1").await.unwrap();
        registry.ensure_ready("u1").await.unwrap();

        // Backend I/O happened at most once.
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert!(registry.graph("u1").is_some());
    }

    #[tokio::test]
    async fn rebuild_with_all_backends_down_installs_model_only_graph() {
        let connector = Arc::new(TestConnector::new());
        let registry = registry_with(connector.clone());
        registry
            .descriptors()
            .add("u1", BackendDescriptor::new("alpha", "http://alpha/mcp"))
            .unwrap();

        registry.ensure_ready("u1").await.unwrap();
        assert!(registry.graph("u1").unwrap().has_operations());

        // Backend goes away; the rebuild still yields a usable graph and
        // the old connection is actually closed.
        connector.refuse.store(true, Ordering::SeqCst);
        registry.rebuild("u1").await.unwrap();

        let graph = registry.graph("u1").expect("model-only graph installed");
        assert!(!graph.has_operations());
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
        assert!(registry.owner_of("u1", "search_code").is_none());
    }

    #[tokio::test]
    async fn call_operation_rebuilds_and_retries_once_on_closed_connection() {
        let connector = Arc::new(TestConnector::new());
        let registry = registry_with(connector.clone());
        registry
            .descriptors()
            .add("u1", BackendDescriptor::new("alpha", "http://alpha/mcp"))
            .unwrap();
        registry.ensure_ready("u1").await.unwrap();

        // Break the live connection's calls.
        connector.fail_calls.store(true, Ordering::SeqCst);

        let out = registry
            .call_operation("u1", "search_code", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(out, "ran search_code");
        // Initial connect plus exactly one rebuild.
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn call_operation_for_unknown_name_is_an_error() {
        let connector = Arc::new(TestConnector::new());
        let registry = registry_with(connector.clone());
        registry
            .descriptors()
            .add("u1", BackendDescriptor::new("alpha", "http://alpha/mcp"))
            .unwrap();

        let err = registry
            .call_operation("u1", "no_such_op", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OperationNotFound { .. }));
    }

    #[tokio::test]
    async fn invalidate_drops_graph_but_keeps_connections() {
        let connector = Arc::new(TestConnector::new());
        let registry = registry_with(connector.clone());
        registry
            .descriptors()
            .add("u1", BackendDescriptor::new("alpha", "http://alpha/mcp"))
            .unwrap();
        registry.ensure_ready("u1").await.unwrap();

        registry.invalidate("u1");
        assert!(registry.graph("u1").is_none());
        // Connections were not torn down by invalidate itself.
        assert_eq!(connector.closed.load(Ordering::SeqCst), 0);

        // The next ensure_ready performs a full rebuild.
        registry.ensure_ready("u1").await.unwrap();
        assert!(registry.graph("u1").is_some());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scheduled_rebuild_is_awaited_not_raced() {
        let connector = Arc::new(TestConnector::new());
        let registry = registry_with(connector.clone());
        registry
            .descriptors()
            .add("u1", BackendDescriptor::new("alpha", "http://alpha/mcp"))
            .unwrap();

        registry.schedule_rebuild("u1");
        registry.ensure_ready("u1").await.unwrap();

        assert!(registry.graph("u1").is_some());
        // ensure_ready waited for the scheduled rebuild instead of
        // building a second time.
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evicted_tenant_loses_session_and_connections() {
        let connector = Arc::new(TestConnector::new());
        let mut config = Config::default();
        config.mcp.teardown_delay_ms = 0;
        // TTL of zero: any measurable idle time is enough.
        config.tenancy.inactivity_ttl_secs = 0;
        let registry = Arc::new(TenantRegistry::new(
            Arc::new(config),
            Arc::new(StaticProvider),
            connector.clone(),
            Arc::new(DescriptorStore::new(Duration::from_secs(10))),
            Arc::new(TurnPolicy::new()),
        ));
        registry
            .descriptors()
            .add("u1", BackendDescriptor::new("alpha", "http://alpha/mcp"))
            .unwrap();
        registry.ensure_ready("u1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let evicted = registry.evict_idle().await;

        assert_eq!(evicted, vec!["u1".to_owned()]);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
        assert!(registry.graph("u1").is_none());
        assert!(registry.descriptors().list("u1").is_empty());
    }
}
