//! Per-tenant tool catalog builder.
//!
//! For each backend descriptor: open a connection, fetch the operation
//! catalog, and merge everything into one flat namespace where the first
//! backend to register a name owns it; later duplicates are dropped with
//! a warning. Workflow-index backends fan out: their designated discovery
//! operation is invoked once and the sub-operations it reports are folded
//! into the catalog under their own names.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use sy_domain::backend::{BackendDescriptor, BackendKind};
use sy_domain::error::{Error, Result};
use sy_domain::operation::OperationDef;

use crate::connection::{Connection, Connector};
use crate::protocol::McpToolDef;

/// The zero-argument discovery operation a workflow-index backend exposes.
pub const DISCOVERY_OPERATION: &str = "search_workflows";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Catalog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One backend that could not contribute to the catalog, with cause.
#[derive(Debug, Clone)]
pub struct CatalogFailure {
    pub backend: String,
    pub error: String,
}

/// The merged catalog for one tenant's backend set.
pub struct Catalog {
    /// Every connection that was opened, for teardown.
    pub connections: Vec<Arc<Connection>>,
    /// Flat operation list, first registrant wins.
    pub operations: Vec<OperationDef>,
    /// Operation name → owning connection.
    pub owners: HashMap<String, Arc<Connection>>,
    /// Backends that failed, with cause. Recorded, never fatal.
    pub failures: Vec<CatalogFailure>,
}

impl Catalog {
    fn empty() -> Self {
        Self {
            connections: Vec::new(),
            operations: Vec::new(),
            owners: HashMap::new(),
            failures: Vec::new(),
        }
    }

    /// True when no backend contributed any operation (model-only mode).
    pub fn is_model_only(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Build the catalog for one tenant. Per-backend failures are collected in
/// [`Catalog::failures`]; the remaining backends still contribute.
pub async fn build_catalog(
    connector: &dyn Connector,
    descriptors: &[BackendDescriptor],
) -> Catalog {
    let mut catalog = Catalog::empty();

    for descriptor in descriptors {
        if let Err(e) = load_backend(connector, descriptor, &mut catalog).await {
            tracing::warn!(
                backend = %descriptor.name,
                error = %e,
                "backend skipped during catalog build"
            );
            catalog.failures.push(CatalogFailure {
                backend: descriptor.name.clone(),
                error: e.to_string(),
            });
        }
    }

    tracing::info!(
        backends = descriptors.len(),
        operations = catalog.operations.len(),
        failures = catalog.failures.len(),
        "catalog built"
    );
    catalog
}

async fn load_backend(
    connector: &dyn Connector,
    descriptor: &BackendDescriptor,
    catalog: &mut Catalog,
) -> Result<()> {
    let conn = connector.connect(descriptor).await?;

    let tools = match conn.list_operations().await {
        Ok(tools) => tools,
        Err(e) => {
            conn.close().await;
            return Err(Error::Catalog {
                backend: descriptor.name.clone(),
                message: e.to_string(),
            });
        }
    };

    if tools.is_empty() {
        conn.close().await;
        return Err(Error::Catalog {
            backend: descriptor.name.clone(),
            message: "backend connected but advertised no operations".into(),
        });
    }

    let conn = Arc::new(conn);
    let mut operations: Vec<OperationDef> =
        tools.into_iter().map(McpToolDef::into_operation).collect();

    if descriptor.kind == BackendKind::WorkflowIndex {
        expand_workflow_index(&conn, &mut operations).await;
    }

    tracing::info!(
        backend = %descriptor.name,
        operations = ?operations.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(),
        "operations loaded"
    );

    catalog.connections.push(conn.clone());
    for op in operations {
        if catalog.owners.contains_key(&op.name) {
            tracing::warn!(
                backend = %descriptor.name,
                operation = %op.name,
                "duplicate operation name, keeping first registrant"
            );
            continue;
        }
        catalog.owners.insert(op.name.clone(), conn.clone());
        catalog.operations.push(op);
    }

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workflow-index expansion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Invoke the discovery operation and fold the sub-operations it reports
/// into `operations`. Discovery failures degrade to the plain catalog.
async fn expand_workflow_index(conn: &Arc<Connection>, operations: &mut Vec<OperationDef>) {
    if !operations.iter().any(|o| o.name == DISCOVERY_OPERATION) {
        tracing::warn!(
            backend = %conn.backend(),
            discovery = DISCOVERY_OPERATION,
            "workflow-index backend does not expose its discovery operation"
        );
        return;
    }

    let result = match conn
        .call_operation(DISCOVERY_OPERATION, serde_json::json!({}))
        .await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                backend = %conn.backend(),
                error = %e,
                "workflow discovery failed, keeping plain catalog"
            );
            return;
        }
    };

    let entries = workflow_entries(&result.structured_content, &result.content);
    let mut folded = 0usize;
    for entry in entries {
        match serde_json::from_value::<OperationDef>(entry.clone()) {
            Ok(op) => {
                operations.push(op);
                folded += 1;
            }
            Err(e) => {
                tracing::warn!(
                    backend = %conn.backend(),
                    error = %e,
                    "skipping malformed workflow entry"
                );
            }
        }
    }

    if folded > 0 {
        tracing::info!(
            backend = %conn.backend(),
            workflows = folded,
            "folded workflow sub-operations into catalog"
        );
    }
}

/// Locate the workflow list in a discovery result: top-level structured
/// content first, then a JSON document embedded in the first text block.
fn workflow_entries(
    structured: &Option<Value>,
    content: &[crate::protocol::ResultBlock],
) -> Vec<Value> {
    if let Some(data) = structured.as_ref().and_then(|s| s.get("data")) {
        if let Some(list) = data.as_array() {
            return list.clone();
        }
    }

    use crate::protocol::{KnownBlock, ResultBlock};
    for block in content {
        let ResultBlock::Known(KnownBlock::Text { text }) = block else {
            continue;
        };
        let Ok(parsed) = serde_json::from_str::<Value>(text) else {
            continue;
        };
        let data = parsed
            .get("structuredContent")
            .and_then(|s| s.get("data"))
            .or_else(|| parsed.get("data"));
        if let Some(list) = data.and_then(|d| d.as_array()) {
            return list.clone();
        }
    }

    Vec::new()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
