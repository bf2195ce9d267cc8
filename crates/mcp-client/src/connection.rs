//! One initialized connection to a backend, and the connector seam that
//! produces them.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use sy_domain::backend::BackendDescriptor;
use sy_domain::error::{Error, Result};

use crate::protocol::{self, McpToolDef, ToolCallResult, ToolsListResult};
use crate::transport::{HttpTransport, McpTransport, TransportError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors specific to MCP operations on a connection.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("MCP protocol error: {0}")]
    Protocol(String),
}

impl McpError {
    /// Lift into the shared error type, attaching the owning backend. The
    /// closed-connection class maps to [`Error::Connection`] so the registry
    /// can decide whether a rebuild-and-retry applies.
    pub fn into_domain(self, backend: &str) -> Error {
        match self {
            McpError::Transport(TransportError::ConnectionClosed) => Error::Connection {
                backend: backend.to_owned(),
                message: "connection closed".into(),
            },
            McpError::Transport(TransportError::Timeout) => {
                Error::Timeout(format!("backend '{backend}' did not respond"))
            }
            // Non-2xx answers and malformed payloads mean the backend is
            // reachable; a rebuild would not help.
            McpError::Transport(e) => Error::Other(format!("backend '{backend}': {e}")),
            McpError::Protocol(message) => Error::Other(format!("backend '{backend}': {message}")),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An open, initialized channel to one backend. Exclusively owned by one
/// tenant; never shared across tenants.
pub struct Connection {
    backend: String,
    transport: Box<dyn McpTransport>,
}

impl Connection {
    pub fn new(backend: impl Into<String>, transport: Box<dyn McpTransport>) -> Self {
        Self {
            backend: backend.into(),
            transport,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Fetch the backend's operation catalog via `tools/list`.
    pub async fn list_operations(&self) -> Result<Vec<McpToolDef>> {
        let resp = self
            .transport
            .send_request("tools/list", None)
            .await
            .map_err(|e| McpError::Transport(e).into_domain(&self.backend))?;

        let result = resp
            .into_result()
            .map_err(|e| McpError::Protocol(format!("tools/list failed: {e}")).into_domain(&self.backend))?;

        let parsed: ToolsListResult = serde_json::from_value(result).map_err(|e| {
            McpError::Protocol(format!("failed to parse tools/list result: {e}"))
                .into_domain(&self.backend)
        })?;

        Ok(parsed.tools)
    }

    /// Invoke one operation via `tools/call`.
    pub async fn call_operation(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        if !self.transport.is_alive() {
            return Err(McpError::Transport(TransportError::ConnectionClosed)
                .into_domain(&self.backend));
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let resp = self
            .transport
            .send_request("tools/call", Some(params))
            .await
            .map_err(|e| McpError::Transport(e).into_domain(&self.backend))?;

        let result = resp
            .into_result()
            .map_err(|e| McpError::Protocol(format!("tools/call failed: {e}")).into_domain(&self.backend))?;

        serde_json::from_value::<ToolCallResult>(result).map_err(|e| {
            McpError::Protocol(format!("failed to parse tools/call result: {e}"))
                .into_domain(&self.backend)
        })
    }

    /// Gracefully shut the connection down. Teardown errors are the
    /// transport's problem; this always completes.
    pub async fn close(&self) {
        tracing::debug!(backend = %self.backend, "closing backend connection");
        self.transport.shutdown().await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opens initialized connections from backend descriptors. The trait seam
/// exists so the registry and catalog can be exercised against scripted
/// backends in tests.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, descriptor: &BackendDescriptor) -> Result<Connection>;
}

/// Production connector: streamable HTTP + MCP handshake.
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, descriptor: &BackendDescriptor) -> Result<Connection> {
        tracing::info!(
            backend = %descriptor.name,
            url = %descriptor.url,
            "connecting to backend"
        );
        if let Some(headers) = &descriptor.headers {
            tracing::debug!(
                backend = %descriptor.name,
                header_names = ?headers.keys().collect::<Vec<_>>(),
                "using authentication headers"
            );
        }

        let transport =
            HttpTransport::new(&descriptor.url, descriptor.headers.clone(), self.timeout)
                .map_err(|e| Error::Connection {
                    backend: descriptor.name.clone(),
                    message: e.to_string(),
                })?;

        // Step 1: `initialize` request.
        let init_params = serde_json::to_value(protocol::initialize_params())?;
        let resp = transport
            .send_request("initialize", Some(init_params))
            .await
            .map_err(|e| Error::Connection {
                backend: descriptor.name.clone(),
                message: e.to_string(),
            })?;

        if let Some(err) = resp.error {
            return Err(Error::Connection {
                backend: descriptor.name.clone(),
                message: format!("initialize failed: {err}"),
            });
        }

        // Step 2: `notifications/initialized`.
        transport
            .send_notification("notifications/initialized")
            .await
            .map_err(|e| Error::Connection {
                backend: descriptor.name.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(backend = %descriptor.name, "MCP handshake complete");
        Ok(Connection::new(&descriptor.name, Box::new(transport)))
    }
}
