//! MCP transport layer.
//!
//! Backends speak MCP streamable HTTP: every JSON-RPC message is POSTed to
//! the backend's endpoint, and the response body is either a plain JSON
//! document or a short SSE stream carrying the response as `data:` events.
//! The server may assign a session via the `Mcp-Session-Id` header; once
//! seen, it is echoed on every subsequent request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Header used by streamable-HTTP servers to scope a session.
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Trait for MCP backend transports.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for the corresponding response.
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError>;

    /// Send a JSON-RPC notification (no response expected).
    async fn send_notification(&self, method: &str) -> Result<(), TransportError>;

    /// Check if the transport is still usable.
    fn is_alive(&self) -> bool;

    /// Shut down the transport gracefully.
    async fn shutdown(&self);
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport HTTP error: {0}")]
    Http(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend is unreachable or its session is gone.
    #[error("backend connection closed")]
    ConnectionClosed,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("protocol: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether a rebuild-and-retry is worth attempting for this error.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streamable-HTTP transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Streamable-HTTP transport: one endpoint, request/response over POST.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    extra_headers: HashMap<String, String>,
    session_id: RwLock<Option<String>>,
    next_id: AtomicU64,
    alive: AtomicBool,
}

impl HttpTransport {
    pub fn new(
        url: impl Into<String>,
        headers: Option<HashMap<String, String>>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
            extra_headers: headers.unwrap_or_default(),
            session_id: RwLock::new(None),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn build_post(&self, body: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .body(body.to_owned());

        for (key, value) in &self.extra_headers {
            builder = builder.header(key, value);
        }
        if let Some(session) = self.session_id.read().as_deref() {
            builder = builder.header(SESSION_HEADER, session);
        }
        builder
    }

    /// Remember the session id the server assigned, if any.
    fn capture_session(&self, resp: &reqwest::Response) {
        if let Some(session) = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut guard = self.session_id.write();
            if guard.as_deref() != Some(session) {
                tracing::debug!(url = %self.url, "captured MCP session id");
                *guard = Some(session.to_owned());
            }
        }
    }

    /// A request that could not complete at the network level means the
    /// channel is gone; a timeout is its own class (the backend may still
    /// be healthy, just slow).
    fn classify_send_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            return TransportError::Timeout;
        }
        tracing::debug!(url = %self.url, error = %e, "request failed at transport level");
        self.alive.store(false, Ordering::SeqCst);
        TransportError::ConnectionClosed
    }

    /// Parse a response body that is either plain JSON or a short SSE
    /// stream. For SSE, the response is the first `data:` event whose
    /// JSON-RPC id matches; servers may interleave notifications.
    fn parse_body(
        &self,
        content_type: &str,
        body: &str,
        expected_id: u64,
    ) -> Result<JsonRpcResponse, TransportError> {
        if content_type.starts_with("text/event-stream") {
            for line in body.lines() {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                match serde_json::from_str::<JsonRpcResponse>(data) {
                    Ok(resp) if resp.id == expected_id => return Ok(resp),
                    Ok(resp) => {
                        tracing::debug!(
                            expected_id,
                            got_id = resp.id,
                            "skipping SSE event for different request"
                        );
                    }
                    Err(_) => {
                        tracing::debug!(event = %data, "skipping non-response SSE event");
                    }
                }
            }
            Err(TransportError::Protocol(
                "SSE stream ended without a matching response".into(),
            ))
        } else {
            let resp: JsonRpcResponse = serde_json::from_str(body)?;
            if resp.id != expected_id {
                return Err(TransportError::Protocol(format!(
                    "response id {} does not match request id {expected_id}",
                    resp.id
                )));
            }
            Ok(resp)
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let id = self.next_request_id();
        let req = JsonRpcRequest::new(id, method, params);
        let json = serde_json::to_string(&req)?;

        tracing::debug!(id, method, url = %self.url, "sending MCP request");
        let resp = self
            .build_post(&json)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        self.capture_session(&resp);

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // Streamable HTTP uses 404 to signal an expired session.
            self.alive.store(false, Ordering::SeqCst);
            return Err(TransportError::ConnectionClosed);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_owned();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        self.parse_body(&content_type, &body, id)
    }

    async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let notif = JsonRpcNotification::new(method);
        let json = serde_json::to_string(&notif)?;
        tracing::debug!(method, url = %self.url, "sending MCP notification");

        let resp = self
            .build_post(&json)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        self.capture_session(&resp);

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!(
                "notification rejected: HTTP {status}"
            )));
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);

        // Best-effort session teardown; servers without session support
        // answer 405 and that is fine.
        let session = self.session_id.read().clone();
        if let Some(session) = session {
            let result = self
                .client
                .delete(&self.url)
                .header(SESSION_HEADER, &session)
                .send()
                .await;
            match result {
                Ok(resp) => {
                    tracing::debug!(url = %self.url, status = %resp.status(), "MCP session closed");
                }
                Err(e) => {
                    tracing::debug!(url = %self.url, error = %e, "error closing MCP session");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new("http://localhost:1337/mcp", None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parses_plain_json_body() {
        let t = transport();
        let body = r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#;
        let resp = t.parse_body("application/json", body, 7).unwrap();
        assert_eq!(resp.id, 7);
        assert!(!resp.is_error());
    }

    #[test]
    fn rejects_mismatched_response_id() {
        let t = transport();
        let body = r#"{"jsonrpc":"2.0","id":9,"result":null}"#;
        let err = t.parse_body("application/json", body, 7).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn parses_sse_body_skipping_notifications() {
        let t = transport();
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n",
            "\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"tools\":[]}}\n",
        );
        let resp = t.parse_body("text/event-stream", body, 3).unwrap();
        assert_eq!(resp.id, 3);
    }

    #[test]
    fn sse_without_matching_response_is_protocol_error() {
        let t = transport();
        let body = "data: {\"jsonrpc\":\"2.0\",\"method\":\"noise\"}\n";
        let err = t.parse_body("text/event-stream", body, 1).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[tokio::test]
    async fn dead_transport_refuses_requests() {
        let t = transport();
        t.alive.store(false, Ordering::SeqCst);
        let err = t.send_request("tools/list", None).await.unwrap_err();
        assert!(err.is_closed());
    }
}
