//! JSON-RPC 2.0 types for the MCP protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sy_domain::operation::{OperationDef, ResponseHandling};

/// Key under `_meta` where a backend declares response handling for a tool.
pub const RESPONSE_HANDLING_META_KEY: &str = "switchyard_response_handling";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A JSON-RPC 2.0 request (has an `id` — expects a response).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no `id` — fire-and-forget).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Responses
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extract the result value, returning the error object if present.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP-specific payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client info sent during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Parameters for the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: Value,
    pub client_info: ClientInfo,
}

/// Build the `initialize` request parameters.
pub fn initialize_params() -> InitializeParams {
    InitializeParams {
        protocol_version: "2025-03-26".into(),
        capabilities: serde_json::json!({}),
        client_info: ClientInfo {
            name: "switchyard".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        },
    }
}

/// A single tool definition returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
    /// Free-form metadata; response handling lives under
    /// [`RESPONSE_HANDLING_META_KEY`].
    #[serde(default, rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Some backends declare response handling as a direct field instead
    /// of going through `_meta`.
    #[serde(
        default,
        rename = "response_handling",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_handling: Option<Value>,
}

fn default_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl McpToolDef {
    /// Convert to the domain operation definition, resolving response
    /// handling from the direct field first, then `_meta`. Malformed
    /// declarations are dropped with a warning; they are untrusted input.
    pub fn into_operation(self) -> OperationDef {
        let raw = self.response_handling.clone().or_else(|| {
            self.meta
                .as_ref()
                .and_then(|m| m.get(RESPONSE_HANDLING_META_KEY))
                .cloned()
        });

        let response_handling = raw.and_then(|v| {
            match serde_json::from_value::<ResponseHandling>(v) {
                Ok(rh) => Some(rh),
                Err(e) => {
                    tracing::warn!(
                        tool = %self.name,
                        error = %e,
                        "ignoring malformed response_handling declaration"
                    );
                    None
                }
            }
        });

        OperationDef {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            response_handling,
        }
    }
}

/// The result payload from `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<McpToolDef>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// tools/call result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One content block in a `tools/call` response. Unknown block types fall
/// through to the raw JSON so no information is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultBlock {
    Known(KnownBlock),
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownBlock {
    Text {
        text: String,
    },
    ResourceLink {
        uri: String,
        #[serde(default)]
        description: Option<String>,
    },
    Resource {
        resource: Value,
    },
    Image {
        #[serde(default)]
        annotations: Option<Value>,
    },
    Audio {
        #[serde(default)]
        annotations: Option<Value>,
    },
}

/// The result payload from `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ResultBlock>,
    #[serde(default, rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use sy_domain::operation::ResponseMode;

    #[test]
    fn serialize_request() {
        let req = JsonRpcRequest::new(1, "initialize", Some(serde_json::json!({})));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"initialize\""));
    }

    #[test]
    fn serialize_request_without_params() {
        let req = JsonRpcRequest::new(2, "tools/list", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("params"));
    }

    #[test]
    fn serialize_notification() {
        let notif = JsonRpcNotification::new("notifications/initialized");
        let json = serde_json::to_string(&notif).unwrap();
        assert!(json.contains("\"method\":\"notifications/initialized\""));
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn deserialize_error_response() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"Invalid request"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.is_error());
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32600);
    }

    #[test]
    fn tools_list_missing_description_defaults_empty() {
        let raw = r#"{ "tools": [{ "name": "ping" }] }"#;
        let result: ToolsListResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.tools[0].description, "");
        assert_eq!(result.tools[0].input_schema["type"], "object");
    }

    #[test]
    fn response_handling_resolved_from_meta() {
        let raw = r#"{
            "name": "run_forecast",
            "_meta": {
                "switchyard_response_handling": {
                    "mode": "direct",
                    "extract_path": "content[0].text"
                }
            }
        }"#;
        let def: McpToolDef = serde_json::from_str(raw).unwrap();
        let op = def.into_operation();
        let rh = op.response_handling.expect("meta should resolve");
        assert_eq!(rh.mode, ResponseMode::Direct);
    }

    #[test]
    fn direct_field_wins_over_meta() {
        let raw = r#"{
            "name": "run_forecast",
            "response_handling": { "mode": "formatted", "template": "out: {value}" },
            "_meta": { "switchyard_response_handling": { "mode": "direct" } }
        }"#;
        let def: McpToolDef = serde_json::from_str(raw).unwrap();
        let op = def.into_operation();
        assert_eq!(op.response_handling.unwrap().mode, ResponseMode::Formatted);
    }

    #[test]
    fn malformed_response_handling_is_dropped() {
        let raw = r#"{
            "name": "run_forecast",
            "response_handling": { "mode": ["not", "a", "string"] }
        }"#;
        let def: McpToolDef = serde_json::from_str(raw).unwrap();
        assert!(def.into_operation().response_handling.is_none());
    }

    #[test]
    fn tool_call_result_with_structured_content() {
        let raw = r#"{
            "content": [{ "type": "text", "text": "ok" }],
            "structuredContent": { "data": [1, 2, 3] }
        }"#;
        let result: ToolCallResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.content.len(), 1);
        assert!(result.structured_content.is_some());
        assert!(!result.is_error);
    }

    #[test]
    fn unknown_block_type_preserved_as_raw_json() {
        let raw = r#"{ "content": [{ "type": "hologram", "payload": 7 }] }"#;
        let result: ToolCallResult = serde_json::from_str(raw).unwrap();
        match &result.content[0] {
            ResultBlock::Other(v) => assert_eq!(v["payload"], 7),
            ResultBlock::Known(_) => panic!("unknown type must not match a known block"),
        }
    }
}
