//! Operation definitions and response-handling metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operation definition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One named, schema-described callable exposed by a backend.
///
/// Names are unique per tenant: the catalog builder drops later duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the operation's input.
    #[serde(default = "default_input_schema")]
    pub input_schema: Value,
    /// Optional response-handling metadata declared by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_handling: Option<ResponseHandling>,
}

fn default_input_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl OperationDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: default_input_schema(),
            response_handling: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response-handling metadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How a tool result should be turned into the turn output.
///
/// Declared by the backend, consumed here. Treated as untrusted input:
/// anything that fails to resolve falls back to the raw result text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseHandling {
    #[serde(default)]
    pub mode: ResponseMode,
    /// Extraction path into the structured result, e.g. `content[0].text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_path: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    /// Template for `formatted` mode; `{value}` is replaced by the
    /// extracted value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl ResponseHandling {
    /// Whether the result bypasses the model entirely.
    pub fn short_circuits(&self) -> bool {
        matches!(self.mode, ResponseMode::Direct | ResponseMode::Formatted)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Let the model process the result.
    #[default]
    Default,
    /// Emit the extracted value verbatim.
    Direct,
    /// Emit the extracted value through a template.
    Formatted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Json,
    #[default]
    Auto,
}
