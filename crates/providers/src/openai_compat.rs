//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, and any other endpoint that
//! follows the OpenAI chat completions contract.

use serde_json::Value;

use sy_domain::config::LlmConfig;
use sy_domain::error::{Error, Result};
use sy_domain::message::{ChatMessage, ToolInvocation};
use sy_domain::operation::OperationDef;

use crate::traits::{ChatRequest, ChatResponse, LlmProvider, Usage};
use crate::util::from_reqwest;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    default_temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider from config. The API key is read once from the
    /// configured env var; an unset var means unauthenticated requests
    /// (local endpoints).
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %cfg.api_key_env,
                "LLM API key env var unset — sending unauthenticated requests"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.model.clone(),
            default_temperature: cfg.temperature,
            client,
        })
    }

    fn build_chat_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": req.model.clone().unwrap_or_else(|| self.default_model.clone()),
            "messages": messages,
        });

        if !req.operations.is_empty() {
            let tools: Vec<Value> = req.operations.iter().map(operation_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        body["temperature"] = serde_json::json!(req.temperature.unwrap_or(self.default_temperature));
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(&req);

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "openai_compat".into(),
                message: format!("HTTP {status}: {body_text}"),
            });
        }

        let json: Value = resp.json().await.map_err(from_reqwest)?;
        parse_chat_response(&json)
    }

    fn provider_id(&self) -> &str {
        "openai_compat"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_openai(msg: &ChatMessage) -> Value {
    match msg {
        ChatMessage::System { text } => serde_json::json!({
            "role": "system",
            "content": text,
        }),
        ChatMessage::Human { body } => serde_json::json!({
            "role": "user",
            "content": body.flatten(),
        }),
        ChatMessage::Ai { body, invocations } => {
            let mut obj = serde_json::json!({ "role": "assistant" });
            let text = body.flatten();
            obj["content"] = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
            if !invocations.is_empty() {
                let calls: Vec<Value> = invocations
                    .iter()
                    .map(|inv| {
                        serde_json::json!({
                            "id": inv.id,
                            "type": "function",
                            "function": {
                                "name": inv.name,
                                "arguments": inv.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                obj["tool_calls"] = Value::Array(calls);
            }
            obj
        }
        ChatMessage::ToolResult {
            invocation_id,
            body,
            ..
        } => serde_json::json!({
            "role": "tool",
            "tool_call_id": invocation_id,
            "content": body.flatten(),
        }),
    }
}

fn operation_to_openai(op: &OperationDef) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": op.name,
            "description": op.description,
            "parameters": op.input_schema,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: "openai_compat".into(),
        message: "no message in choice".into(),
    })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(ChatResponse {
        content,
        invocations: parse_tool_calls(message),
        usage: body.get("usage").and_then(parse_usage),
        model,
        finish_reason,
    })
}

fn parse_tool_calls(message: &Value) -> Vec<ToolInvocation> {
    let Some(arr) = message.get("tool_calls").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|tc| {
            let id = tc.get("id")?.as_str()?.to_string();
            let function = tc.get("function")?;
            let name = function.get("name")?.as_str()?.to_string();
            let raw_args = function
                .get("arguments")
                .and_then(|v| v.as_str())
                .unwrap_or("{}");
            let arguments = serde_json::from_str(raw_args).unwrap_or_else(|e| {
                tracing::warn!(
                    call_id = %id,
                    tool = %name,
                    error = %e,
                    "tool call arguments are not valid JSON; defaulting to empty object"
                );
                Value::Object(Default::default())
            });
            Some(ToolInvocation {
                id,
                name,
                arguments,
            })
        })
        .collect()
}

fn parse_usage(usage: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: usage.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: usage.get("completion_tokens")?.as_u64().unwrap_or(0) as u32,
        total_tokens: usage.get("total_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
