//! Conversation message types.
//!
//! The inference endpoint imposes structural invariants on message order
//! (leading human turn, role alternation, invocation/result adjacency), so
//! messages are modeled as an explicit tagged union rather than role+blob.
//! Upstream transports deliver content as either a plain string or a list
//! of typed blocks; [`MessageBody`] captures both and is normalized to text
//! exactly once, at the boundary where a message enters the system.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool invocations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool invocation emitted by the model (provider-agnostic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message body
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Message content as received from an upstream transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One typed content block in a block-list body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Json { value: Value },
}

impl MessageBody {
    pub fn empty() -> Self {
        MessageBody::Text(String::new())
    }

    /// Flatten to plain text. This is the single normalization step: callers
    /// deeper in the orchestration never inspect block lists themselves.
    pub fn flatten(&self) -> String {
        match self {
            MessageBody::Text(t) => t.clone(),
            MessageBody::Blocks(blocks) => {
                let parts: Vec<String> = blocks
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => text.clone(),
                        ContentBlock::Json { value } => {
                            serde_json::to_string_pretty(value).unwrap_or_default()
                        }
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
                parts.join("\n")
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageBody::Text(t) => t.trim().is_empty(),
            MessageBody::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

impl From<String> for MessageBody {
    fn from(text: String) -> Self {
        MessageBody::Text(text)
    }
}

impl From<&str> for MessageBody {
    fn from(text: &str) -> Self {
        MessageBody::Text(text.to_owned())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System {
        text: String,
    },
    Human {
        body: MessageBody,
    },
    Ai {
        body: MessageBody,
        /// Pending tool invocations. Empty for a plain textual answer.
        #[serde(default)]
        invocations: Vec<ToolInvocation>,
    },
    ToolResult {
        /// Matches the `id` of an invocation in the preceding ai message.
        invocation_id: String,
        /// Operation name, kept for response-handling lookup.
        operation: String,
        body: MessageBody,
        #[serde(default)]
        is_error: bool,
    },
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        ChatMessage::System { text: text.into() }
    }

    pub fn human(body: impl Into<MessageBody>) -> Self {
        ChatMessage::Human { body: body.into() }
    }

    pub fn ai(body: impl Into<MessageBody>) -> Self {
        ChatMessage::Ai {
            body: body.into(),
            invocations: Vec::new(),
        }
    }

    pub fn ai_with_invocations(
        body: impl Into<MessageBody>,
        invocations: Vec<ToolInvocation>,
    ) -> Self {
        ChatMessage::Ai {
            body: body.into(),
            invocations,
        }
    }

    pub fn tool_result(
        invocation_id: impl Into<String>,
        operation: impl Into<String>,
        body: impl Into<MessageBody>,
    ) -> Self {
        ChatMessage::ToolResult {
            invocation_id: invocation_id.into(),
            operation: operation.into(),
            body: body.into(),
            is_error: false,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, ChatMessage::System { .. })
    }

    pub fn is_human(&self) -> bool {
        matches!(self, ChatMessage::Human { .. })
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, ChatMessage::Ai { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, ChatMessage::ToolResult { .. })
    }

    /// Invocations carried by an ai message (empty slice otherwise).
    pub fn invocations(&self) -> &[ToolInvocation] {
        match self {
            ChatMessage::Ai { invocations, .. } => invocations,
            _ => &[],
        }
    }

    /// Flattened textual content of this message.
    pub fn text(&self) -> String {
        match self {
            ChatMessage::System { text } => text.clone(),
            ChatMessage::Human { body }
            | ChatMessage::Ai { body, .. }
            | ChatMessage::ToolResult { body, .. } => body.flatten(),
        }
    }
}
