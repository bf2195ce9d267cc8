//! Flattening of structured tool results into text for LLM context.

use crate::protocol::{KnownBlock, ResultBlock, ToolCallResult};

/// Fallback when a tool returns an empty result.
const EMPTY_RESULT: &str = "Tool executed successfully but did not return any content.";

/// Flatten a structured MCP result into a concise string.
///
/// Text blocks are joined by blank lines; resource links render as
/// `uri — description`; embedded resources and unknown blocks fall back to
/// raw JSON so nothing is lost. `structuredContent`, when present, is
/// appended as pretty-printed JSON. Error results are prefixed with
/// `[mcp:error]`.
pub fn format_tool_result(result: &ToolCallResult) -> String {
    let mut blocks: Vec<String> = result.content.iter().map(render_block).collect();

    if let Some(structured) = &result.structured_content {
        blocks.push(serde_json::to_string_pretty(structured).unwrap_or_default());
    }

    let mut cleaned = blocks
        .into_iter()
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if cleaned.is_empty() {
        cleaned = EMPTY_RESULT.to_owned();
    }

    if result.is_error {
        format!("[mcp:error]\n{cleaned}")
    } else {
        cleaned
    }
}

fn render_block(block: &ResultBlock) -> String {
    match block {
        ResultBlock::Known(KnownBlock::Text { text }) => text.trim().to_owned(),
        ResultBlock::Known(KnownBlock::ResourceLink { uri, description }) => {
            match description.as_deref().map(str::trim) {
                Some(desc) if !desc.is_empty() => format!("{uri} — {desc}"),
                _ => uri.clone(),
            }
        }
        ResultBlock::Known(KnownBlock::Resource { resource }) => {
            serde_json::to_string(resource).unwrap_or_default()
        }
        ResultBlock::Known(KnownBlock::Image { annotations }) => {
            annotated_placeholder("[image]", annotations)
        }
        ResultBlock::Known(KnownBlock::Audio { annotations }) => {
            annotated_placeholder("[audio]", annotations)
        }
        ResultBlock::Other(value) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn annotated_placeholder(tag: &str, annotations: &Option<serde_json::Value>) -> String {
    let title = annotations
        .as_ref()
        .and_then(|a| a.get("title"))
        .and_then(|t| t.as_str())
        .unwrap_or("");
    if title.is_empty() {
        tag.to_owned()
    } else {
        format!("{tag} {title}")
    }
}
