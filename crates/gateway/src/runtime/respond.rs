//! Response-handling metadata consumer.
//!
//! Backends may declare, per operation, how their results become turn
//! output: `direct` emits an extracted value verbatim, `formatted` pushes
//! it through a template, `default` leaves the model in charge. The
//! declarations are untrusted input: any failure to extract resolves to
//! `None` and the caller falls back to the raw result text.

use serde_json::Value;

use sy_domain::operation::{ContentType, ResponseHandling, ResponseMode};

/// Default extraction path, matching the common MCP result shape
/// `[{"type":"text","text":...}]` once wrapped under `content`.
const DEFAULT_EXTRACT_PATH: &str = "content[0].text";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve a raw result through its response-handling declaration.
///
/// Returns `Some(output)` only when the declaration short-circuits the
/// model *and* extraction produced a non-empty value. `None` means the
/// caller should use its default handling.
pub fn resolve(handling: &ResponseHandling, raw: &str) -> Option<String> {
    if !handling.short_circuits() {
        return None;
    }

    let path = handling
        .extract_path
        .as_deref()
        .unwrap_or(DEFAULT_EXTRACT_PATH);

    let value = extract(raw, path)?;
    let formatted = format_value(&value, handling.content_type);

    let output = match (handling.mode, &handling.template) {
        (ResponseMode::Formatted, Some(template)) => {
            if template.contains("{value}") {
                template.replace("{value}", &formatted)
            } else {
                tracing::warn!(template = %template, "template lacks {{value}} placeholder, using value directly");
                formatted
            }
        }
        _ => formatted,
    };

    if output.trim().is_empty() {
        None
    } else {
        Some(output)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extract a value from a raw result string using a dotted path with
/// optional indices, e.g. `content[0].text` or `.text`.
///
/// Plain (non-JSON) results only resolve for the bare `content` path.
fn extract(raw: &str, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            // Not structured; the whole text is the only addressable value.
            return if segments.is_empty() || path == "content" {
                Some(Value::String(raw.to_owned()))
            } else {
                tracing::debug!(path, "cannot extract a path from plain text");
                None
            };
        }
    };

    if segments.is_empty() {
        return Some(parsed);
    }

    // Paths rooted at `content` address a wrapper around the result;
    // anything else addresses the parsed document directly.
    let root = if segments[0] == "content" || segments[0].starts_with("content[") {
        serde_json::json!({ "content": parsed })
    } else {
        parsed
    };

    let mut current = root;
    for segment in segments {
        let (key, indices) = parse_segment(segment)?;
        if !key.is_empty() {
            current = current.get(key)?.clone();
        }
        for idx in indices {
            current = current.get(idx)?.clone();
        }
    }
    Some(current)
}

/// Split `key[0][1]` into (`key`, `[0, 1]`). A malformed segment yields
/// `None`, which the caller treats as extraction failure.
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    match segment.find('[') {
        None => Some((segment, Vec::new())),
        Some(open) => {
            let key = &segment[..open];
            let mut indices = Vec::new();
            let mut rest = &segment[open..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped.find(']')?;
                indices.push(stripped[..close].parse().ok()?);
                rest = &stripped[close + 1..];
            }
            if rest.is_empty() {
                Some((key, indices))
            } else {
                None
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Formatting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn format_value(value: &Value, content_type: ContentType) -> String {
    match content_type {
        ContentType::Text => match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
        ContentType::Json => match value {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(parsed) => serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| s.clone()),
                Err(_) => s.clone(),
            },
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        },
        ContentType::Auto => match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
