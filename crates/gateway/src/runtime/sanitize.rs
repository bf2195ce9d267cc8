//! Message history sanitizer.
//!
//! The inference endpoint imposes structural invariants that accumulated
//! history does not always satisfy, so every dispatch goes through this
//! pure function first. Output guarantees, applied in order:
//!
//! 1. Every ai message with invocations is immediately followed by exactly
//!    the matching tool-results, in issue order; unmatched tool-results are
//!    dropped, and invocations with no result anywhere are dropped from
//!    their ai message.
//! 2. No two ai messages are adjacent; the later one is dropped.
//! 3. The first non-system message is human; otherwise the most recent
//!    human message is relocated to the front.
//! 4. If no human message survives at all, the latest one is recovered
//!    from the unsanitized input.
//!
//! A windowing pass then keeps system messages plus the last K
//! conversational turns, truncating whole messages only — a turn boundary
//! is a human message, so an invocation is never split from its results.

use std::collections::HashMap;

use sy_domain::message::ChatMessage;
use sy_domain::trace::TraceEvent;

/// Sanitize a history for dispatch. `window_turns` bounds how many
/// human-initiated turns are kept (0 = unbounded).
pub fn sanitize(history: &[ChatMessage], window_turns: usize) -> Vec<ChatMessage> {
    let (mut system, rest): (Vec<ChatMessage>, Vec<ChatMessage>) =
        history.iter().cloned().partition(|m| m.is_system());

    let repaired = repair_adjacency(rest);
    let repaired = drop_adjacent_ai(repaired);
    let repaired = ensure_leading_human(repaired, history);
    let windowed = window(repaired, window_turns);

    system.extend(windowed);
    system
}

// ── Guarantee 1: invocation/result adjacency ───────────────────────

fn repair_adjacency(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    // Index every tool result by invocation id, first occurrence wins.
    let mut results: HashMap<String, ChatMessage> = HashMap::new();
    for msg in &messages {
        if let ChatMessage::ToolResult { invocation_id, .. } = msg {
            results
                .entry(invocation_id.clone())
                .or_insert_with(|| msg.clone());
        }
    }

    let total_results = results.len();
    let mut out = Vec::with_capacity(messages.len());
    let mut dropped_invocations = 0usize;

    for msg in messages {
        match msg {
            // Re-inserted next to their ai message below.
            ChatMessage::ToolResult { .. } => {}
            ChatMessage::Ai { body, invocations } if !invocations.is_empty() => {
                let mut kept = Vec::with_capacity(invocations.len());
                let mut matched = Vec::with_capacity(invocations.len());
                for inv in invocations {
                    match results.remove(&inv.id) {
                        Some(result) => {
                            matched.push(result);
                            kept.push(inv);
                        }
                        None => dropped_invocations += 1,
                    }
                }
                if kept.is_empty() && body.is_empty() {
                    // Nothing left worth sending.
                    continue;
                }
                out.push(ChatMessage::Ai {
                    body,
                    invocations: kept,
                });
                out.extend(matched);
            }
            other => out.push(other),
        }
    }

    // Whatever is still in the map matched no ai message: orphans.
    let orphans = results.len();
    if orphans > 0 || dropped_invocations > 0 {
        TraceEvent::SanitizerRepair {
            kind: "invocation_adjacency".into(),
            dropped: orphans + dropped_invocations,
        }
        .emit();
        tracing::debug!(
            orphans,
            dropped_invocations,
            matched = total_results - orphans,
            "repaired invocation/result adjacency"
        );
    }

    out
}

// ── Guarantee 2: no adjacent ai messages ───────────────────────────

/// After the adjacency pass, an ai message directly followed by another ai
/// is always a plain one (an ai with matched invocations has its results
/// right behind it). Dropping the later ai would orphan the later one's
/// tool results when it carries invocations, undoing guarantee 1; in
/// that case the plain earlier message is dropped instead.
fn drop_adjacent_ai(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = Vec::with_capacity(messages.len());
    let mut dropped = 0usize;

    for msg in messages {
        if msg.is_ai() && out.last().map(ChatMessage::is_ai).unwrap_or(false) {
            dropped += 1;
            if msg.invocations().is_empty() {
                continue;
            }
            out.pop();
        }
        out.push(msg);
    }

    if dropped > 0 {
        TraceEvent::SanitizerRepair {
            kind: "adjacent_ai".into(),
            dropped,
        }
        .emit();
    }
    out
}

// ── Guarantees 3 & 4: leading human message ────────────────────────

fn ensure_leading_human(
    mut messages: Vec<ChatMessage>,
    unsanitized: &[ChatMessage],
) -> Vec<ChatMessage> {
    if messages.first().map(ChatMessage::is_human).unwrap_or(false) {
        return messages;
    }

    // Relocate the most recent human message to the front.
    if let Some(pos) = messages.iter().rposition(ChatMessage::is_human) {
        let human = messages.remove(pos);
        messages.insert(0, human);
        TraceEvent::SanitizerRepair {
            kind: "relocated_human".into(),
            dropped: 0,
        }
        .emit();
        return messages;
    }

    // No human survived; recover the latest one from the raw input rather
    // than send an invalid turn.
    if let Some(human) = unsanitized.iter().rev().find(|m| m.is_human()) {
        messages.insert(0, human.clone());
        TraceEvent::SanitizerRepair {
            kind: "recovered_human".into(),
            dropped: 0,
        }
        .emit();
    }
    messages
}

// ── Windowing ──────────────────────────────────────────────────────

fn window(messages: Vec<ChatMessage>, window_turns: usize) -> Vec<ChatMessage> {
    if window_turns == 0 {
        return messages;
    }

    let human_count = messages.iter().filter(|m| m.is_human()).count();
    if human_count <= window_turns {
        return messages;
    }

    // Find the start of the Kth-from-last turn and truncate whole
    // messages before it.
    let mut to_skip = human_count - window_turns;
    let mut start = 0usize;
    for (i, msg) in messages.iter().enumerate() {
        if msg.is_human() {
            if to_skip == 0 {
                start = i;
                break;
            }
            to_skip -= 1;
        }
    }

    // Walking past `to_skip` humans always lands on the next human.
    let mut kept = messages;
    let truncated = start;
    kept.drain(..start);
    if truncated > 0 {
        tracing::debug!(truncated, "windowed conversation history");
    }
    kept
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
