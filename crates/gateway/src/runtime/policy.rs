//! Lexical intent policies.
//!
//! Two policies live here, both deliberately dumb and both isolated behind
//! one struct so they can be retuned or replaced without touching the turn
//! state machine:
//!
//! - **generation bypass**: does the latest human message ask for brand-new
//!   content with no existing resource referenced? If so, tool binding is
//!   skipped for that decision call.
//! - **continuation**: does the original request look multi-step, and have
//!   enough invocations run to consider it served?
//!
//! Both are best-effort approximations with no ground truth. Thresholds
//! here should not be retuned without checking against real multi-step
//! transcripts.

use regex::{Regex, RegexSet};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Vocabulary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Verbs that read as concrete tool-shaped actions. Matched distinctly:
/// two different verbs in one request is a multi-step signal.
const ACTION_VERBS: &[&str] = &[
    "search", "find", "look up", "refactor", "format", "validate", "analyze",
    "analyse", "generate", "convert", "fix", "scan", "inspect", "list",
    "check", "summarize", "review", "update", "rename", "compare",
];

/// Words that ask for brand-new content.
const GENERATION_WORDS: &[&str] = &[
    "write", "create", "generate", "draft", "compose", "invent", "example",
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Continuation decision
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the continuation heuristic concluded for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationDecision {
    /// The request reads as multi-step.
    pub multi_step: bool,
    /// Rough number of steps the request implies (≥ 1).
    pub estimated_steps: usize,
    /// Enough invocations have executed; the turn can end.
    pub satisfied: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compiled lexical policy. Regexes are built once at construction and the
/// struct is shared read-only across tenants.
pub struct TurnPolicy {
    generation: RegexSet,
    existing_markers: RegexSet,
    connective: Regex,
    action_verbs: RegexSet,
    numbered_item: Regex,
    sentence_split: Regex,
    imperative_start: RegexSet,
}

impl Default for TurnPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnPolicy {
    pub fn new() -> Self {
        let word_patterns = |words: &[&str]| -> Vec<String> {
            words.iter().map(|w| format!(r"(?i)\b{w}\b")).collect()
        };

        Self {
            generation: RegexSet::new(word_patterns(GENERATION_WORDS))
                .expect("static generation patterns compile"),
            existing_markers: RegexSet::new([
                // URL
                r"https?://",
                // path-ish token: dir/file or a file extension
                r"[\w\-.]+/[\w\-./]+",
                r"\b\w+\.[a-zA-Z]{1,4}\b",
                // explicit reference to something that already exists
                r"(?i)\b(existing|current|this (repo|project|codebase|file))\b",
            ])
            .expect("static marker patterns compile"),
            connective: Regex::new(r"(?i)\b(then|next|after(wards)?|also|followed by)\b")
                .expect("static connective pattern compiles"),
            action_verbs: RegexSet::new(word_patterns(ACTION_VERBS))
                .expect("static verb patterns compile"),
            numbered_item: Regex::new(r"(?m)^\s*\d+[.)]\s+").expect("static list pattern compiles"),
            sentence_split: Regex::new(r"[.!?\n]+").expect("static split pattern compiles"),
            imperative_start: RegexSet::new(
                ACTION_VERBS
                    .iter()
                    .map(|w| format!(r"(?i)^(please\s+)?{w}\b"))
                    .collect::<Vec<_>>(),
            )
            .expect("static imperative patterns compile"),
        }
    }

    // ── Generation bypass ──────────────────────────────────────────

    /// True when the message asks to generate something new and references
    /// no existing resource. The decision call then runs without tools.
    pub fn prefers_generation(&self, text: &str) -> bool {
        self.generation.is_match(text) && !self.existing_markers.is_match(text)
    }

    // ── Continuation heuristic ─────────────────────────────────────

    /// Deterministic continuation decision for (original request text,
    /// invocations executed so far this turn).
    pub fn assess(&self, text: &str, executed: usize) -> ContinuationDecision {
        let connectives = self.connective.find_iter(text).count();
        let distinct_verbs = self.action_verbs.matches(text).iter().count();
        let imperative_sentences = self
            .sentence_split
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter(|s| self.imperative_start.is_match(s))
            .count();

        let multi_step = connectives >= 1 || distinct_verbs >= 2 || imperative_sentences >= 2;

        let numbered = self.numbered_item.find_iter(text).count();
        let from_connectives = if connectives > 0 { connectives + 1 } else { 0 };
        let estimated_steps = numbered
            .max(from_connectives)
            .max(distinct_verbs)
            .max(1);

        ContinuationDecision {
            multi_step,
            estimated_steps,
            satisfied: !multi_step || executed >= estimated_steps,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequencing_connective_is_multi_step() {
        let p = TurnPolicy::new();
        let d = p.assess("search for `foo`, then refactor it", 0);
        assert!(d.multi_step);
        assert_eq!(d.estimated_steps, 2);
    }

    #[test]
    fn connective_request_done_after_two_invocations() {
        let p = TurnPolicy::new();
        assert!(!p.assess("search for `foo`, then refactor it", 1).satisfied);
        assert!(p.assess("search for `foo`, then refactor it", 2).satisfied);
    }

    #[test]
    fn single_action_is_single_step() {
        let p = TurnPolicy::new();
        let d = p.assess("search for usages of parse_config", 0);
        assert!(!d.multi_step);
        assert_eq!(d.estimated_steps, 1);
        // Single-step requests never loop, regardless of count.
        assert!(d.satisfied);
    }

    #[test]
    fn two_distinct_verbs_without_connective() {
        let p = TurnPolicy::new();
        let d = p.assess("validate the manifest and format the output", 0);
        assert!(d.multi_step);
        assert!(d.estimated_steps >= 2);
    }

    #[test]
    fn numbered_list_drives_estimate() {
        let p = TurnPolicy::new();
        let text = "Do the following:\n1. scan the repo\n2. fix the warnings\n3. summarize the changes";
        let d = p.assess(text, 0);
        assert!(d.multi_step);
        assert_eq!(d.estimated_steps, 3);
        assert!(!p.assess(text, 2).satisfied);
        assert!(p.assess(text, 3).satisfied);
    }

    #[test]
    fn two_imperative_sentences_are_multi_step() {
        let p = TurnPolicy::new();
        let d = p.assess("Scan the dependency tree. Summarize what changed.", 0);
        assert!(d.multi_step);
    }

    #[test]
    fn plain_question_is_not_multi_step() {
        let p = TurnPolicy::new();
        let d = p.assess("what does the registry do?", 3);
        assert!(!d.multi_step);
        assert!(d.satisfied);
    }

    #[test]
    fn generation_without_reference_bypasses_tools() {
        let p = TurnPolicy::new();
        assert!(p.prefers_generation("write a haiku about connection pools"));
        assert!(p.prefers_generation("generate an example config for a queue"));
    }

    #[test]
    fn generation_with_existing_marker_keeps_tools() {
        let p = TurnPolicy::new();
        assert!(!p.prefers_generation("write tests for src/parser.rs"));
        assert!(!p.prefers_generation("create a summary of https://example.com/notes"));
        assert!(!p.prefers_generation("generate docs for the existing API"));
    }

    #[test]
    fn analysis_request_keeps_tools() {
        let p = TurnPolicy::new();
        assert!(!p.prefers_generation("search the codebase for TODO markers"));
    }
}
