//! The compiled decision graph and its turn state machine.
//!
//! A graph is compiled per tenant from the tenant's operation catalog and
//! the shared model handle. It is immutable: a rebuild compiles a new one
//! and swaps it in wholesale. Running a turn walks the state machine
//!
//! ```text
//! DECIDE → INVOKE_TOOLS → SYNTHESIZE → {DECIDE | END}
//! ```
//!
//! with zero operations collapsing to `DECIDE → SYNTHESIZE → END`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use sy_domain::config::OrchestratorConfig;
use sy_domain::error::{Error, Result};
use sy_domain::message::{ChatMessage, ToolInvocation};
use sy_domain::operation::OperationDef;
use sy_domain::trace::TraceEvent;
use sy_providers::{ChatRequest, LlmProvider};

use super::policy::TurnPolicy;
use super::respond;
use super::sanitize::sanitize;

/// Prefix the result flattener puts on failed tool executions.
const ERROR_PREFIX: &str = "[mcp:error]";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invoker seam
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Executes one validated invocation against its owning connection. The
/// registry implements this; tests substitute scripted invokers.
#[async_trait]
pub trait OperationInvoker: Send + Sync {
    /// Run the operation and return its flattened result text.
    async fn invoke(&self, tenant: &str, operation: &str, arguments: Value) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Compiled graph
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything one finished turn produced.
#[derive(Debug)]
pub struct GraphRun {
    /// Messages appended during the turn (ai + tool results), for the
    /// checkpoint store.
    pub appended: Vec<ChatMessage>,
    /// The terminal response.
    pub output: String,
    pub invocations_executed: usize,
    pub cycles: u32,
}

/// A compiled, immutable decision graph bound to one tenant's operation
/// set and the shared model handle.
pub struct DecisionGraph {
    provider: Arc<dyn LlmProvider>,
    operations: Arc<Vec<OperationDef>>,
    known: HashSet<String>,
    policy: Arc<TurnPolicy>,
    config: OrchestratorConfig,
    preamble: String,
}

impl std::fmt::Debug for DecisionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionGraph")
            .field("operations", &self.operations)
            .field("known", &self.known)
            .field("config", &self.config)
            .field("preamble", &self.preamble)
            .finish_non_exhaustive()
    }
}

impl DecisionGraph {
    /// Compile a graph. Fails only on a broken catalog (duplicate names
    /// should have been resolved upstream).
    pub fn compile(
        tenant: &str,
        provider: Arc<dyn LlmProvider>,
        operations: Vec<OperationDef>,
        policy: Arc<TurnPolicy>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let mut known = HashSet::new();
        for op in &operations {
            if !known.insert(op.name.clone()) {
                return Err(Error::GraphBuild {
                    tenant: tenant.to_owned(),
                    message: format!("duplicate operation name '{}' in catalog", op.name),
                });
            }
        }

        let preamble = build_preamble(&operations);
        Ok(Self {
            provider,
            operations: Arc::new(operations),
            known,
            policy,
            config,
            preamble,
        })
    }

    pub fn has_operations(&self) -> bool {
        !self.operations.is_empty()
    }

    pub fn operations(&self) -> &[OperationDef] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDef> {
        self.operations.iter().find(|o| o.name == name)
    }

    /// Render the graph shape as a mermaid flowchart.
    pub fn to_mermaid(&self) -> String {
        if self.has_operations() {
            concat!(
                "flowchart TD;\n",
                "    __start__ --> decide;\n",
                "    decide -. invoke .-> invoke_tools;\n",
                "    decide -. respond .-> __end__;\n",
                "    invoke_tools --> synthesize;\n",
                "    synthesize -. continue .-> decide;\n",
                "    synthesize -. done .-> __end__;\n",
            )
            .to_owned()
        } else {
            concat!(
                "flowchart TD;\n",
                "    __start__ --> decide;\n",
                "    decide --> synthesize;\n",
                "    synthesize --> __end__;\n",
            )
            .to_owned()
        }
    }

    // ── Turn state machine ─────────────────────────────────────────

    /// Run one turn. `history` already ends with the triggering human
    /// message; `human_text` is that message's text, used by the lexical
    /// policies.
    pub async fn run_turn(
        &self,
        tenant: &str,
        history: &[ChatMessage],
        human_text: &str,
        invoker: &dyn OperationInvoker,
    ) -> Result<GraphRun> {
        let mut appended: Vec<ChatMessage> = Vec::new();
        let mut output = String::new();
        let mut executed = 0usize;
        let mut cycles = 0u32;
        let mut last_results: Vec<(ToolInvocation, String)> = Vec::new();
        let mut state = TurnState::Decide;

        loop {
            match state {
                TurnState::Decide => {
                    if cycles >= self.config.max_cycles {
                        tracing::warn!(
                            tenant,
                            cycles,
                            "cycle limit reached, ending turn with current output"
                        );
                        state = TurnState::End;
                        continue;
                    }
                    cycles += 1;

                    let resp = self.decide(tenant, history, &appended, human_text).await?;
                    let (valid, unknown) = self.split_invocations(resp.invocations);

                    if !unknown.is_empty() {
                        // Never forward a fabricated name; the whole batch
                        // is discarded and the turn ends with a refusal.
                        for inv in &unknown {
                            TraceEvent::InvocationRejected {
                                tenant: tenant.to_owned(),
                                operation: inv.name.clone(),
                            }
                            .emit();
                        }
                        output = refusal_text(&unknown);
                        appended.push(ChatMessage::ai(output.clone()));
                        state = TurnState::End;
                    } else if valid.is_empty() {
                        if !resp.content.is_empty() {
                            appended.push(ChatMessage::ai(resp.content.clone()));
                        }
                        output = resp.content;
                        state = if self.has_operations() {
                            // Zero invocations terminates the turn.
                            TurnState::End
                        } else {
                            TurnState::Synthesize
                        };
                    } else {
                        for inv in &valid {
                            TraceEvent::InvocationValidated {
                                tenant: tenant.to_owned(),
                                operation: inv.name.clone(),
                            }
                            .emit();
                        }
                        appended.push(ChatMessage::ai_with_invocations(
                            resp.content.clone(),
                            valid.clone(),
                        ));
                        state = TurnState::InvokeTools(valid);
                    }
                }

                TurnState::InvokeTools(invocations) => {
                    last_results.clear();
                    for inv in invocations {
                        let text = invoker
                            .invoke(tenant, &inv.name, inv.arguments.clone())
                            .await?;
                        executed += 1;

                        appended.push(ChatMessage::ToolResult {
                            invocation_id: inv.id.clone(),
                            operation: inv.name.clone(),
                            body: text.clone().into(),
                            is_error: text.starts_with(ERROR_PREFIX),
                        });
                        last_results.push((inv, text));
                    }
                    state = TurnState::Synthesize;
                }

                TurnState::Synthesize => {
                    output = if last_results.is_empty() {
                        let prose = self.synthesize_prose(history, &appended).await?;
                        appended.push(ChatMessage::ai(prose.clone()));
                        prose
                    } else {
                        let text = self.synthesize_from_results(&last_results);
                        appended.push(ChatMessage::ai(text.clone()));
                        text
                    };

                    state = if self.has_operations() {
                        let decision = self.policy.assess(human_text, executed);
                        if decision.satisfied {
                            TurnState::End
                        } else {
                            tracing::debug!(
                                tenant,
                                executed,
                                estimated = decision.estimated_steps,
                                "multi-step request under-served, looping"
                            );
                            TurnState::Decide
                        }
                    } else {
                        TurnState::End
                    };
                }

                TurnState::End => {
                    return Ok(GraphRun {
                        appended,
                        output,
                        invocations_executed: executed,
                        cycles,
                    });
                }
            }
        }
    }

    // ── DECIDE ─────────────────────────────────────────────────────

    async fn decide(
        &self,
        tenant: &str,
        history: &[ChatMessage],
        appended: &[ChatMessage],
        human_text: &str,
    ) -> Result<sy_providers::ChatResponse> {
        let working: Vec<ChatMessage> = history.iter().chain(appended).cloned().collect();
        let sanitized = sanitize(&working, self.config.history_window_turns);

        let mut messages = vec![ChatMessage::system(self.preamble.clone())];
        messages.extend(sanitized);

        // Requests for brand-new content bypass tool binding entirely.
        let bind = self.has_operations() && !self.policy.prefers_generation(human_text);
        if self.has_operations() && !bind {
            tracing::debug!(tenant, "generation request, deciding without tools");
        }

        let req = ChatRequest {
            messages,
            operations: if bind {
                (*self.operations).clone()
            } else {
                Vec::new()
            },
            ..Default::default()
        };
        self.provider.chat(req).await
    }

    fn split_invocations(
        &self,
        invocations: Vec<ToolInvocation>,
    ) -> (Vec<ToolInvocation>, Vec<ToolInvocation>) {
        invocations
            .into_iter()
            .partition(|inv| self.known.contains(&inv.name))
    }

    // ── SYNTHESIZE ─────────────────────────────────────────────────

    /// Turn the most recent invocation results into output: declared
    /// response handling first, raw result text otherwise. Results are
    /// emitted verbatim, never paraphrased.
    fn synthesize_from_results(&self, results: &[(ToolInvocation, String)]) -> String {
        let parts: Vec<String> = results
            .iter()
            .map(|(inv, raw)| {
                self.operation(&inv.name)
                    .and_then(|op| op.response_handling.as_ref())
                    .and_then(|rh| respond::resolve(rh, raw))
                    .unwrap_or_else(|| raw.clone())
            })
            .filter(|s| !s.is_empty())
            .collect();
        parts.join("\n\n")
    }

    /// With no tool result at all, the model produces prose over the
    /// sanitized conversation.
    async fn synthesize_prose(
        &self,
        history: &[ChatMessage],
        appended: &[ChatMessage],
    ) -> Result<String> {
        let working: Vec<ChatMessage> = history.iter().chain(appended).cloned().collect();
        let sanitized = sanitize(&working, self.config.history_window_turns);

        // Only plain conversation goes to the prose call.
        let conversation: Vec<ChatMessage> = sanitized
            .into_iter()
            .filter(|m| m.is_human() || (m.is_ai() && m.invocations().is_empty()))
            .collect();

        let mut messages = vec![ChatMessage::system(SYNTHESIZE_PREAMBLE)];
        messages.extend(conversation);

        let resp = self
            .provider
            .chat(ChatRequest {
                messages,
                ..Default::default()
            })
            .await?;
        Ok(resp.content)
    }
}

enum TurnState {
    Decide,
    InvokeTools(Vec<ToolInvocation>),
    Synthesize,
    End,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const SYNTHESIZE_PREAMBLE: &str = "You are a concise assistant. Answer from the \
conversation so far and keep responses short and factual. Never claim to have \
run an operation or obtained a result you do not actually have.";

fn build_preamble(operations: &[OperationDef]) -> String {
    let mut guides = String::new();
    for op in operations {
        let purpose = if op.description.is_empty() {
            op.name.as_str()
        } else {
            op.description.as_str()
        };
        guides.push_str(&format!("\n- Use operation `{}` for purpose: {}", op.name, purpose));
    }

    format!(
        "You are Switchyard, an assistant that drives remote operations on \
behalf of the user. You have access to the following operations:\n{guides}\n\n\
BEHAVIORAL RULES:\n\
1) Operation usage is purpose-driven — invoke an operation only when the \
request matches its stated purpose; otherwise answer directly from your \
knowledge.\n\
2) Operations are for analyzing or acting on existing resources. When the \
user wants brand-new content generated, answer directly without operations.\n\
3) Never invent operation names. Only the operations listed above exist.\n\
4) When an operation matches, invoke it immediately; do not describe what \
you would do instead of doing it.\n\
5) Prefer operations that return human-readable text over ones that return \
raw structured data.\n\
6) Show operation results exactly as returned. Do not summarize, explain, \
or rephrase them.\n"
    )
}

fn refusal_text(unknown: &[ToolInvocation]) -> String {
    let names: Vec<String> = unknown.iter().map(|i| format!("`{}`", i.name)).collect();
    format!(
        "I can't do that: {} is not among the available operations, so no \
operation was run. Ask me to use one of the operations I actually have, or \
connect the backend that provides it.",
        names.join(", ")
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use sy_domain::operation::{ContentType, ResponseHandling, ResponseMode};
    use sy_providers::ChatResponse;

    /// Provider scripted with a queue of responses; records tool binding.
    struct MockProvider {
        responses: Mutex<Vec<ChatResponse>>,
        calls: AtomicUsize,
        bound: Mutex<Vec<bool>>,
    }

    impl MockProvider {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                bound: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn text_response(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.into(),
            invocations: Vec::new(),
            usage: None,
            model: "mock".into(),
            finish_reason: Some("stop".into()),
        }
    }

    fn invocation_response(invocations: Vec<ToolInvocation>) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            invocations,
            usage: None,
            model: "mock".into(),
            finish_reason: Some("tool_calls".into()),
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bound.lock().push(!req.operations.is_empty());
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Ok(text_response("exhausted"));
            }
            Ok(responses.remove(0))
        }

        fn provider_id(&self) -> &str {
            "mock"
        }
    }

    /// Invoker returning canned text per operation name.
    struct MapInvoker {
        results: std::collections::HashMap<String, String>,
        invoked: Mutex<Vec<String>>,
    }

    impl MapInvoker {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                results: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                invoked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OperationInvoker for MapInvoker {
        async fn invoke(&self, _tenant: &str, operation: &str, _args: Value) -> Result<String> {
            self.invoked.lock().push(operation.to_owned());
            Ok(self
                .results
                .get(operation)
                .cloned()
                .unwrap_or_else(|| "unscripted".into()))
        }
    }

    fn inv(id: &str, name: &str) -> ToolInvocation {
        ToolInvocation {
            id: id.into(),
            name: name.into(),
            arguments: serde_json::json!({}),
        }
    }

    fn graph(provider: Arc<MockProvider>, operations: Vec<OperationDef>) -> DecisionGraph {
        DecisionGraph::compile(
            "u1",
            provider,
            operations,
            Arc::new(TurnPolicy::new()),
            OrchestratorConfig::default(),
        )
        .unwrap()
    }

    fn human(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::human(text)]
    }

    #[tokio::test]
    async fn tool_result_emitted_verbatim() {
        let provider = MockProvider::new(vec![invocation_response(vec![inv("c1", "search_code")])]);
        let g = graph(
            provider.clone(),
            vec![OperationDef::new("search_code", "search the codebase")],
        );
        let invoker = MapInvoker::new(&[("search_code", "3 matches in parser.rs")]);

        let run = g
            .run_turn("u1", &human("search for parse errors"), "search for parse errors", &invoker)
            .await
            .unwrap();

        assert_eq!(run.output, "3 matches in parser.rs");
        assert_eq!(run.invocations_executed, 1);
        // One decide call; synthesis used the raw result, not the model.
        assert_eq!(provider.call_count(), 1);
        // ai(invocations) + tool result + ai(output)
        assert_eq!(run.appended.len(), 3);
    }

    #[tokio::test]
    async fn unknown_operation_refused_without_invoking() {
        let provider = MockProvider::new(vec![invocation_response(vec![inv("c1", "launch_rockets")])]);
        let g = graph(
            provider.clone(),
            vec![OperationDef::new("search_code", "search the codebase")],
        );
        let invoker = MapInvoker::new(&[]);

        let run = g
            .run_turn("u1", &human("launch the rockets"), "launch the rockets", &invoker)
            .await
            .unwrap();

        assert_eq!(run.invocations_executed, 0);
        assert!(invoker.invoked.lock().is_empty());
        assert!(run.output.contains("launch_rockets"));
        assert!(run.output.contains("no operation was run"));
    }

    #[tokio::test]
    async fn zero_invocations_terminates_the_turn() {
        let provider = MockProvider::new(vec![text_response("the registry maps tenants to graphs")]);
        let g = graph(
            provider.clone(),
            vec![OperationDef::new("search_code", "search the codebase")],
        );
        let invoker = MapInvoker::new(&[]);

        let run = g
            .run_turn("u1", &human("what does the registry do?"), "what does the registry do?", &invoker)
            .await
            .unwrap();

        assert_eq!(run.output, "the registry maps tenants to graphs");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(run.invocations_executed, 0);
    }

    #[tokio::test]
    async fn multi_step_request_loops_until_served() {
        let provider = MockProvider::new(vec![
            invocation_response(vec![inv("c1", "search_code")]),
            invocation_response(vec![inv("c2", "refactor_code")]),
        ]);
        let g = graph(
            provider.clone(),
            vec![
                OperationDef::new("search_code", "search the codebase"),
                OperationDef::new("refactor_code", "refactor code"),
            ],
        );
        let invoker = MapInvoker::new(&[
            ("search_code", "found foo in lib.rs"),
            ("refactor_code", "refactored 2 call sites"),
        ]);

        let text = "search for `foo`, then refactor it";
        let run = g.run_turn("u1", &human(text), text, &invoker).await.unwrap();

        assert_eq!(run.invocations_executed, 2);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(*invoker.invoked.lock(), vec!["search_code", "refactor_code"]);
        assert_eq!(run.output, "refactored 2 call sites");
        assert_eq!(run.cycles, 2);
    }

    #[tokio::test]
    async fn direct_mode_short_circuits_synthesis() {
        let provider = MockProvider::new(vec![invocation_response(vec![inv("c1", "get_greeting")])]);
        let mut op = OperationDef::new("get_greeting", "fetch a greeting");
        op.response_handling = Some(ResponseHandling {
            mode: ResponseMode::Direct,
            extract_path: Some(".text".into()),
            content_type: ContentType::Auto,
            template: None,
        });
        let g = graph(provider.clone(), vec![op]);
        let invoker = MapInvoker::new(&[("get_greeting", r#"{"text":"hello"}"#)]);

        let run = g
            .run_turn("u1", &human("get the greeting"), "get the greeting", &invoker)
            .await
            .unwrap();

        assert_eq!(run.output, "hello");
        // No model call for synthesis.
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn broken_extraction_falls_back_to_raw_result() {
        let provider = MockProvider::new(vec![invocation_response(vec![inv("c1", "get_greeting")])]);
        let mut op = OperationDef::new("get_greeting", "fetch a greeting");
        op.response_handling = Some(ResponseHandling {
            mode: ResponseMode::Direct,
            extract_path: Some(".missing".into()),
            content_type: ContentType::Auto,
            template: None,
        });
        let g = graph(provider.clone(), vec![op]);
        let invoker = MapInvoker::new(&[("get_greeting", "raw greeting text")]);

        let run = g
            .run_turn("u1", &human("get the greeting"), "get the greeting", &invoker)
            .await
            .unwrap();

        assert_eq!(run.output, "raw greeting text");
    }

    #[tokio::test]
    async fn zero_operations_runs_decide_then_synthesize() {
        let provider = MockProvider::new(vec![
            text_response("draft answer"),
            text_response("final concise answer"),
        ]);
        let g = graph(provider.clone(), Vec::new());
        let invoker = MapInvoker::new(&[]);

        let run = g
            .run_turn("u1", &human("explain tenancy"), "explain tenancy", &invoker)
            .await
            .unwrap();

        assert_eq!(run.output, "final concise answer");
        assert_eq!(provider.call_count(), 2);
        // Neither call bound tools.
        assert_eq!(*provider.bound.lock(), vec![false, false]);
    }

    #[tokio::test]
    async fn generation_request_decides_without_tools() {
        let provider = MockProvider::new(vec![text_response("a fresh haiku")]);
        let g = graph(
            provider.clone(),
            vec![OperationDef::new("search_code", "search the codebase")],
        );
        let invoker = MapInvoker::new(&[]);

        let text = "write a haiku about caching";
        let run = g.run_turn("u1", &human(text), text, &invoker).await.unwrap();

        assert_eq!(run.output, "a fresh haiku");
        assert_eq!(*provider.bound.lock(), vec![false]);
    }

    #[tokio::test]
    async fn cycle_limit_bounds_the_loop() {
        // The model keeps asking for the same single operation while the
        // request reads as needing three steps.
        let responses: Vec<ChatResponse> = (0..10)
            .map(|i| invocation_response(vec![inv(&format!("c{i}"), "search_code")]))
            .collect();
        let provider = MockProvider::new(responses);
        let g = DecisionGraph::compile(
            "u1",
            provider.clone(),
            vec![
                OperationDef::new("search_code", "search"),
                OperationDef::new("validate_config", "validate"),
                OperationDef::new("format_code", "format"),
            ],
            Arc::new(TurnPolicy::new()),
            OrchestratorConfig {
                max_cycles: 3,
                history_window_turns: 20,
            },
        )
        .unwrap();
        let invoker = MapInvoker::new(&[("search_code", "still searching")]);

        let text = "1. search the repo\n2. validate the config\n3. format everything\n4. check the result";
        let run = g.run_turn("u1", &human(text), text, &invoker).await.unwrap();

        assert_eq!(run.cycles, 3);
        assert_eq!(run.invocations_executed, 3);
    }

    #[test]
    fn duplicate_catalog_names_fail_compilation() {
        let provider = MockProvider::new(vec![]);
        let err = DecisionGraph::compile(
            "u1",
            provider,
            vec![
                OperationDef::new("search_code", "a"),
                OperationDef::new("search_code", "b"),
            ],
            Arc::new(TurnPolicy::new()),
            OrchestratorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::GraphBuild { .. }));
    }

    #[test]
    fn mermaid_shapes_differ_with_and_without_operations() {
        let provider = MockProvider::new(vec![]);
        let with_ops = graph(
            provider.clone(),
            vec![OperationDef::new("search_code", "search")],
        );
        let without_ops = graph(provider, Vec::new());

        assert!(with_ops.to_mermaid().contains("invoke_tools"));
        assert!(!without_ops.to_mermaid().contains("invoke_tools"));
    }

    #[test]
    fn preamble_lists_operations_and_rules() {
        let p = build_preamble(&[OperationDef::new("get_weather", "fetch a forecast")]);
        assert!(p.contains("`get_weather`"));
        assert!(p.contains("fetch a forecast"));
        assert!(p.contains("Never invent operation names"));
    }
}
