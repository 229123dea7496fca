//! The agent loop.
//!
//! One [`Agent::run`] call is one exchange: admit it past the limiter, check
//! the inbound guardrail, then alternate model calls and tool dispatches
//! until the model produces a final answer or the step budget runs out, and
//! check the outbound guardrail on whatever text results. Every provider
//! call, tool dispatch, and guardrail verdict lands in the trace.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tangent_guard::GuardGate;
use tangent_llm::{
    CompletionRequest, CompletionResponse, Decision, Message, ProviderToolMap, SharedBackend,
    ToolInclusion, Usage, parse_decision,
};
use tangent_types::{GuardStage, ToolDef, TraceEventBody, TraceSink};

use crate::catalog::ToolCatalog;
use crate::error::Result;
use crate::limiter::ExchangeLimiter;

/// Environment variable overriding the step budget.
pub const MAX_STEPS_ENV: &str = "AGENT_MAX_STEPS";

/// Default number of model calls per exchange.
pub const DEFAULT_MAX_STEPS: u32 = 3;

/// Default generation budget per model call.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Terminal text when the loop exhausts its step budget.
pub const STEP_BUDGET_MESSAGE: &str =
    "Agent reached the maximum number of steps without producing a final answer.";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Per-agent settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model passed through to the provider backend.
    pub model: String,
    /// Maximum model calls per exchange.
    pub max_steps: u32,
    /// Generation budget per model call.
    pub max_tokens: u32,
    /// Which catalog tools ride along on requests.
    pub tools: ToolInclusion,
    /// Extra operator instructions prefixed to the system prompt.
    pub system_prompt: Option<String>,
}

impl AgentConfig {
    /// Create a config for the given model with defaults everywhere else.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_steps: max_steps_from_env(),
            max_tokens: DEFAULT_MAX_TOKENS,
            tools: ToolInclusion::default(),
            system_prompt: None,
        }
    }

    /// Override the step budget. Values below 1 are clamped to 1.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Override the tool inclusion policy.
    pub fn with_tools(mut self, tools: ToolInclusion) -> Self {
        self.tools = tools;
        self
    }

    /// Prefix operator instructions to the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Step budget from `AGENT_MAX_STEPS`, falling back to the default.
pub fn max_steps_from_env() -> u32 {
    std::env::var(MAX_STEPS_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(DEFAULT_MAX_STEPS)
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// What one exchange produced.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final text shown to the user.
    pub text: String,
    /// Correlation id for the exchange.
    pub conversation_id: String,
    /// Model calls actually made.
    pub steps: u32,
    /// Tool dispatches actually made.
    pub tool_calls: u32,
    /// True when the loop ended on the step budget rather than a final answer.
    pub step_budget_exhausted: bool,
    /// True when a guardrail blocked the input or the output.
    pub blocked: bool,
    /// Token usage summed over all model calls.
    pub usage: Usage,
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// The orchestrator: one backend, one catalog, an optional guardrail gate.
pub struct Agent {
    backend: SharedBackend,
    catalog: Arc<ToolCatalog>,
    guard: Option<Arc<GuardGate>>,
    limiter: ExchangeLimiter,
    config: AgentConfig,
}

impl Agent {
    pub fn new(backend: SharedBackend, catalog: Arc<ToolCatalog>, config: AgentConfig) -> Self {
        Self {
            backend,
            catalog,
            guard: None,
            limiter: ExchangeLimiter::default(),
            config,
        }
    }

    /// Wrap exchanges in guardrail checks.
    pub fn with_guard(mut self, guard: Arc<GuardGate>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Share an admission limiter across agents.
    pub fn with_limiter(mut self, limiter: ExchangeLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one exchange from a single user message.
    pub async fn run(&self, user_message: &str, trace: &dyn TraceSink) -> Result<AgentOutcome> {
        self.run_messages(vec![Message::user(user_message)], trace)
            .await
    }

    /// Run one exchange appending to caller-owned history.
    ///
    /// The last user turn is what the inbound guardrail inspects.
    pub async fn run_messages(
        &self,
        history: Vec<Message>,
        trace: &dyn TraceSink,
    ) -> Result<AgentOutcome> {
        let _permit = self.limiter.try_admit()?;

        self.catalog.ensure_discovered().await;
        self.catalog.record_snapshot(trace);
        self.catalog.reset_call_cache();

        let conversation_id = uuid::Uuid::new_v4().to_string();
        let mut outcome = AgentOutcome {
            text: String::new(),
            conversation_id: conversation_id.clone(),
            steps: 0,
            tool_calls: 0,
            step_budget_exhausted: false,
            blocked: false,
            usage: Usage::default(),
        };

        // Inbound gate runs on the latest user turn, before any provider call.
        if let Some(guard) = &self.guard {
            let inbound = history
                .iter()
                .rev()
                .find(|m| m.role == tangent_llm::Role::User)
                .map(|m| m.content.to_text())
                .unwrap_or_default();
            let verdict = guard
                .check(GuardStage::In, &inbound, Some(&conversation_id), trace)
                .await?;
            if !verdict.allowed {
                outcome.blocked = true;
                outcome.text = verdict
                    .reason
                    .unwrap_or_else(|| "This prompt was blocked by policy.".to_string());
                return Ok(outcome);
            }
        }

        let defs = self.catalog.definitions();
        let selected = self.config.tools.select(&defs);
        let map = ProviderToolMap::build(&selected);
        let native = self.backend.supports_native_tools() && !map.is_empty();
        let system = self.render_system_prompt(&map, native);

        let mut messages = history;
        let mut final_text: Option<String> = None;

        for step in 1..=self.config.max_steps {
            let mut request =
                CompletionRequest::new(&self.config.model, messages.clone(), self.config.max_tokens)
                    .with_system(system.clone());
            if native {
                request = request.with_tools(map.definitions().to_vec());
            }

            let response = self.call_provider(request, step, trace).await?;
            outcome.steps = step;
            outcome.usage.input_tokens += response.usage.input_tokens;
            outcome.usage.output_tokens += response.usage.output_tokens;

            if native && response.has_tool_use() {
                self.handle_native_tool_uses(&response, &map, &defs, &mut messages, &mut outcome, trace)
                    .await;
                continue;
            }

            if native {
                final_text = Some(response.text());
                break;
            }

            match parse_decision(&response.text()) {
                Decision::Final { content } => {
                    final_text = Some(content);
                    break;
                }
                Decision::Tool { name, arguments } => {
                    self.handle_prompt_tool_call(
                        &response, &map, &defs, name, arguments, &mut messages, &mut outcome, trace,
                    )
                    .await;
                }
            }
        }

        let mut text = match final_text {
            Some(text) => text,
            None => {
                tracing::warn!(steps = self.config.max_steps, "step budget exhausted");
                outcome.step_budget_exhausted = true;
                STEP_BUDGET_MESSAGE.to_string()
            }
        };

        // Outbound gate runs on whatever text the loop produced.
        if let Some(guard) = &self.guard {
            let verdict = guard
                .check(GuardStage::Out, &text, Some(&conversation_id), trace)
                .await?;
            if !verdict.allowed {
                outcome.blocked = true;
                text = verdict
                    .redacted_payload
                    .or(verdict.reason)
                    .unwrap_or_else(|| "This response was blocked by policy.".to_string());
            }
        }

        outcome.text = text;
        Ok(outcome)
    }

    async fn call_provider(
        &self,
        request: CompletionRequest,
        step: u32,
        trace: &dyn TraceSink,
    ) -> Result<CompletionResponse> {
        let meta = json!({
            "message_count": request.messages.len(),
            "tool_count": request.tools.len(),
        });
        let started = Instant::now();
        let result = self.backend.complete(request).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => trace.record(TraceEventBody::ProviderCall {
                provider: self.backend.name().to_string(),
                model: self.config.model.clone(),
                latency_ms,
                step,
                request: Some(meta),
                stop_reason: response.stop_reason.map(|r| format!("{r:?}")),
                error: None,
            }),
            Err(e) => trace.record(TraceEventBody::ProviderCall {
                provider: self.backend.name().to_string(),
                model: self.config.model.clone(),
                latency_ms,
                step,
                request: Some(meta),
                stop_reason: None,
                error: Some(e.to_string()),
            }),
        }

        Ok(result?)
    }

    /// Execute every tool use in a native response and fold the results back
    /// into the conversation as `tool_result` blocks.
    async fn handle_native_tool_uses(
        &self,
        response: &CompletionResponse,
        map: &ProviderToolMap,
        defs: &[ToolDef],
        messages: &mut Vec<Message>,
        outcome: &mut AgentOutcome,
        trace: &dyn TraceSink,
    ) {
        messages.push(Message::assistant_blocks(response.content.clone()));

        let mut repeated = false;
        for tool_use in response.tool_uses() {
            let name = self.canonical_name(map, defs, &tool_use.name);
            let dispatched = self.catalog.dispatch(&name, tool_use.input, trace).await;
            outcome.tool_calls += 1;
            repeated |= dispatched.repeated;
            messages.push(Message::tool_result(
                tool_use.id,
                dispatched.result.to_model_content(),
                dispatched.result.is_error(),
            ));
        }

        if repeated {
            messages.push(Message::user(repeat_nudge()));
        }
    }

    /// Execute one decision-JSON tool call from a prompt-based backend and
    /// fold the result back as a `TOOL_RESULT` user message.
    #[allow(clippy::too_many_arguments)]
    async fn handle_prompt_tool_call(
        &self,
        response: &CompletionResponse,
        map: &ProviderToolMap,
        defs: &[ToolDef],
        name: String,
        arguments: serde_json::Value,
        messages: &mut Vec<Message>,
        outcome: &mut AgentOutcome,
        trace: &dyn TraceSink,
    ) {
        messages.push(Message::assistant(response.text()));

        let canonical = self.canonical_name(map, defs, &name);
        let dispatched = self.catalog.dispatch(&canonical, arguments.clone(), trace).await;
        outcome.tool_calls += 1;

        let folded = json!({
            "tool": canonical,
            "input": arguments,
            "output": dispatched.result.to_model_content(),
            "is_error": dispatched.result.is_error(),
        });
        let mut body = format!("TOOL_RESULT\n{folded}");
        if dispatched.repeated {
            body.push('\n');
            body.push_str(repeat_nudge());
        }
        messages.push(Message::user(body));
    }

    /// Translate a provider-facing tool name back to the catalog name. A name
    /// the map does not know is passed through so the catalog can answer with
    /// its own unknown-tool error.
    fn canonical_name(&self, map: &ProviderToolMap, defs: &[ToolDef], provider_name: &str) -> String {
        match map.resolve(provider_name) {
            Ok(tool_id) => defs
                .iter()
                .find(|d| d.id == tool_id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| provider_name.to_string()),
            Err(_) => provider_name.to_string(),
        }
    }

    fn render_system_prompt(&self, map: &ProviderToolMap, native: bool) -> String {
        let mut prompt = String::new();
        if let Some(custom) = &self.config.system_prompt {
            prompt.push_str(custom);
            prompt.push_str("\n\n");
        }
        prompt.push_str("You are a helpful assistant.");

        if map.is_empty() {
            prompt.push_str(
                "\n\nNo tools are available. Answer directly from your own knowledge.",
            );
            return prompt;
        }

        prompt.push_str("\n\nAvailable tools:\n");
        for def in map.definitions() {
            prompt.push_str(&format!("- {}: {}\n", def.name, def.description));
        }

        if !native {
            prompt.push_str(
                "\nAnswer with exactly one JSON object and nothing else.\n\
                 To call a tool: {\"type\": \"tool\", \"name\": \"<tool name>\", \"arguments\": {...}}\n\
                 To answer the user: {\"type\": \"final\", \"content\": \"<your answer>\"}\n\
                 After a TOOL_RESULT message, use its output to continue.",
            );
        }
        prompt
    }
}

fn repeat_nudge() -> &'static str {
    "That tool was already called with the same input; its result is shown above. \
     Answer the user now."
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
