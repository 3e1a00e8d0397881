//! The ReAct loop: alternate model calls and tool calls until the model
//! ends its turn or the iteration budget runs out.
//!
//! Two entry points share one state machine:
//!
//! - [`ReactAgent::run`] returns the final [`Response`]
//! - [`ReactAgent::stream`] yields [`StreamEvent`]s as they happen
//!
//! Provider faults propagate to the caller unchanged. Tool faults never
//! do: the registry turns them into failed results the model gets to see.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use kestrel_config::AppConfig;
use kestrel_core::agent::{Agent, AgentConfig};
use kestrel_core::error::Result;
use kestrel_core::event::{DomainEvent, EventBus};
use kestrel_core::memory::Memory;
use kestrel_core::message::{ContentBlock, Message, ToolUse};
use kestrel_core::provider::{Provider, ProviderRequest, Response, StopReason, ToolSchema};
use kestrel_core::stream::StreamEvent;
use kestrel_core::tool::{ToolContext, ToolRegistry, ToolResult};
use kestrel_core::usage::UsageTracker;
use kestrel_memory::ShortTermMemory;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::collector::StreamCollector;

/// Longest tool output carried by a streamed `ToolResult` event.
pub const TOOL_PREVIEW_CHARS: usize = 200;

const MAX_ITERATIONS_TEXT: &str = "Maximum iterations reached";

struct AgentState {
    memory: Box<dyn Memory>,
    usage: UsageTracker,
}

/// A single agent running the ReAct loop over its own memory.
///
/// The provider and tool registry may be shared between agents; the
/// memory belongs to this agent alone. Concurrent calls on one agent are
/// serialized.
pub struct ReactAgent {
    config: AgentConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    state: Mutex<AgentState>,
    event_bus: Option<Arc<EventBus>>,
}

impl ReactAgent {
    /// Create an agent with a default [`ShortTermMemory`].
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        let mut memory = ShortTermMemory::default();
        if let Some(model) = provider.model() {
            memory = memory.with_model(model);
        }
        Self {
            config,
            provider,
            tools,
            state: Mutex::new(AgentState {
                memory: Box::new(memory),
                usage: UsageTracker::default(),
            }),
            event_bus: None,
        }
    }

    /// Build an agent from the `[agent]` and `[memory]` sections.
    pub fn from_config(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: &AppConfig) -> Self {
        let mut memory_config = config.memory.clone();
        if memory_config.model.is_none() {
            memory_config.model = provider.model().map(str::to_string);
        }
        Self::new(provider, tools, config.agent.clone()).with_memory(ShortTermMemory::from_config(&memory_config))
    }

    /// Replace the memory this agent owns.
    pub fn with_memory(mut self, memory: impl Memory + 'static) -> Self {
        self.state.get_mut().memory = Box::new(memory);
        self
    }

    /// Publish loop events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Context window used for usage percentages.
    pub fn with_context_limit(mut self, context_limit: u64) -> Self {
        self.state.get_mut().usage.context_limit = context_limit;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Snapshot of the conversation so far, for persistence.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.memory.get_messages()
    }

    pub async fn clear_memory(&self) {
        self.state.lock().await.memory.clear();
    }

    pub async fn usage(&self) -> UsageTracker {
        self.state.lock().await.usage
    }

    /// Run the loop to completion.
    ///
    /// Returns a response whose stop reason is `EndTurn`, or a synthetic
    /// `MaxIterations` response when the budget runs out.
    pub async fn run(&self, query: &str) -> Result<Response> {
        let span = info_span!("agent.run", agent = %self.config.name);
        self.run_loop(query).instrument(span).await
    }

    async fn run_loop(&self, query: &str) -> Result<Response> {
        let mut state = self.state.lock().await;
        self.begin_turn(&mut state, query);

        let schemas = self.tool_schemas();
        let ctx = self.tool_context();

        for iteration in 1..=self.config.max_iterations {
            debug!(iteration, "Agent loop iteration");
            let request = self.request(&state, schemas.clone());
            let response = self.provider.complete(request).await?;
            self.record_response(&mut state, iteration, response.stop_reason, response.usage);

            state.memory.add(Message::assistant_blocks(response.content.clone()));

            match response.stop_reason {
                StopReason::EndTurn => {
                    info!(iteration, "Agent finished");
                    return Ok(response);
                }
                StopReason::MaxIterations => {
                    warn!(iteration, "Provider reported max_iterations, ending run");
                    return Ok(response);
                }
                StopReason::ToolUse => {
                    let calls: Vec<ToolUse> = response.tool_uses().into_iter().cloned().collect();
                    if calls.is_empty() {
                        warn!(iteration, "tool_use stop without tool calls");
                        continue;
                    }
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let result = self.execute_tool(call, &ctx).await;
                        results.push(ContentBlock::tool_result(&call.id, result.output, !result.success));
                    }
                    state.memory.add(Message::tool_results(results));
                }
            }
        }

        warn!(max_iterations = self.config.max_iterations, "Max iterations reached");
        Ok(max_iterations_response())
    }

    /// Run the loop, yielding events as they happen.
    ///
    /// Text deltas and tool-call starts are re-yielded as the provider
    /// sends them; each tool call is bracketed by `ToolExecuting` and
    /// `ToolResult` (output cut to [`TOOL_PREVIEW_CHARS`]). The last event
    /// is `MessageStop` with `EndTurn` or `MaxIterations`.
    ///
    /// Dropping the stream early leaves memory holding only complete
    /// turns: an assistant tool-call turn is committed together with its
    /// results.
    pub fn stream<'a>(&'a self, query: &'a str) -> BoxStream<'a, Result<StreamEvent>> {
        let span = info_span!("agent.stream", agent = %self.config.name);
        let mut body: BoxStream<'a, Result<StreamEvent>> = Box::pin(async_stream::try_stream! {
            let mut state = self.state.lock().await;
            self.begin_turn(&mut state, query);

            let schemas = self.tool_schemas();
            let ctx = self.tool_context();

            for iteration in 1..=self.config.max_iterations {
                debug!(iteration, "Agent stream iteration");
                let request = self.request(&state, schemas.clone());
                let mut events = self.provider.stream(request).await?;

                let mut collector = StreamCollector::new();
                while let Some(event) = events.recv().await {
                    let event = event?;
                    collector.push(&event);
                    match event {
                        StreamEvent::TextDelta { .. } | StreamEvent::ToolUseStart { .. } => yield event,
                        StreamEvent::MessageStop { .. } => break,
                        StreamEvent::ToolUseInputDelta { .. }
                        | StreamEvent::ToolExecuting { .. }
                        | StreamEvent::ToolResult { .. } => {}
                    }
                }

                let turn = collector.finish();
                self.record_response(&mut state, iteration, turn.stop_reason, turn.usage);
                let calls: Vec<ToolUse> = turn.tool_uses().into_iter().cloned().collect();
                let assistant = (!turn.content.is_empty()).then(|| Message::assistant_blocks(turn.content.clone()));

                match turn.stop_reason {
                    StopReason::EndTurn | StopReason::MaxIterations => {
                        if let Some(message) = assistant {
                            state.memory.add(message);
                        }
                        let usage = state.usage.stats;
                        info!(iteration, total_tokens = usage.total_tokens(), "Agent stream finished");
                        yield StreamEvent::MessageStop { stop_reason: turn.stop_reason, usage: turn.usage };
                        return;
                    }
                    StopReason::ToolUse => {
                        let mut results = Vec::with_capacity(calls.len());
                        for call in &calls {
                            yield StreamEvent::ToolExecuting { tool_name: call.name.clone(), tool_id: call.id.clone() };
                            let result = self.execute_tool(call, &ctx).await;
                            yield StreamEvent::ToolResult {
                                tool_name: call.name.clone(),
                                tool_id: call.id.clone(),
                                success: result.success,
                                output: preview(&result.output),
                            };
                            results.push(ContentBlock::tool_result(&call.id, result.output, !result.success));
                        }
                        if let Some(message) = assistant {
                            state.memory.add(message);
                        }
                        if !results.is_empty() {
                            state.memory.add(Message::tool_results(results));
                        }
                    }
                }
            }

            warn!(max_iterations = self.config.max_iterations, "Max iterations reached");
            yield StreamEvent::MessageStop { stop_reason: StopReason::MaxIterations, usage: None };
        });

        // Enter the span on every poll so the whole loop body is covered.
        Box::pin(stream::poll_fn(move |cx| {
            let _entered = span.enter();
            body.poll_next_unpin(cx)
        }))
    }

    fn begin_turn(&self, state: &mut AgentState, query: &str) {
        state.memory.add(Message::user(query));
        let removed = state.memory.truncate(self.config.max_context_tokens);
        if removed > 0 {
            debug!(removed, remaining = state.memory.len(), "Truncated memory to fit context");
            self.publish(DomainEvent::MemoryTruncated {
                agent: self.config.name.clone(),
                tokens_removed: removed,
                timestamp: Utc::now(),
            });
        }
    }

    fn tool_schemas(&self) -> Option<Vec<ToolSchema>> {
        (!self.tools.is_empty()).then(|| self.tools.get_schemas())
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext::new(&self.config.working_dir, &self.config.session_id)
    }

    fn request(&self, state: &AgentState, tools: Option<Vec<ToolSchema>>) -> ProviderRequest {
        ProviderRequest {
            messages: state.memory.get_messages(),
            tools,
            system: Some(self.config.system_prompt.clone()),
            max_tokens: self.config.max_tokens,
        }
    }

    fn record_response(
        &self,
        state: &mut AgentState,
        iteration: u32,
        stop_reason: StopReason,
        usage: Option<kestrel_core::provider::Usage>,
    ) {
        if let Some(usage) = usage {
            state.usage.add_usage(usage);
        }
        debug!(iteration, %stop_reason, usage = %state.usage.format_usage(), "Provider responded");
        self.publish(DomainEvent::ResponseGenerated {
            agent: self.config.name.clone(),
            provider: self.provider.name().to_string(),
            iteration,
            stop_reason,
            usage,
            timestamp: Utc::now(),
        });
    }

    async fn execute_tool(&self, call: &ToolUse, ctx: &ToolContext) -> ToolResult {
        let start = Instant::now();
        let result = self.tools.execute(&call.name, ctx, call.input.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(tool = %call.name, id = %call.id, success = result.success, duration_ms, "Tool executed");
        self.publish(DomainEvent::ToolExecuted {
            agent: self.config.name.clone(),
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms,
            timestamp: Utc::now(),
        });
        result
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[async_trait::async_trait]
impl Agent for ReactAgent {
    async fn run(&self, query: &str) -> Result<Response> {
        ReactAgent::run(self, query).await
    }
}

impl std::fmt::Debug for ReactAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactAgent")
            .field("name", &self.config.name)
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.names())
            .finish()
    }
}

fn max_iterations_response() -> Response {
    Response::new(
        "max_iterations",
        vec![ContentBlock::text(MAX_ITERATIONS_TEXT)],
        StopReason::MaxIterations,
    )
}

fn preview(output: &str) -> String {
    output.chars().take(TOOL_PREVIEW_CHARS).collect()
}
