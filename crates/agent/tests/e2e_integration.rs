//! End-to-end tests for the kestrel agent engine.
//!
//! These drive the public API the way an embedding application would: a
//! scripted provider stands in for the model, everything else is real.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use kestrel_agent::{Orchestrator, Pipeline, ReactAgent, RouteSpec, Router, TaskQuery};
use kestrel_core::{
    Agent, AgentConfig, CompositionError, ContentBlock, Error, Memory, OrchestratorConfig, Provider, ProviderError,
    ProviderRequest, Response, Role, SessionStore, StopReason, StreamEvent, ToolRegistry, ToolUse, Usage,
};
use kestrel_memory::{JsonlSessionStore, ShortTermMemory};
use kestrel_tools::{FunctionTool, default_registry};
use serde_json::{Value, json};
use tokio::sync::mpsc;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Replays scripted turns. `complete` pops whole responses; `stream` pops
/// event lists when any are scripted, otherwise falls back to replaying
/// the next response.
#[derive(Default)]
struct ScriptedProvider {
    responses: Mutex<VecDeque<Response>>,
    streams: Mutex<VecDeque<Vec<StreamEvent>>>,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    fn streaming(turns: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            streams: Mutex::new(turns.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<Response, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamEvent, ProviderError>>, ProviderError> {
        let scripted = self.streams.lock().unwrap().pop_front();
        let Some(events) = scripted else {
            let response = self.complete(request).await?;
            let events = StreamEvent::replay(&response);
            let (tx, rx) = mpsc::channel(events.len());
            for event in events {
                tx.send(Ok(event)).await.unwrap();
            }
            return Ok(rx);
        };
        *self.calls.lock().unwrap() += 1;
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.send(Ok(event)).await.unwrap();
        }
        Ok(rx)
    }
}

fn text(answer: &str) -> Response {
    Response::new("msg", vec![ContentBlock::text(answer)], StopReason::EndTurn).with_usage(Usage {
        input_tokens: 12,
        output_tokens: 4,
    })
}

fn call(id: &str, name: &str, input: Value) -> Response {
    let input = input.as_object().cloned().unwrap_or_default();
    Response::new("msg", vec![ContentBlock::ToolUse(ToolUse::new(id, name, input))], StopReason::ToolUse)
}

fn echo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(FunctionTool::text(
        "echo",
        "Echo a message back",
        json!({"type": "object", "properties": {"message": {"type": "string"}}}),
        |_ctx, args| async move { format!("Echo: {}", args.get("message").and_then(Value::as_str).unwrap_or("")) },
    ));
    registry
}

fn agent(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> ReactAgent {
    ReactAgent::new(provider, Arc::new(tools), AgentConfig::default())
}

/// An agent that answers `"<name>: <query>"` and logs the order it ran in.
struct Named {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait::async_trait]
impl Agent for Named {
    async fn run(&self, query: &str) -> kestrel_core::Result<Response> {
        self.log.lock().unwrap().push(self.name);
        Ok(text(&format!("{}: {query}", self.name)))
    }
}

struct Broken;

#[async_trait::async_trait]
impl Agent for Broken {
    async fn run(&self, _query: &str) -> kestrel_core::Result<Response> {
        Err(Error::Internal("stage exploded".into()))
    }
}

// ── E2E: ReAct loop ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_echo_tool_then_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        call("t1", "echo", json!({"message": "hi"})),
        text("done"),
    ]));
    let agent = agent(provider.clone(), echo_registry());

    let response = agent.run("go").await.expect("agent should finish");
    assert_eq!(response.get_text(), "done");
    assert_eq!(response.stop_reason, StopReason::EndTurn);
    assert_eq!(provider.calls(), 2);

    let messages = agent.messages().await;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role(), Role::User);
    assert_eq!(messages[1].role(), Role::Assistant);
    assert_eq!(messages[1].tool_uses().len(), 1);
    assert_eq!(messages[2].role(), Role::User);
    match &messages[2].blocks()[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id, "t1");
            assert_eq!(content, "Echo: hi");
            assert!(!is_error);
        }
        other => panic!("expected a tool result, got {other:?}"),
    }
    assert_eq!(messages[3].get_text(), "done");
}

#[tokio::test]
async fn e2e_loop_never_returns_tool_use() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        call("t1", "echo", json!({"message": "1"})),
        call("t2", "echo", json!({"message": "2"})),
    ]));
    let config = AgentConfig {
        max_iterations: 2,
        ..AgentConfig::default()
    };
    let agent = ReactAgent::new(provider, Arc::new(echo_registry()), config);

    let response = agent.run("loop forever").await.unwrap();
    assert_eq!(response.stop_reason, StopReason::MaxIterations);
    assert_ne!(response.stop_reason, StopReason::ToolUse);
}

#[tokio::test]
async fn e2e_provider_error_reaches_caller() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let agent = agent(provider, ToolRegistry::new());

    let err = agent.run("hello").await.unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::NotConfigured(_))));
}

#[tokio::test]
async fn e2e_file_tools_stay_in_workspace() {
    let workspace = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        call("w", "file_write", json!({"path": "notes/todo.txt", "content": "buy milk"})),
        call("r", "file_read", json!({"path": "notes/todo.txt"})),
        call("x", "file_read", json!({"path": "../outside.txt"})),
        text("saved"),
    ]));
    let config = AgentConfig {
        working_dir: workspace.path().to_string_lossy().into_owned(),
        ..AgentConfig::default()
    };
    let agent = ReactAgent::new(provider, Arc::new(default_registry()), config);

    agent.run("remember to buy milk").await.unwrap();
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("notes/todo.txt")).unwrap(),
        "buy milk"
    );

    let messages = agent.messages().await;
    let result = |idx: usize| match &messages[idx].blocks()[0] {
        ContentBlock::ToolResult { content, is_error, .. } => (content.clone(), *is_error),
        other => panic!("expected a tool result, got {other:?}"),
    };
    assert!(!result(2).1);
    assert!(result(4).0.contains("buy milk"));
    let (denied, is_error) = result(6);
    assert!(is_error);
    assert!(denied.starts_with("Access denied"));
}

// ── E2E: Streaming ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_stream_reassembles_split_arguments() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    let record = seen.clone();
    registry.register(FunctionTool::text("sum", "Record arguments", json!({"type": "object"}), move |_, args| {
        let record = record.clone();
        async move {
            record.lock().unwrap().push(Value::Object(args));
            "ok".to_string()
        }
    }));

    let provider = Arc::new(ScriptedProvider::streaming(vec![
        vec![
            StreamEvent::ToolUseStart {
                id: "t1".into(),
                name: "sum".into(),
            },
            StreamEvent::ToolUseInputDelta {
                id: "t1".into(),
                partial_json: r#"{"a":"#.into(),
            },
            StreamEvent::ToolUseInputDelta {
                id: "t1".into(),
                partial_json: "1}".into(),
            },
            StreamEvent::MessageStop {
                stop_reason: StopReason::ToolUse,
                usage: None,
            },
        ],
        vec![
            StreamEvent::TextDelta { text: "all ".into() },
            StreamEvent::TextDelta { text: "done".into() },
            StreamEvent::MessageStop {
                stop_reason: StopReason::EndTurn,
                usage: None,
            },
        ],
    ]));
    let agent = agent(provider, registry);

    let events: Vec<StreamEvent> = agent.stream("add").map(|e| e.unwrap()).collect().await;
    assert_eq!(*seen.lock().unwrap(), vec![json!({"a": 1})]);
    assert!(matches!(events.last(), Some(StreamEvent::MessageStop { stop_reason: StopReason::EndTurn, .. })));

    let messages = agent.messages().await;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3].get_text(), "all done");
}

#[tokio::test]
async fn e2e_stream_over_complete_only_provider() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        call("t1", "echo", json!({"message": "streamed"})),
        text("finished"),
    ]));
    let agent = agent(provider, echo_registry());

    let events: Vec<StreamEvent> = agent.stream("go").map(|e| e.unwrap()).collect().await;
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            StreamEvent::TextDelta { .. } => "text",
            StreamEvent::ToolUseStart { .. } => "start",
            StreamEvent::ToolUseInputDelta { .. } => "delta",
            StreamEvent::ToolExecuting { .. } => "executing",
            StreamEvent::ToolResult { .. } => "result",
            StreamEvent::MessageStop { .. } => "stop",
        })
        .collect();
    assert_eq!(kinds, vec!["start", "executing", "result", "text", "stop"]);
}

// ── E2E: Composition ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_orchestrator_runs_chain_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut orch = Orchestrator::new(OrchestratorConfig::default());
    for name in ["a", "b", "c"] {
        orch.add_agent(name, Arc::new(Named { name, log: log.clone() }));
    }
    orch.add_task("C", "c", "third", &["B"]).unwrap();
    orch.add_task("A", "a", "first", &[]).unwrap();
    orch.add_task(
        "B",
        "b",
        TaskQuery::dynamic(|ctx| format!("summarize {}", ctx["A"].text())),
        &["A"],
    )
    .unwrap();

    let results = orch.run().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(results["B"].text(), "b: summarize a: first");
}

#[tokio::test]
async fn e2e_orchestrator_cycle_runs_nothing() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut orch = Orchestrator::new(OrchestratorConfig::default());
    orch.add_agent("a", Arc::new(Named { name: "a", log: log.clone() }));
    orch.add_task("A", "a", "x", &["B"]).unwrap();
    orch.add_task("B", "a", "y", &["A"]).unwrap();

    let err = orch.run().await.unwrap_err();
    assert!(matches!(err, Error::Composition(CompositionError::CircularDependency { .. })));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn e2e_pipeline_stops_at_failing_stage() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::default()
        .add_stage("research", Arc::new(Named { name: "research", log: log.clone() }))
        .add_stage("review", Arc::new(Broken))
        .add_stage("publish", Arc::new(Named { name: "publish", log: log.clone() }));

    let result = pipeline.run("topic").await;
    assert!(!result.success);
    assert_eq!(result.stages_completed, 1);
    assert_eq!(result.failed_stage.as_deref(), Some("review"));
    assert_eq!(*log.lock().unwrap(), vec!["research"]);
}

#[tokio::test]
async fn e2e_router_prefers_higher_priority() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::default();
    router
        .add_route(
            "low",
            Arc::new(Named { name: "low", log: log.clone() }),
            RouteSpec::new().keywords(["deploy"]),
        )
        .unwrap();
    router
        .add_route(
            "high",
            Arc::new(Named { name: "high", log: log.clone() }),
            RouteSpec::new().pattern("deploy|release").priority(10),
        )
        .unwrap();

    let result = router.route("please deploy the app").await.unwrap();
    assert_eq!(result.matched_rule.as_deref(), Some("high"));
    assert_eq!(*log.lock().unwrap(), vec!["high"]);
}

#[tokio::test]
async fn e2e_react_agents_compose_in_pipeline() {
    let writer = Arc::new(agent(Arc::new(ScriptedProvider::new(vec![text("draft v1")])), ToolRegistry::new()));
    let editor = Arc::new(agent(Arc::new(ScriptedProvider::new(vec![text("final")])), ToolRegistry::new()));

    let pipeline = Pipeline::default()
        .add_stage("write", writer.clone())
        .add_stage_with("edit", editor.clone(), |original, previous| {
            format!("Edit for '{original}': {}", previous.get_text())
        });

    let result = pipeline.run("a poem").await;
    assert!(result.success);
    assert_eq!(result.final_response.unwrap().get_text(), "final");
    assert_eq!(editor.messages().await[0].get_text(), "Edit for 'a poem': draft v1");
}

// ── E2E: Sessions ───────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_session_resume() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlSessionStore::new(dir.path());
    let session = JsonlSessionStore::new_session_id();

    let first = agent(Arc::new(ScriptedProvider::new(vec![text("nice to meet you")])), ToolRegistry::new());
    first.run("my name is Ada").await.unwrap();
    store.save(&session, &first.messages().await).await.unwrap();

    let history = store.load(&session).await.unwrap();
    assert_eq!(history.len(), 2);

    let provider = Arc::new(ScriptedProvider::new(vec![text("Ada")]));
    let resumed = ReactAgent::new(provider, Arc::new(ToolRegistry::new()), AgentConfig::default())
        .with_memory(ShortTermMemory::default().with_messages(history));
    resumed.run("what is my name?").await.unwrap();

    let messages = resumed.messages().await;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].get_text(), "my name is Ada");

    let mut memory = ShortTermMemory::default().with_messages(messages);
    memory.clear();
    assert!(memory.is_empty());
}
