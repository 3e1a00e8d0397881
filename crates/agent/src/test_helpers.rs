//! Shared test helpers: scripted providers and canned agents.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kestrel_core::agent::Agent;
use kestrel_core::error::{Error, ProviderError, Result};
use kestrel_core::message::{ContentBlock, ToolUse};
use kestrel_core::provider::{Provider, ProviderRequest, Response, StopReason, Usage};
use kestrel_core::stream::StreamEvent;
use kestrel_core::tool::ToolRegistry;
use kestrel_tools::FunctionTool;
use serde_json::Value;
use tokio::sync::mpsc;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request it was given. Running past the script is an error.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<std::result::Result<Response, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Response>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<std::result::Result<Response, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    fn model(&self) -> Option<&str> {
        Some("mock-model")
    }

    async fn complete(&self, request: ProviderRequest) -> std::result::Result<Response, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::NotConfigured("no more scripted responses".into())))
    }
}

/// A provider whose `stream` replays scripted event lists, one list per call.
pub struct StreamScriptProvider {
    turns: Mutex<VecDeque<Vec<std::result::Result<StreamEvent, ProviderError>>>>,
    calls: AtomicUsize,
}

impl StreamScriptProvider {
    pub fn new(turns: Vec<Vec<StreamEvent>>) -> Self {
        Self::with_results(turns.into_iter().map(|t| t.into_iter().map(Ok).collect()).collect())
    }

    pub fn with_results(turns: Vec<Vec<std::result::Result<StreamEvent, ProviderError>>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for StreamScriptProvider {
    fn name(&self) -> &str {
        "stream_script"
    }

    async fn complete(&self, _request: ProviderRequest) -> std::result::Result<Response, ProviderError> {
        Err(ProviderError::NotConfigured("stream-only provider".into()))
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> std::result::Result<mpsc::Receiver<std::result::Result<StreamEvent, ProviderError>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let events = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("no more scripted turns".into()))?;
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.send(event).await.unwrap();
        }
        Ok(rx)
    }
}

pub fn usage() -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: 5,
    }
}

/// A final text answer.
pub fn text_response(text: &str) -> Response {
    Response::new("msg_text", vec![ContentBlock::text(text)], StopReason::EndTurn).with_usage(usage())
}

/// A response asking for one or more tool calls `(id, name, input)`.
pub fn tool_use_response(calls: Vec<(&str, &str, Value)>) -> Response {
    let content = calls
        .into_iter()
        .map(|(id, name, input)| {
            ContentBlock::ToolUse(ToolUse::new(id, name, input.as_object().cloned().unwrap_or_default()))
        })
        .collect();
    Response::new("msg_tool", content, StopReason::ToolUse).with_usage(usage())
}

/// A registry holding the `echo` tool: `{message}` → `"Echo: {message}"`.
pub fn echo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(FunctionTool::text(
        "echo",
        "Echo a message back",
        serde_json::json!({
            "type": "object",
            "properties": { "message": { "type": "string" } },
            "required": ["message"]
        }),
        |_ctx, args| async move {
            let message = args.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
            format!("Echo: {message}")
        },
    ));
    registry
}

/// What a [`MockAgent`] does when run.
pub enum Reply {
    /// Answer `"<prefix>: <query>"`.
    Echo(&'static str),
    /// Always fail.
    Fail(&'static str),
    /// Sleep, then echo.
    Slow(Duration),
}

/// A canned agent that records the queries it receives.
pub struct MockAgent {
    reply: Reply,
    queries: Mutex<Vec<String>>,
}

impl MockAgent {
    pub fn echo(prefix: &'static str) -> Self {
        Self::new(Reply::Echo(prefix))
    }

    pub fn failing(reason: &'static str) -> Self {
        Self::new(Reply::Fail(reason))
    }

    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn run(&self, query: &str) -> Result<Response> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.reply {
            Reply::Echo(prefix) => Ok(text_response(&format!("{prefix}: {query}"))),
            Reply::Fail(reason) => Err(Error::Internal((*reason).to_string())),
            Reply::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(text_response(&format!("slow: {query}")))
            }
        }
    }
}
