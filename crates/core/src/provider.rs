//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to a model and get a response
//! back, either as a complete message or as a stream of events. Vendor
//! authentication, request formatting and response parsing all live behind
//! this trait; the agent loop only sees the shapes defined here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::{ContentBlock, Message, ToolUse, join_text};
use crate::stream::StreamEvent;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// One model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The conversation so far
    pub messages: Vec<Message>,

    /// Available tools; `None` when the agent has no tools registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,

    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

pub(crate) fn default_max_tokens() -> u32 {
    4096
}

/// Why the model (or the loop) stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished its answer.
    EndTurn,
    /// The model wants one or more tools invoked.
    ToolUse,
    /// The loop ran out of iterations; never produced by a provider.
    MaxIterations,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EndTurn => "end_turn",
            Self::ToolUse => "tool_use",
            Self::MaxIterations => "max_iterations",
        };
        f.write_str(s)
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A complete model response. Immutable once handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,

    #[serde(default)]
    pub content: Vec<ContentBlock>,

    pub stop_reason: StopReason,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Response {
    pub fn new(id: impl Into<String>, content: Vec<ContentBlock>, stop_reason: StopReason) -> Self {
        Self {
            id: id.into(),
            content,
            stop_reason,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Text blocks joined by newlines.
    pub fn get_text(&self) -> String {
        join_text(&self.content)
    }

    /// Tool-call requests, in the order the model emitted them.
    pub fn tool_uses(&self) -> Vec<&ToolUse> {
        self.content.iter().filter_map(ContentBlock::as_tool_use).collect()
    }
}

/// The core Provider trait.
///
/// The agent loop calls `complete()` or `stream()` without knowing which
/// backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// The model this provider talks to, used to pick a token-estimation ratio.
    fn model(&self) -> Option<&str> {
        None
    }

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<Response, ProviderError>;

    /// Send a request and get a stream of events.
    ///
    /// Default implementation calls `complete()` and replays the response
    /// through [`StreamEvent::replay`].
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamEvent, ProviderError>>, ProviderError> {
        let response = self.complete(request).await?;
        let events = StreamEvent::replay(&response);
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity covers every event, so this never waits on the receiver.
            let _ = tx.send(Ok(event)).await;
        }
        Ok(rx)
    }
}
