//! Reassembly of a streamed turn into content blocks.
//!
//! A small state machine: at most one tool call is open at a time, and
//! argument fragments accumulate per call id. A call is finalized when the
//! next `ToolUseStart` arrives, when `MessageStop` arrives, or when the
//! stream ends. Arguments that are empty or not a JSON object become an
//! empty map; they never fail the turn.

use std::collections::HashMap;

use kestrel_core::message::{ContentBlock, ToolUse};
use kestrel_core::provider::{Response, StopReason, Usage};
use kestrel_core::stream::StreamEvent;
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenCall {
    id: String,
    name: String,
}

/// Accumulates the events of one streamed turn.
#[derive(Debug, Default)]
pub struct StreamCollector {
    text: String,
    finished: Vec<ToolUse>,
    open: Option<OpenCall>,
    buffers: HashMap<String, String>,
    stop: Option<(StopReason, Option<Usage>)>,
}

/// The assistant turn rebuilt from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedTurn {
    /// Text block first (if any text arrived), then tool calls in order.
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
}

impl CollectedTurn {
    pub fn tool_uses(&self) -> Vec<&ToolUse> {
        self.content.iter().filter_map(ContentBlock::as_tool_use).collect()
    }

    pub fn into_response(self, id: impl Into<String>) -> Response {
        let response = Response::new(id, self.content, self.stop_reason);
        match self.usage {
            Some(usage) => response.with_usage(usage),
            None => response,
        }
    }
}

impl StreamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event. Events after `MessageStop` are ignored.
    pub fn push(&mut self, event: &StreamEvent) {
        if self.stop.is_some() {
            return;
        }
        match event {
            StreamEvent::TextDelta { text } => self.text.push_str(text),
            StreamEvent::ToolUseStart { id, name } => {
                self.close_open_call();
                self.buffers.insert(id.clone(), String::new());
                self.open = Some(OpenCall {
                    id: id.clone(),
                    name: name.clone(),
                });
            }
            StreamEvent::ToolUseInputDelta { id, partial_json } => {
                self.buffers.entry(id.clone()).or_default().push_str(partial_json);
            }
            StreamEvent::MessageStop { stop_reason, usage } => {
                self.close_open_call();
                self.stop = Some((*stop_reason, *usage));
            }
            StreamEvent::ToolExecuting { .. } | StreamEvent::ToolResult { .. } => {}
        }
    }

    /// Whether `MessageStop` has been seen.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_some()
    }

    /// Id of the tool call currently receiving argument fragments.
    pub fn open_call(&self) -> Option<&str> {
        self.open.as_ref().map(|c| c.id.as_str())
    }

    /// Finish the turn. A stream that ended without `MessageStop` is
    /// treated as `EndTurn`.
    pub fn finish(mut self) -> CollectedTurn {
        self.close_open_call();
        let (stop_reason, usage) = self.stop.unwrap_or((StopReason::EndTurn, None));

        let mut content = Vec::with_capacity(self.finished.len() + 1);
        if !self.text.is_empty() {
            content.push(ContentBlock::text(self.text));
        }
        content.extend(self.finished.into_iter().map(ContentBlock::ToolUse));

        CollectedTurn {
            content,
            stop_reason,
            usage,
        }
    }

    fn close_open_call(&mut self) {
        let Some(call) = self.open.take() else {
            return;
        };
        let raw = self.buffers.remove(&call.id).unwrap_or_default();
        let input = parse_arguments(&call, &raw);
        self.finished.push(ToolUse::new(call.id, call.name, input));
    }
}

fn parse_arguments(call: &OpenCall, raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(tool = %call.name, id = %call.id, kind = json_kind(&other), "Tool arguments are not an object, using {{}}");
            Map::new()
        }
        Err(e) => {
            warn!(tool = %call.name, id = %call.id, error = %e, "Malformed streamed tool arguments, using {{}}");
            Map::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
