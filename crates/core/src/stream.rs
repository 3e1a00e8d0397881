//! Streaming events.
//!
//! Produced by a provider's `stream()` and re-yielded (plus tool progress
//! events) by the agent's streaming entry point. Never persisted directly.

use serde::{Deserialize, Serialize};

use crate::message::ContentBlock;
use crate::provider::{Response, StopReason, Usage};

/// One incremental event of a streamed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of assistant text.
    TextDelta { text: String },

    /// The model opened a new tool call.
    ToolUseStart { id: String, name: String },

    /// A fragment of the JSON arguments for the call `id`.
    ToolUseInputDelta { id: String, partial_json: String },

    /// The agent is about to execute a tool.
    ToolExecuting { tool_name: String, tool_id: String },

    /// A tool finished; `output` is a bounded preview.
    ToolResult {
        tool_name: String,
        tool_id: String,
        success: bool,
        output: String,
    },

    /// The turn is over.
    MessageStop {
        stop_reason: StopReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

impl StreamEvent {
    /// Replay a complete response as the events a streaming backend would
    /// have produced for it.
    pub fn replay(response: &Response) -> Vec<Self> {
        let mut events = Vec::new();

        let text = response.get_text();
        if !text.is_empty() {
            events.push(Self::TextDelta { text });
        }

        for block in &response.content {
            match block {
                ContentBlock::ToolUse(call) => {
                    events.push(Self::ToolUseStart {
                        id: call.id.clone(),
                        name: call.name.clone(),
                    });
                    let partial_json = serde_json::Value::Object(call.input.clone()).to_string();
                    events.push(Self::ToolUseInputDelta {
                        id: call.id.clone(),
                        partial_json,
                    });
                }
                ContentBlock::Text { .. } | ContentBlock::ToolResult { .. } => {}
            }
        }

        events.push(Self::MessageStop {
            stop_reason: response.stop_reason,
            usage: response.usage,
        });
        events
    }
}
