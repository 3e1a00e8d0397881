//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! read and write files, call services, compute things. A tool never aborts
//! the agent loop; every failure reaches the model as a `ToolResult`.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{Instrument, debug, warn};

use crate::error::ToolError;
use crate::provider::ToolSchema;

/// Read-only context handed to every tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContext {
    /// Directory relative paths are resolved against
    pub working_dir: String,

    /// The conversation this call belongs to
    pub session_id: String,
}

impl ToolContext {
    pub fn new(working_dir: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            session_id: session_id.into(),
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(".", "default")
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The output content shown to the model
    pub output: String,

    /// Whether the tool executed successfully
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            error: None,
        }
    }

    pub fn failure(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// A failure whose output and error carry the same message.
    pub fn from_fault(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::failure(message.clone(), message)
    }
}

/// The core Tool trait.
///
/// Tools are registered in the ToolRegistry and made available to the
/// agent loop. Expected failure modes (missing file, bad input) should come
/// back as `Ok(ToolResult::failure(..))`; an `Err` is reserved for faults.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolSchema for sending to the LLM.
    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Registration order is kept so schemas reach the model in a stable order.
/// Registering a name twice replaces the earlier tool in place.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => {
                debug!(tool = %name, "Replacing registered tool");
                self.tools[slot] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&slot| self.tools[slot].as_ref())
    }

    /// Get all tool schemas (for sending to the LLM).
    pub fn get_schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.to_schema()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name.
    ///
    /// Never fails: unknown names, tool errors and panics all come back as
    /// a `ToolResult` with `success == false`.
    pub async fn execute(&self, name: &str, ctx: &ToolContext, args: Map<String, Value>) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "Model requested an unknown tool");
            return ToolResult::failure(format!("Tool not found: {name}"), format!("Unknown tool: {name}"));
        };

        let span = tracing::info_span!("tool.execute", tool = %name, success = tracing::field::Empty);
        let outcome = AssertUnwindSafe(tool.execute(ctx, args))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ToolResult::from_fault(e.to_string()),
            Err(payload) => ToolResult::from_fault(panic_message(payload.as_ref())),
        };
        span.record("success", result.success);
        if !result.success {
            debug!(tool = %name, error = ?result.error, "Tool reported failure");
        }
        result
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
