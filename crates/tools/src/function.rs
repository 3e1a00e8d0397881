//! Closure-backed tools.
//!
//! Lets callers turn an async function into a [`Tool`] without writing a
//! struct and trait impl for it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use kestrel_core::error::ToolError;
use kestrel_core::tool::{Tool, ToolContext, ToolResult};
use serde_json::{Map, Value};

type Handler = Arc<dyn Fn(ToolContext, Map<String, Value>) -> BoxFuture<'static, Result<ToolResult, ToolError>> + Send + Sync>;

/// A tool whose behavior is an async closure.
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    input_schema: Value,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, input_schema: Value, f: F) -> Self
    where
        F: Fn(ToolContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |ctx, args| Box::pin(f(ctx, args))),
        }
    }

    /// Wrap a closure that returns plain text; the text becomes a
    /// successful result.
    pub fn text<F, Fut>(name: impl Into<String>, description: impl Into<String>, input_schema: Value, f: F) -> Self
    where
        F: Fn(ToolContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, description, input_schema, move |ctx, args| {
            let f = Arc::clone(&f);
            async move { Ok(ToolResult::ok(f(ctx, args).await)) }
        })
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<ToolResult, ToolError> {
        (self.handler)(ctx.clone(), args).await
    }
}
