//! File write tool: create or overwrite files inside the working directory.

use async_trait::async_trait;
use kestrel_core::error::ToolError;
use kestrel_core::tool::{Tool, ToolContext, ToolResult};
use serde_json::{Map, Value};
use tracing::debug;

use crate::path::resolve_in_workspace;

#[derive(Debug, Default, Clone, Copy)]
pub struct FileWriteTool;

impl FileWriteTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent directories if needed, overwrites existing files."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<ToolResult, ToolError> {
        let Some(path) = args.get("path").and_then(Value::as_str).filter(|p| !p.is_empty()) else {
            return Ok(ToolResult::failure("Missing required argument: 'path'", "path is required"));
        };
        let content = args.get("content").and_then(Value::as_str).unwrap_or_default();

        let resolved = match resolve_in_workspace(path, &ctx.working_dir) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::failure(format!("Access denied: {path}"), e.to_string())),
        };

        if let Some(parent) = resolved.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolResult::failure(format!("Failed to write: {e}"), e.to_string()));
        }

        match tokio::fs::write(&resolved, content).await {
            Ok(()) => {
                debug!(path = %resolved.display(), bytes = content.len(), "File written");
                Ok(ToolResult::ok(format!("Successfully wrote to {path}")))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Ok(ToolResult::failure(format!("Permission denied: {path}"), "Permission denied"))
            }
            Err(e) => Ok(ToolResult::failure(format!("Failed to write: {e}"), e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_string_lossy(), "test");

        let result = FileWriteTool
            .execute(&ctx, args(json!({"path": "a/b/out.txt", "content": "hello"})))
            .await
            .unwrap();

        assert!(result.success, "{result:?}");
        assert_eq!(result.output, "Successfully wrote to a/b/out.txt");
        assert_eq!(std::fs::read_to_string(dir.path().join("a/b/out.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "old").unwrap();
        let ctx = ToolContext::new(dir.path().to_string_lossy(), "test");

        FileWriteTool
            .execute(&ctx, args(json!({"path": "f.txt", "content": "new"})))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn escape_is_refused_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("ws");
        std::fs::create_dir(&inner).unwrap();
        let ctx = ToolContext::new(inner.to_string_lossy(), "test");

        let result = FileWriteTool
            .execute(&ctx, args(json!({"path": "../escaped.txt", "content": "x"})))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn missing_path_is_a_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_string_lossy(), "test");
        let result = FileWriteTool.execute(&ctx, args(json!({"content": "x"}))).await.unwrap();
        assert!(!result.success);
    }
}
