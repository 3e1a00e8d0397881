//! File read tool: numbered file contents from inside the working directory.

use async_trait::async_trait;
use kestrel_core::error::ToolError;
use kestrel_core::tool::{Tool, ToolContext, ToolResult};
use serde_json::{Map, Value};

use crate::path::resolve_in_workspace;

#[derive(Debug, Default, Clone, Copy)]
pub struct FileReadTool;

impl FileReadTool {
    pub fn new() -> Self {
        Self
    }
}

/// Render lines as `"{n:>4}│{line}"`, starting at the 1-based `offset`.
fn number_lines(content: &str, offset: Option<u64>, limit: Option<u64>) -> String {
    let start = offset.filter(|&o| o > 0).map_or(0, |o| (o - 1) as usize);
    let take = limit.map_or(usize::MAX, |l| l as usize);
    content
        .lines()
        .enumerate()
        .skip(start)
        .take(take)
        .map(|(idx, line)| format!("{:>4}│{line}", idx + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read file contents with line numbers. Paths are relative to the working directory."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line (1-based) to start reading from"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<ToolResult, ToolError> {
        let Some(path) = args.get("path").and_then(Value::as_str).filter(|p| !p.is_empty()) else {
            return Ok(ToolResult::failure("Missing required argument: 'path'", "path is required"));
        };
        let offset = args.get("offset").and_then(Value::as_u64);
        let limit = args.get("limit").and_then(Value::as_u64);

        let resolved = match resolve_in_workspace(path, &ctx.working_dir) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::failure(format!("Access denied: {path}"), e.to_string())),
        };

        let metadata = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(_) => {
                return Ok(ToolResult::failure(
                    format!("File not found: {path}"),
                    format!("File does not exist: {path}"),
                ));
            }
        };
        if !metadata.is_file() {
            return Ok(ToolResult::failure(
                format!("Not a file: {path}"),
                format!("Path is not a file: {path}"),
            ));
        }

        let bytes = tokio::fs::read(&resolved).await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "file_read".into(),
            reason: e.to_string(),
        })?;
        let Ok(content) = String::from_utf8(bytes) else {
            return Ok(ToolResult::failure(format!("Cannot read binary file: {path}"), "Binary file"));
        };

        Ok(ToolResult::ok(number_lines(&content, offset, limit)))
    }
}
