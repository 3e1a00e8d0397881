//! Built-in tool implementations for kestrel.
//!
//! - [`FunctionTool`]: wrap an async closure as a tool
//! - [`FileReadTool`] / [`FileWriteTool`]: file access confined to
//!   `ToolContext::working_dir`

pub mod file_read;
pub mod file_write;
pub mod function;
pub mod path;

use kestrel_core::tool::ToolRegistry;

pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use function::FunctionTool;
pub use path::{PathValidationError, resolve_in_workspace};

/// Create a registry with the built-in file tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(FileReadTool);
    registry.register(FileWriteTool);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_file_tools() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["file_read", "file_write"]);
    }
}
