//! # Kestrel Core
//!
//! Domain types, traits, and error definitions for the kestrel agent
//! execution engine. No provider, storage or UI lives here; this crate
//! defines the shapes every other crate implements against.
//!
//! ## Layout
//!
//! - `message` / `provider` / `stream`: the content model a turn is made of
//! - `tool`: the capability contract and the failure-containing registry
//! - `memory`: conversation log and session persistence traits
//! - `agent`: the `run(query)` contract the composition layer builds on

pub mod agent;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod stream;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, AgentConfig, MemoryConfig, OrchestratorConfig, PipelineConfig, RouterConfig, SessionConfig};
pub use error::{CompositionError, Error, ProviderError, Result, SessionError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use memory::{Memory, SessionStore, TruncationStrategy};
pub use message::{ContentBlock, Message, MessageContent, Role, ToolUse};
pub use provider::{Provider, ProviderRequest, Response, StopReason, ToolSchema, Usage};
pub use stream::StreamEvent;
pub use tool::{Tool, ToolContext, ToolRegistry, ToolResult};
pub use usage::{UsageStats, UsageTracker};
