//! The agent contract and configuration types.
//!
//! The composition layer treats anything implementing [`Agent`] as an
//! opaque callable; it never cares how the agent was built.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::memory::TruncationStrategy;
use crate::provider::Response;

/// Anything that can answer a query with a [`Response`].
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, query: &str) -> Result<Response>;
}

/// Configuration for one agent's loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name, used in logs and events
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum provider calls per run (safety limit)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Token budget memory is truncated to at the start of each run
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Maximum tokens per provider response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Working directory handed to tools
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Session id handed to tools
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

fn default_agent_name() -> String {
    "agent".into()
}
fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".into()
}
fn default_max_iterations() -> u32 {
    10
}
fn default_max_context_tokens() -> usize {
    100_000
}
fn default_max_tokens() -> u32 {
    crate::provider::default_max_tokens()
}
fn default_working_dir() -> String {
    ".".into()
}
fn default_session_id() -> String {
    "default".into()
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            system_prompt: default_system_prompt(),
            max_iterations: default_max_iterations(),
            max_context_tokens: default_max_context_tokens(),
            max_tokens: default_max_tokens(),
            working_dir: default_working_dir(),
            session_id: default_session_id(),
        }
    }
}

/// Configuration for a bounded short-term memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub strategy: TruncationStrategy,

    /// Hard cap on stored messages; the oldest are dropped beyond it
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Sliding strategy: messages kept from the start
    #[serde(default = "default_keep_first")]
    pub keep_first: usize,

    /// Sliding strategy: messages kept from the end
    #[serde(default = "default_keep_last")]
    pub keep_last: usize,

    /// Model name used to pick a chars-per-token ratio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_max_messages() -> usize {
    100
}
fn default_keep_first() -> usize {
    1
}
fn default_keep_last() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            strategy: TruncationStrategy::default(),
            max_messages: default_max_messages(),
            keep_first: default_keep_first(),
            keep_last: default_keep_last(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Skip dependents of failed tasks and stop after the first task fault
    #[serde(default = "default_true")]
    pub fail_fast: bool,

    /// Per-task time limit in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fail_fast: true,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_true")]
    pub stop_on_error: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { stop_on_error: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Agent used when no route matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,

    /// Error message when nothing matches and no default exists
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_fallback_message() -> String {
    "Unable to route request to an appropriate agent.".into()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_agent: None,
            fallback_message: default_fallback_message(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding `<session_id>.jsonl` files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}
