//! The agent loop and its composition patterns.
//!
//! A [`ReactAgent`] follows a **Reason → Act → Observe** cycle:
//!
//! 1. **Record** the user query in memory and truncate to the context budget
//! 2. **Ask** the provider, offering the registered tools
//! 3. **If tool calls**: run them in order, record the results, go to 2
//! 4. **If end of turn**: return the response
//!
//! The loop stops at the iteration limit with a `max_iterations` response.
//! [`ReactAgent::stream`] runs the same loop and yields events as they
//! happen, rebuilding tool calls with a [`StreamCollector`].
//!
//! The [`patterns`] module composes agents through the
//! [`Agent`](kestrel_core::agent::Agent) trait.

pub mod collector;
pub mod patterns;
pub mod react;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use collector::{CollectedTurn, StreamCollector};
pub use patterns::{
    Orchestrator, Pipeline, PipelineResult, PipelineStage, RouteResult, RouteSpec, Router, RoutingRule, TaskQuery,
    TaskResult,
};
pub use react::{ReactAgent, TOOL_PREVIEW_CHARS};
