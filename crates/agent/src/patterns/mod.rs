//! Composition patterns over the [`Agent`](kestrel_core::agent::Agent)
//! contract.
//!
//! 1. **Orchestrator** runs named tasks in dependency order
//! 2. **Pipeline** chains agents, each answering the previous one
//! 3. **Router** picks one agent per query by priority-ordered rules
//!
//! None of them run agents concurrently.

pub mod orchestrator;
pub mod pipeline;
pub mod router;

pub use orchestrator::{Orchestrator, QueryFn, Task, TaskQuery, TaskResult};
pub use pipeline::{Pipeline, PipelineResult, PipelineStage, Transform};
pub use router::{Condition, RouteResult, RouteSpec, Router, RoutingRule};
