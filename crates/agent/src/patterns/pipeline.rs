//! Sequential composition: each stage's answer feeds the next stage.

use std::collections::HashMap;
use std::sync::Arc;

use kestrel_core::agent::{Agent, PipelineConfig};
use kestrel_core::provider::Response;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Builds a stage's query from the pipeline's original query and the
/// previous stage's response.
pub type Transform = Arc<dyn Fn(&str, &Response) -> String + Send + Sync>;

/// One step of a [`Pipeline`].
#[derive(Clone)]
pub struct PipelineStage {
    pub name: String,
    pub agent: Arc<dyn Agent>,
    pub transform: Option<Transform>,
    pub metadata: HashMap<String, Value>,
}

impl std::fmt::Debug for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStage")
            .field("name", &self.name)
            .field("transform", &self.transform.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    /// False only when a stage failed with `stop_on_error` set.
    pub success: bool,
    /// Stages run before the failure, or every stage on success.
    pub stages_completed: usize,
    /// The last response any stage produced.
    pub final_response: Option<Response>,
    /// Responses keyed by stage name. Failed stages have no entry.
    pub stage_responses: HashMap<String, Response>,
    /// The error that stopped the pipeline.
    pub error: Option<String>,
    /// Name of the stage that stopped the pipeline.
    pub failed_stage: Option<String>,
}

/// Runs agents one after another.
#[derive(Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
        }
    }

    /// Append a stage.
    pub fn add_stage(self, name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.push_stage(name.into(), agent, None, HashMap::new())
    }

    /// Append a stage whose query is built by `transform` once an earlier
    /// stage has answered.
    pub fn add_stage_with(
        self,
        name: impl Into<String>,
        agent: Arc<dyn Agent>,
        transform: impl Fn(&str, &Response) -> String + Send + Sync + 'static,
    ) -> Self {
        self.push_stage(name.into(), agent, Some(Arc::new(transform)), HashMap::new())
    }

    /// Append a fully specified stage.
    pub fn add(self, stage: PipelineStage) -> Self {
        self.push_stage(stage.name, stage.agent, stage.transform, stage.metadata)
    }

    fn push_stage(
        mut self,
        name: String,
        agent: Arc<dyn Agent>,
        transform: Option<Transform>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        self.stages.push(PipelineStage {
            name,
            agent,
            transform,
            metadata,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in order.
    pub fn stages(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every stage in order, starting from `initial_query`.
    ///
    /// A stage is asked the previous stage's response text unless it has
    /// a transform and some stage has already answered. With
    /// `stop_on_error` unset a failing stage is skipped and the next one
    /// gets the same query.
    pub async fn run(&self, initial_query: &str) -> PipelineResult {
        let mut result = PipelineResult::default();
        let mut query = initial_query.to_string();

        info!(stages = self.stages.len(), "Running pipeline");
        for (index, stage) in self.stages.iter().enumerate() {
            if let (Some(transform), Some(previous)) = (&stage.transform, &result.final_response) {
                query = transform(initial_query, previous);
            }

            debug!(stage = %stage.name, index, "Running stage");
            match stage.agent.run(&query).await {
                Ok(response) => {
                    query = response.get_text();
                    result.stage_responses.insert(stage.name.clone(), response.clone());
                    result.final_response = Some(response);
                }
                Err(e) if self.config.stop_on_error => {
                    warn!(stage = %stage.name, error = %e, "Stage failed, stopping pipeline");
                    result.stages_completed = index;
                    result.error = Some(e.to_string());
                    result.failed_stage = Some(stage.name.clone());
                    return result;
                }
                Err(e) => {
                    warn!(stage = %stage.name, error = %e, "Stage failed, continuing");
                }
            }
        }

        result.success = true;
        result.stages_completed = self.stages.len();
        result
    }
}
