//! Dependency-graph composition.
//!
//! Named tasks bind an agent, a query and the tasks they depend on. A run
//! orders them topologically (Kahn's algorithm) and executes them one at
//! a time.
//!
//! ```text
//!   research ──► outline ──► draft
//!        └──────────────────►┘
//! ```
//!
//! With `fail_fast` set, a task whose dependency failed is not executed. It
//! gets a failure result naming that dependency, so the failure spreads to
//! everything downstream. Tasks that do not depend on a failure still run,
//! even after an unrelated task has failed.
//!
//! Every task ends up with exactly one [`TaskResult`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use kestrel_core::agent::{Agent, OrchestratorConfig};
use kestrel_core::error::{CompositionError, Result};
use kestrel_core::provider::Response;
use tracing::{debug, info, warn};

/// Builds a task's query from the results of the tasks executed so far.
pub type QueryFn = Arc<dyn Fn(&HashMap<String, TaskResult>) -> String + Send + Sync>;

/// Where a task's query comes from.
#[derive(Clone)]
pub enum TaskQuery {
    Literal(String),
    /// Called with the results of the tasks executed so far, keyed by task
    /// name. Tasks skipped because of a failed dependency are left out.
    Dynamic(QueryFn),
}

impl TaskQuery {
    pub fn dynamic(f: impl Fn(&HashMap<String, TaskResult>) -> String + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    fn resolve(&self, context: &HashMap<String, TaskResult>) -> String {
        match self {
            Self::Literal(query) => query.clone(),
            Self::Dynamic(f) => f(context),
        }
    }
}

impl From<&str> for TaskQuery {
    fn from(query: &str) -> Self {
        Self::Literal(query.to_string())
    }
}

impl From<String> for TaskQuery {
    fn from(query: String) -> Self {
        Self::Literal(query)
    }
}

impl std::fmt::Debug for TaskQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(query) => f.debug_tuple("Literal").field(query).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// A unit of work in the graph.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub agent_name: String,
    pub query: TaskQuery,
    pub depends_on: Vec<String>,
}

/// Outcome of one task in one run.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// The task this result belongs to.
    pub task_name: String,
    /// The agent the task was bound to.
    pub agent_name: String,
    /// Whether the agent ran and returned a response.
    pub success: bool,
    /// The agent's response, on success.
    pub response: Option<Response>,
    /// Why the task failed or was not run.
    pub error: Option<String>,
}

impl TaskResult {
    fn completed(task: &Task, response: Response) -> Self {
        Self {
            task_name: task.name.clone(),
            agent_name: task.agent_name.clone(),
            success: true,
            response: Some(response),
            error: None,
        }
    }

    fn failed(task: &Task, error: impl Into<String>) -> Self {
        Self {
            task_name: task.name.clone(),
            agent_name: task.agent_name.clone(),
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }

    /// Response text, or an empty string if the task produced none.
    pub fn text(&self) -> String {
        self.response.as_ref().map(Response::get_text).unwrap_or_default()
    }
}

/// Runs named tasks over registered agents in dependency order.
#[derive(Default)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    agents: HashMap<String, Arc<dyn Agent>>,
    tasks: Vec<Task>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            agents: HashMap::new(),
            tasks: Vec::new(),
        }
    }

    /// Register an agent under `name`, replacing any previous one.
    pub fn add_agent(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> &mut Self {
        self.agents.insert(name.into(), agent);
        self
    }

    /// Add a task bound to a registered agent.
    ///
    /// Dependencies may name tasks added later; they are checked when the
    /// graph runs.
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        agent_name: impl Into<String>,
        query: impl Into<TaskQuery>,
        depends_on: &[&str],
    ) -> Result<&mut Self> {
        let name = name.into();
        let agent_name = agent_name.into();

        if !self.agents.contains_key(&agent_name) {
            return Err(CompositionError::UnknownAgent(agent_name).into());
        }
        if self.tasks.iter().any(|t| t.name == name) {
            return Err(CompositionError::DuplicateTask(name).into());
        }

        self.tasks.push(Task {
            name,
            agent_name,
            query: query.into(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
        });
        Ok(self)
    }

    /// Task names in insertion order.
    pub fn tasks(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Remove every agent and task.
    pub fn clear(&mut self) {
        self.agents.clear();
        self.tasks.clear();
    }

    /// The order tasks will run in.
    ///
    /// Fails on a dependency naming no task, or on a cycle; nothing is
    /// executed in either case.
    pub fn execution_order(&self) -> Result<Vec<&Task>> {
        let names: HashSet<&str> = self.tasks.iter().map(|t| t.name.as_str()).collect();
        for task in &self.tasks {
            if let Some(missing) = task.depends_on.iter().find(|d| !names.contains(d.as_str())) {
                return Err(CompositionError::UnknownDependency {
                    task: task.name.clone(),
                    dependency: missing.clone(),
                }
                .into());
            }
        }

        let index: HashMap<&str, usize> = self.tasks.iter().enumerate().map(|(i, t)| (t.name.as_str(), i)).collect();
        let mut in_degree: Vec<usize> = self.tasks.iter().map(|t| t.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.tasks.len()];
        for (i, task) in self.tasks.iter().enumerate() {
            for dep in &task.depends_on {
                dependents[index[dep.as_str()]].push(i);
            }
        }

        let mut ready: VecDeque<usize> = (0..self.tasks.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(i) = ready.pop_front() {
            order.push(&self.tasks[i]);
            for &next in &dependents[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() < self.tasks.len() {
            let remaining = self
                .tasks
                .iter()
                .enumerate()
                .filter(|(i, _)| in_degree[*i] > 0)
                .map(|(_, t)| t.name.clone())
                .collect();
            return Err(CompositionError::CircularDependency { remaining }.into());
        }

        Ok(order)
    }

    /// Run every task and return one result per task, keyed by name.
    ///
    /// Only graph errors are raised. Agent failures and timeouts are
    /// recorded as failed results.
    pub async fn run(&self) -> Result<HashMap<String, TaskResult>> {
        let order = self.execution_order()?;
        info!(tasks = order.len(), fail_fast = self.config.fail_fast, "Running task graph");

        let mut results: HashMap<String, TaskResult> = HashMap::with_capacity(order.len());
        let mut context: HashMap<String, TaskResult> = HashMap::with_capacity(order.len());

        for task in order {
            if self.config.fail_fast
                && let Some(dep) = failed_dependency(task, &results)
            {
                warn!(task = %task.name, dependency = %dep, "Skipping task, dependency failed");
                let result = TaskResult::failed(task, format!("Dependency '{dep}' failed"));
                results.insert(task.name.clone(), result);
                continue;
            }

            let query = task.query.resolve(&context);
            let result = self.execute(task, &query).await;
            context.insert(task.name.clone(), result.clone());
            results.insert(task.name.clone(), result);
        }

        let succeeded = results.values().filter(|r| r.success).count();
        info!(succeeded, failed = results.len() - succeeded, "Task graph finished");
        Ok(results)
    }

    async fn execute(&self, task: &Task, query: &str) -> TaskResult {
        let Some(agent) = self.agents.get(&task.agent_name) else {
            return TaskResult::failed(task, format!("Unknown agent: {}", task.agent_name));
        };

        debug!(task = %task.name, agent = %task.agent_name, "Running task");
        let outcome = match self.config.timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), agent.run(query)).await {
                Ok(outcome) => outcome,
                Err(_) => return TaskResult::failed(task, format!("Task timed out after {secs}s")),
            },
            None => agent.run(query).await,
        };

        match outcome {
            Ok(response) => TaskResult::completed(task, response),
            Err(e) => {
                warn!(task = %task.name, error = %e, "Task failed");
                TaskResult::failed(task, e.to_string())
            }
        }
    }
}

fn failed_dependency<'a>(task: &'a Task, results: &HashMap<String, TaskResult>) -> Option<&'a str> {
    task.depends_on
        .iter()
        .find(|d| results.get(*d).is_some_and(|r| !r.success))
        .map(String::as_str)
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut agents: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        agents.sort_unstable();
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("agents", &agents)
            .field("tasks", &self.tasks())
            .finish()
    }
}
