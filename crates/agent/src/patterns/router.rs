//! Predicate-based composition: send each query to the first agent whose
//! rule matches it.
//!
//! Rules are checked from highest to lowest priority; rules of equal
//! priority keep their registration order. A rule matches on one of:
//!
//! - keywords: any keyword appears in the query, ignoring case
//! - pattern: a regex found anywhere in the query, ignoring case
//! - condition: an arbitrary predicate

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use kestrel_core::agent::{Agent, RouterConfig};
use kestrel_core::error::{CompositionError, Result};
use kestrel_core::provider::Response;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{debug, info};

/// An arbitrary routing predicate over the query text.
pub type Condition = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Everything a rule is built from besides its name and agent.
///
/// Exactly one of keywords, pattern or condition must be set.
#[derive(Default, Clone)]
pub struct RouteSpec {
    keywords: Vec<String>,
    pattern: Option<String>,
    condition: Option<Condition>,
    priority: i32,
    metadata: HashMap<String, Value>,
}

impl RouteSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn condition(mut self, condition: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Higher runs first. Defaults to 0.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone)]
enum Matcher {
    /// Stored lowercased.
    Keywords(Vec<String>),
    Pattern(Regex),
    Condition(Condition),
}

impl Matcher {
    fn matches(&self, query: &str) -> bool {
        match self {
            Self::Keywords(keywords) => {
                let query = query.to_lowercase();
                keywords.iter().any(|k| query.contains(k.as_str()))
            }
            Self::Pattern(regex) => regex.is_match(query),
            Self::Condition(condition) => condition(query),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Keywords(_) => "keywords",
            Self::Pattern(_) => "pattern",
            Self::Condition(_) => "condition",
        }
    }
}

/// A registered route.
#[derive(Clone)]
pub struct RoutingRule {
    pub name: String,
    pub agent: Arc<dyn Agent>,
    pub priority: i32,
    pub metadata: HashMap<String, Value>,
    matcher: Matcher,
}

impl RoutingRule {
    pub fn matches(&self, query: &str) -> bool {
        self.matcher.matches(query)
    }
}

impl std::fmt::Debug for RoutingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingRule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("matcher", &self.matcher.kind())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Outcome of a routed query.
#[derive(Debug, Clone)]
pub struct RouteResult {
    /// Name of the agent that answered.
    pub agent_name: String,
    pub response: Response,
    /// The rule that matched; `None` when the default agent answered.
    pub matched_rule: Option<String>,
}

/// Dispatches queries to agents by priority-ordered rules.
#[derive(Default)]
pub struct Router {
    config: RouterConfig,
    agents: HashMap<String, Arc<dyn Agent>>,
    routes: Vec<RoutingRule>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            agents: HashMap::new(),
            routes: Vec::new(),
        }
    }

    /// Register a route named `name` answered by `agent`.
    ///
    /// Fails unless `spec` sets exactly one predicate, or when its pattern
    /// is not a valid regex.
    pub fn add_route(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>, spec: RouteSpec) -> Result<&mut Self> {
        let name = name.into();
        let RouteSpec {
            keywords,
            pattern,
            condition,
            priority,
            metadata,
        } = spec;

        let matcher = match (keywords.is_empty(), pattern, condition) {
            (false, None, None) => Matcher::Keywords(keywords.iter().map(|k| k.to_lowercase()).collect()),
            (true, Some(pattern), None) => {
                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| CompositionError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                Matcher::Pattern(regex)
            }
            (true, None, Some(condition)) => Matcher::Condition(condition),
            (true, None, None) => {
                return Err(CompositionError::InvalidRoute {
                    name,
                    reason: "one of keywords, pattern or condition is required".into(),
                }
                .into());
            }
            _ => {
                return Err(CompositionError::InvalidRoute {
                    name,
                    reason: "only one of keywords, pattern or condition may be given".into(),
                }
                .into());
            }
        };

        debug!(route = %name, priority, matcher = matcher.kind(), "Route added");
        self.agents.insert(name.clone(), Arc::clone(&agent));
        self.routes.push(RoutingRule {
            name,
            agent,
            priority,
            metadata,
            matcher,
        });
        self.routes.sort_by_key(|r| Reverse(r.priority));
        Ok(self)
    }

    /// Register the agent that answers when no rule matches.
    pub fn set_default_agent(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> &mut Self {
        let name = name.into();
        self.agents.insert(name.clone(), agent);
        self.config.default_agent = Some(name);
        self
    }

    /// Route names in evaluation order.
    pub fn routes(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.name.as_str()).collect()
    }

    /// Name of the route or default agent `query` would go to, without
    /// running anything.
    pub fn get_route(&self, query: &str) -> Option<String> {
        self.resolve(query).map(|(name, _, _)| name.to_string())
    }

    /// Run `query` on the matching agent.
    ///
    /// Errors with [`CompositionError::NoRouteMatched`] carrying the
    /// configured fallback message when neither a rule nor a default
    /// agent applies. Agent errors propagate unchanged.
    pub async fn route(&self, query: &str) -> Result<RouteResult> {
        let Some((name, agent, matched_rule)) = self.resolve(query) else {
            info!("No route matched");
            return Err(CompositionError::NoRouteMatched(self.config.fallback_message.clone()).into());
        };

        info!(agent = %name, rule = ?matched_rule, "Routing query");
        let response = agent.run(query).await?;
        Ok(RouteResult {
            agent_name: name.to_string(),
            response,
            matched_rule: matched_rule.map(str::to_string),
        })
    }

    fn resolve(&self, query: &str) -> Option<(&str, &Arc<dyn Agent>, Option<&str>)> {
        if let Some(rule) = self.routes.iter().find(|r| r.matches(query)) {
            return Some((rule.name.as_str(), &rule.agent, Some(rule.name.as_str())));
        }
        let default = self.config.default_agent.as_deref()?;
        self.agents.get(default).map(|agent| (default, agent, None))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .finish()
    }
}
