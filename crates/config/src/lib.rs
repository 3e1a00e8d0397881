//! Configuration loading, validation, and management for kestrel.
//!
//! Loads configuration from `~/.kestrel/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use kestrel_core::agent::{
    AgentConfig, MemoryConfig, OrchestratorConfig, PipelineConfig, RouterConfig, SessionConfig,
};
use kestrel_core::memory::TruncationStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.kestrel/config.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Dependency-graph orchestration settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Sequential pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Predicate router settings
    #[serde(default)]
    pub router: RouterConfig,

    /// Session persistence settings
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the default path (~/.kestrel/config.toml).
    ///
    /// Environment variables override the file:
    /// - `KESTREL_MAX_ITERATIONS`
    /// - `KESTREL_SYSTEM_PROMPT`
    /// - `KESTREL_SESSION_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("KESTREL_MAX_ITERATIONS") {
            self.agent.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("KESTREL_MAX_ITERATIONS must be a positive integer, got '{raw}'"))
            })?;
        }

        if let Some(prompt) = lookup("KESTREL_SYSTEM_PROMPT") {
            self.agent.system_prompt = prompt;
        }

        if let Some(dir) = lookup("KESTREL_SESSION_DIR") {
            self.session.dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".kestrel")
    }

    /// Directory holding JSONL session files.
    pub fn session_dir(&self) -> PathBuf {
        self.session
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("sessions"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError("agent.max_iterations must be >= 1".into()));
        }

        if self.agent.max_context_tokens == 0 {
            return Err(ConfigError::ValidationError("agent.max_context_tokens must be >= 1".into()));
        }

        if self.memory.max_messages == 0 {
            return Err(ConfigError::ValidationError("memory.max_messages must be >= 1".into()));
        }

        if self.memory.strategy == TruncationStrategy::Sliding && self.memory.keep_last == 0 {
            return Err(ConfigError::ValidationError(
                "memory.keep_last must be >= 1 with the sliding strategy".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `kestrel config --init`).
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for kestrel_core::Error {
    fn from(e: ConfigError) -> Self {
        kestrel_core::Error::Config { message: e.to_string() }
    }
}
