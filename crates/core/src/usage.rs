//! Token usage accounting across a session.

use serde::{Deserialize, Serialize};

use crate::provider::Usage;

/// Accumulated token counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_write_tokens: u64,
}

impl UsageStats {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &UsageStats) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
    }
}

impl From<Usage> for UsageStats {
    fn from(usage: Usage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            ..Self::default()
        }
    }
}

/// Tracks usage against a model's context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTracker {
    pub context_limit: u64,
    pub stats: UsageStats,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(200_000)
    }
}

impl UsageTracker {
    pub fn new(context_limit: u64) -> Self {
        Self {
            context_limit,
            stats: UsageStats::default(),
        }
    }

    pub fn add_usage(&mut self, usage: impl Into<UsageStats>) {
        self.stats.add(&usage.into());
    }

    pub fn total_tokens(&self) -> u64 {
        self.stats.total_tokens()
    }

    /// Percentage of the context window consumed; 0 when the limit is 0.
    pub fn usage_percent(&self) -> f64 {
        if self.context_limit == 0 {
            return 0.0;
        }
        self.stats.total_tokens() as f64 / self.context_limit as f64 * 100.0
    }

    /// e.g. `"4% of 200k tokens"`.
    pub fn format_usage(&self) -> String {
        format!("{:.0}% of {}k tokens", self.usage_percent(), self.context_limit / 1000)
    }

    pub fn reset(&mut self) {
        self.stats = UsageStats::default();
    }
}
