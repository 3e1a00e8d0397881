//! Bounded in-process conversation memory.

use kestrel_core::agent::MemoryConfig;
use kestrel_core::memory::{Memory, TruncationStrategy};
use kestrel_core::message::Message;
use tracing::debug;

use crate::truncation::{truncate_fifo, truncate_sliding};

/// In-memory conversation log capped by message count, with token-budget
/// truncation.
#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    messages: Vec<Message>,
    strategy: TruncationStrategy,
    max_messages: usize,
    keep_first: usize,
    keep_last: usize,
    model: Option<String>,
}

impl ShortTermMemory {
    pub fn new(strategy: TruncationStrategy) -> Self {
        Self::from_config(&MemoryConfig {
            strategy,
            ..MemoryConfig::default()
        })
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            messages: Vec::new(),
            strategy: config.strategy,
            max_messages: config.max_messages,
            keep_first: config.keep_first,
            keep_last: config.keep_last,
            model: config.model.clone(),
        }
    }

    /// Cap on stored messages; the oldest are dropped beyond it.
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self.enforce_cap();
        self
    }

    /// Window kept by the sliding strategy.
    pub fn with_window(mut self, keep_first: usize, keep_last: usize) -> Self {
        self.keep_first = keep_first;
        self.keep_last = keep_last;
        self
    }

    /// Model name used to pick the chars-per-token ratio.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Seed the log with a previously persisted history.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self.enforce_cap();
        self
    }

    pub fn strategy(&self) -> TruncationStrategy {
        self.strategy
    }

    fn enforce_cap(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }
}

impl Default for ShortTermMemory {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

impl Memory for ShortTermMemory {
    fn add(&mut self, message: Message) {
        self.messages.push(message);
        self.enforce_cap();
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn clear(&mut self) {
        self.messages.clear();
    }

    fn truncate(&mut self, max_tokens: usize) -> usize {
        let model = self.model.as_deref();
        let removed = match self.strategy {
            TruncationStrategy::Fifo => truncate_fifo(&mut self.messages, max_tokens, model),
            TruncationStrategy::Sliding => {
                truncate_sliding(&mut self.messages, self.keep_first, self.keep_last, model)
            }
            TruncationStrategy::Summarize => 0,
        };
        if removed > 0 {
            debug!(strategy = %self.strategy, removed, remaining = self.messages.len(), "Memory truncated");
        }
        removed
    }
}
