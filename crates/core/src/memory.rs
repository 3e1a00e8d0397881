//! Memory and session-store traits.
//!
//! `Memory` is the conversation log an agent sends to its provider. It is
//! owned by exactly one agent and mutated only through `add`, `truncate`
//! and `clear`. `SessionStore` is the optional persistence boundary the
//! owning application uses to load a log before first use and save it after
//! each run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::message::Message;

/// How a memory shrinks its log to fit a token budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationStrategy {
    /// Keep the first message, then as many of the newest as fit.
    #[default]
    Fifo,
    /// Keep a fixed head and tail window.
    Sliding,
    /// Reserved; removes nothing.
    Summarize,
}

impl std::fmt::Display for TruncationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fifo => "fifo",
            Self::Sliding => "sliding",
            Self::Summarize => "summarize",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TruncationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "sliding" => Ok(Self::Sliding),
            "summarize" => Ok(Self::Summarize),
            other => Err(format!("unknown truncation strategy '{other}'")),
        }
    }
}

/// An ordered conversation log.
pub trait Memory: Send {
    /// Append a message.
    fn add(&mut self, message: Message);

    /// The messages to send to the provider, oldest first.
    fn messages(&self) -> &[Message];

    /// Owned copy of [`Memory::messages`].
    fn get_messages(&self) -> Vec<Message> {
        self.messages().to_vec()
    }

    /// Drop every message.
    fn clear(&mut self);

    /// Shrink the log to fit `max_tokens`; returns the estimated tokens removed.
    fn truncate(&mut self, max_tokens: usize) -> usize;

    fn len(&self) -> usize {
        self.messages().len()
    }

    fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }
}

/// Persistence of conversation logs, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The stored history, oldest first. A missing session loads as empty.
    async fn load(&self, session_id: &str) -> Result<Vec<Message>, SessionError>;

    /// Replace the stored history with `messages`.
    async fn save(&self, session_id: &str, messages: &[Message]) -> Result<(), SessionError>;

    /// Delete a session. Returns whether anything was removed.
    async fn clear(&self, session_id: &str) -> Result<bool, SessionError>;

    async fn exists(&self, session_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("FIFO".parse::<TruncationStrategy>(), Ok(TruncationStrategy::Fifo));
        assert_eq!("sliding".parse::<TruncationStrategy>(), Ok(TruncationStrategy::Sliding));
        assert!("lru".parse::<TruncationStrategy>().is_err());
    }

    #[test]
    fn strategy_defaults_to_fifo() {
        assert_eq!(TruncationStrategy::default(), TruncationStrategy::Fifo);
        assert_eq!(TruncationStrategy::Summarize.to_string(), "summarize");
    }

    #[test]
    fn strategy_serde_is_lowercase() {
        let json = serde_json::to_string(&TruncationStrategy::Sliding).unwrap();
        assert_eq!(json, r#""sliding""#);
    }
}
