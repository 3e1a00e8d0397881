//! JSONL session persistence.
//!
//! Each session is one file, `<dir>/<session_id>.jsonl`, holding one
//! JSON-encoded `Message` per line. Saving rewrites the whole file.
//!
//! The directory comes from `AppConfig::session_dir` in `kestrel-config`,
//! `~/.kestrel/sessions/` unless configured.

use async_trait::async_trait;
use kestrel_core::error::SessionError;
use kestrel_core::memory::SessionStore;
use kestrel_core::message::Message;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A directory of JSONL session files.
#[derive(Debug, Clone)]
pub struct JsonlSessionStore {
    dir: PathBuf,
}

impl JsonlSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// A fresh short session id (first 8 chars of a v4 UUID).
    pub fn new_session_id() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `session_id`.
    pub fn session_file(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.jsonl")))
    }

    /// Ids of every stored session, sorted.
    pub async fn list(&self) -> Result<Vec<String>, SessionError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::Storage(format!("Failed to read session directory: {e}"))),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to read session directory: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Parse a JSONL history strictly, reporting the first bad line.
    pub fn parse(content: &str) -> Result<Vec<Message>, SessionError> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str::<Message>(line).map_err(|e| SessionError::Corrupt {
                    line: idx + 1,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

/// Session ids become file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_session_id(session_id: &str) -> Result<(), SessionError> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SessionError::Storage(format!("Invalid session id: {session_id:?}")))
    }
}

#[async_trait]
impl SessionStore for JsonlSessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<Message>, SessionError> {
        let path = self.session_file(session_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Unreadable session file, starting empty");
                }
                return Ok(Vec::new());
            }
        };

        match Self::parse(&content) {
            Ok(messages) => {
                debug!(session = %session_id, count = messages.len(), "Session loaded");
                Ok(messages)
            }
            Err(e) => {
                warn!(session = %session_id, error = %e, "Corrupt session file, starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, session_id: &str, messages: &[Message]) -> Result<(), SessionError> {
        let path = self.session_file(session_id)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to create session directory: {e}")))?;

        let mut content = String::new();
        for message in messages {
            let line = serde_json::to_string(message)
                .map_err(|e| SessionError::Storage(format!("Failed to serialize message: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))?;

        debug!(session = %session_id, count = messages.len(), "Session saved");
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<bool, SessionError> {
        let path = self.session_file(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::Storage(format!("Failed to delete session file: {e}"))),
        }
    }

    async fn exists(&self, session_id: &str) -> bool {
        match self.session_file(session_id) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
