//! `kestrel session`: inspect and clear persisted conversations.

use kestrel_config::AppConfig;
use kestrel_core::memory::SessionStore;
use kestrel_core::message::{ContentBlock, Message, MessageContent};
use kestrel_memory::JsonlSessionStore;
use serde_json::{Map, Value};

fn store() -> Result<JsonlSessionStore, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(JsonlSessionStore::new(config.session_dir()))
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = store()?;
    let sessions = store.list().await?;
    if sessions.is_empty() {
        println!("No sessions in {}", store.dir().display());
        return Ok(());
    }
    for id in sessions {
        println!("{id}");
    }
    Ok(())
}

pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = store()?;
    if !store.exists(id).await {
        return Err(format!("Session '{id}' not found").into());
    }
    let messages = store.load(id).await?;
    print!("{}", render(&messages));
    Ok(())
}

pub async fn clear(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = store()?;
    if store.clear(id).await? {
        println!("🗑️  Cleared session {id}");
    } else {
        println!("Session '{id}' not found");
    }
    Ok(())
}

/// One line per block, prefixed with the message role.
fn render(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let role = format!("{:?}", message.role()).to_lowercase();
        match message.content() {
            MessageContent::Text(text) => out.push_str(&format!("[{role}] {text}\n")),
            MessageContent::Blocks(blocks) => {
                for block in blocks {
                    let line = match block {
                        ContentBlock::Text { text } => text.clone(),
                        ContentBlock::ToolUse(call) => {
                            format!("→ {}({})", call.name, inline_args(&call.input))
                        }
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => {
                            let mark = if *is_error { "✗" } else { "✓" };
                            format!("{mark} {tool_use_id}: {content}")
                        }
                    };
                    out.push_str(&format!("[{role}] {line}\n"));
                }
            }
        }
    }
    out
}

fn inline_args(input: &Map<String, Value>) -> String {
    input
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
