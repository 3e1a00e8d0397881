//! Memory implementations for kestrel.
//!
//! - [`ShortTermMemory`]: bounded in-process log with FIFO / sliding truncation
//! - [`JsonlSessionStore`]: one JSONL file per session on disk

pub mod session;
pub mod short_term;
pub mod truncation;

pub use session::JsonlSessionStore;
pub use short_term::ShortTermMemory;
pub use truncation::{estimate_tokens, estimate_total, token_ratio, truncate_fifo, truncate_sliding};
