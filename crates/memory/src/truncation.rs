//! Token estimation and truncation strategies.
//!
//! Estimation is a chars-per-token heuristic picked by model family.
//! Only text contributes to a message's size; tool-use and tool-result
//! blocks are not counted.

use kestrel_core::message::{ContentBlock, Message, MessageContent};

/// Chars-per-token ratios, matched by substring of the lowercased model name.
const TOKEN_RATIOS: &[(&str, f64)] = &[("claude", 3.5), ("gpt", 4.0), ("gemini", 3.8)];

const DEFAULT_RATIO: f64 = 4.0;

/// Chars-per-token ratio for a model name.
pub fn token_ratio(model: Option<&str>) -> f64 {
    let Some(model) = model else {
        return DEFAULT_RATIO;
    };
    let model = model.to_lowercase();
    TOKEN_RATIOS
        .iter()
        .find(|(family, _)| model.contains(family))
        .map_or(DEFAULT_RATIO, |&(_, ratio)| ratio)
}

/// Estimate the token count of a message: `chars / ratio + 1`.
pub fn estimate_tokens(message: &Message, model: Option<&str>) -> usize {
    let chars = match message.content() {
        MessageContent::Text(text) => text.chars().count(),
        MessageContent::Blocks(blocks) => {
            let texts: Vec<&str> = blocks.iter().filter_map(ContentBlock::as_text).collect();
            // Joined with single spaces.
            texts.iter().map(|t| t.chars().count()).sum::<usize>() + texts.len().saturating_sub(1)
        }
    };
    (chars as f64 / token_ratio(model)) as usize + 1
}

pub fn estimate_total(messages: &[Message], model: Option<&str>) -> usize {
    messages.iter().map(|m| estimate_tokens(m, model)).sum()
}

/// Keep the first message, then as many of the newest messages as fit in
/// `max_tokens`. Returns the estimated tokens removed.
///
/// If the first message alone exceeds the budget nothing is removed.
pub fn truncate_fifo(messages: &mut Vec<Message>, max_tokens: usize, model: Option<&str>) -> usize {
    if messages.is_empty() {
        return 0;
    }

    let sizes: Vec<usize> = messages.iter().map(|m| estimate_tokens(m, model)).collect();
    let total: usize = sizes.iter().sum();
    if total <= max_tokens || sizes[0] > max_tokens {
        return 0;
    }

    let mut kept = sizes[0];
    let mut tail_start = messages.len();
    for (idx, &size) in sizes.iter().enumerate().skip(1).rev() {
        if kept + size > max_tokens {
            break;
        }
        kept += size;
        tail_start = idx;
    }

    messages.drain(1..tail_start);
    total - kept
}

/// Keep the first `keep_first` and last `keep_last` messages.
/// Returns the estimated tokens removed; a no-op when the log already fits
/// the window.
pub fn truncate_sliding(
    messages: &mut Vec<Message>,
    keep_first: usize,
    keep_last: usize,
    model: Option<&str>,
) -> usize {
    if messages.len() <= keep_first + keep_last {
        return 0;
    }
    let tail_start = messages.len() - keep_last;
    messages
        .drain(keep_first..tail_start)
        .map(|m| estimate_tokens(&m, model))
        .sum()
}
