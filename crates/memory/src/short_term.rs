//! Short-term memory: the last few complete exchanges, verbatim but
//! trimmed.
//!
//! An exchange starts at a user message and runs until the next one, so it
//! includes the assistant's tool calls and the tool results.

use sweloop_core::message::{Message, Role};
use sweloop_core::text::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortTermSettings {
    /// Complete exchanges to keep
    pub pairs: usize,
    /// Budget for user and assistant text
    pub message_chars: usize,
    /// Budget for each tool result
    pub tool_result_chars: usize,
}

impl Default for ShortTermSettings {
    fn default() -> Self {
        Self {
            pairs: 3,
            message_chars: 500,
            tool_result_chars: 200,
        }
    }
}

/// The last `settings.pairs` user-anchored exchanges of `messages`, with
/// system messages dropped and content trimmed to budget.
pub fn short_term_window(messages: &[Message], settings: &ShortTermSettings) -> Vec<Message> {
    let filtered: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
    if settings.pairs == 0 || filtered.is_empty() {
        return Vec::new();
    }

    let user_positions: Vec<usize> = filtered
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::User)
        .map(|(i, _)| i)
        .collect();
    let start = if user_positions.len() > settings.pairs {
        user_positions[user_positions.len() - settings.pairs]
    } else {
        0
    };

    filtered[start..]
        .iter()
        .map(|m| {
            let budget = match m.role {
                Role::Tool => settings.tool_result_chars,
                _ => settings.message_chars,
            };
            let mut trimmed = (*m).clone();
            trimmed.content = truncate_chars(&m.content, budget);
            trimmed
        })
        .collect()
}

/// Plain-text rendering of a window, for prompts.
pub fn render_window(window: &[Message]) -> String {
    let mut out = String::new();
    for msg in window {
        let line = match msg.role {
            Role::Assistant if !msg.tool_calls.is_empty() && msg.content.trim().is_empty() => {
                format!("ASSISTANT: [called {}]", msg.tool_names().join(", "))
            }
            Role::Assistant if !msg.tool_calls.is_empty() => {
                format!("ASSISTANT: {} [called {}]", msg.content, msg.tool_names().join(", "))
            }
            role => format!("{}: {}", role.as_str().to_uppercase(), msg.content),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}
