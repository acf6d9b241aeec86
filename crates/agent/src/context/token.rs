//! Rough token accounting for the compaction check.
//!
//! Four bytes per token, rounded up. Only used to decide when the working
//! list nears the window.

use sweloop_core::message::Message;
use sweloop_core::provider::ToolDefinition;

/// Role marker and delimiters around each message.
const MESSAGE_OVERHEAD: usize = 4;

pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Content plus overhead plus every requested tool call (name and
/// arguments).
pub fn estimate_message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .roots()
        .map(|call| {
            let args = serde_json::to_string(&call.parameters).unwrap_or_default();
            estimate_tokens(&call.name) + estimate_tokens(&args)
        })
        .sum();
    MESSAGE_OVERHEAD + estimate_tokens(&message.content) + calls
}

/// Schemas as they go over the wire, serialized to JSON.
pub fn estimate_tools_tokens(tools: &[ToolDefinition]) -> usize {
    tools
        .iter()
        .map(|tool| estimate_tokens(&serde_json::to_string(tool).unwrap_or_default()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweloop_core::message::{ToolCallArena, ToolCallRecord};

    #[test]
    fn rounds_up_to_whole_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn message_carries_fixed_overhead() {
        assert_eq!(estimate_message_tokens(&Message::user("test")), 5);
    }

    #[test]
    fn requested_tool_calls_add_to_the_estimate() {
        let mut arena = ToolCallArena::new();
        arena.push(ToolCallRecord::new("c1", "read_file", serde_json::json!({"path": "src/main.rs"})));
        let with_call = Message::assistant("").with_tool_calls(arena);
        // "read_file" = 3, {"path":"src/main.rs"} = 6
        assert_eq!(estimate_message_tokens(&with_call), MESSAGE_OVERHEAD + 3 + 6);
    }

    #[test]
    fn schemas_are_counted_as_json() {
        let tool = ToolDefinition {
            name: "search_code".into(),
            description: "Search files".into(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let json_len = serde_json::to_string(&tool).unwrap().len();
        assert_eq!(estimate_tools_tokens(&[tool]), json_len.div_ceil(4));
        assert_eq!(estimate_tools_tokens(&[]), 0);
    }
}
