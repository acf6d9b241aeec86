//! Message and tool-call record domain types.
//!
//! Messages are the value objects that flow through the whole engine:
//! the user asks → the loop calls the model → tools run → results come back
//! as tool-role messages → the model answers.
//!
//! Tool calls made by an assistant message live in a flat [`ToolCallArena`].
//! Calls made by a sub-agent are stored in the same arena with a `parent_id`
//! pointing at the spawning call, so the tree is acyclic by construction and
//! serializes as a plain list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::Usage;

/// Prefix the loop writes in front of failed tool results.
pub const TOOL_ERROR_PREFIX: &str = "Error:";

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (or a loop-injected nudge)
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

/// A single message in a conversation.
///
/// Every optional field defaults when absent so sessions written before the
/// field existed still load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any), with their results
    #[serde(default, skip_serializing_if = "ToolCallArena::is_empty")]
    pub tool_calls: ToolCallArena,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Token usage of the model call that produced this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<Usage>,

    /// Output of the reasoning pre-phase that preceded this answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_trace: Option<String>,

    /// Provider-native reasoning text, when the model exposes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,

    /// Optional metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: ToolCallArena::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            token_usage: None,
            thinking_trace: None,
            reasoning_content: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Attach the tool calls this assistant message requested.
    pub fn with_tool_calls(mut self, calls: ToolCallArena) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Whether this is a tool result reporting a failure.
    pub fn is_tool_error(&self) -> bool {
        self.role == Role::Tool && self.content.trim_start().starts_with(TOOL_ERROR_PREFIX)
    }

    /// Names of the top-level tools this message called, in order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_calls.roots().map(|r| r.name.as_str()).collect()
    }
}

/// A tool call as requested by the model, before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

impl MessageToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument string into a JSON object.
    ///
    /// Empty argument strings are treated as `{}`.
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// The persisted record of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub parameters: serde_json::Value,

    /// Opaque tool result
    #[serde(default)]
    pub result: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default = "default_approved")]
    pub approved: bool,

    /// The spawning call, for calls made inside a sub-agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

fn default_approved() -> bool {
    true
}

impl ToolCallRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
            result: serde_json::Value::Null,
            result_summary: None,
            error: None,
            approved: true,
            parent_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Build a record from the model's request, keeping unparseable
    /// arguments as a raw string.
    pub fn from_request(call: &MessageToolCall) -> Self {
        let parameters = call
            .parsed_arguments()
            .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()));
        Self::new(call.id.clone(), call.name.clone(), parameters)
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Flat, ordered storage for tool call records and their nesting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCallArena {
    records: Vec<ToolCallRecord>,
}

impl ToolCallArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a top-level record.
    pub fn push(&mut self, mut record: ToolCallRecord) {
        record.parent_id = None;
        self.records.push(record);
    }

    /// Append a record nested under `parent_id`.
    ///
    /// Returns false (and drops nothing into the arena) when the parent is
    /// not already present.
    pub fn push_nested(&mut self, parent_id: &str, mut record: ToolCallRecord) -> bool {
        if self.get(parent_id).is_none() {
            return false;
        }
        record.parent_id = Some(parent_id.to_string());
        self.records.push(record);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ToolCallRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ToolCallRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Top-level calls in request order.
    pub fn roots(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.records.iter().filter(|r| r.parent_id.is_none())
    }

    /// Direct children of `id` in insertion order.
    pub fn nested<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ToolCallRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.parent_id.as_deref() == Some(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ToolCallRecord> for ToolCallArena {
    fn from_iter<T: IntoIterator<Item = ToolCallRecord>>(iter: T) -> Self {
        let mut arena = Self::new();
        for record in iter {
            arena.push(record);
        }
        arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
        assert!(msg.thinking_trace.is_none());
    }

    #[test]
    fn tool_error_detection() {
        assert!(Message::tool_result("c1", "Error: file not found").is_tool_error());
        assert!(!Message::tool_result("c1", "ok").is_tool_error());
        assert!(!Message::assistant("Error: not a tool").is_tool_error());
    }

    #[test]
    fn legacy_message_without_optional_fields_loads() {
        let json = r#"{
            "id": "m1",
            "role": "assistant",
            "content": "done",
            "timestamp": "2025-01-01T00:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.content, "done");
        assert!(msg.token_usage.is_none());
        assert!(msg.reasoning_content.is_none());
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn arena_tracks_nesting_by_parent_id() {
        let mut arena = ToolCallArena::new();
        arena.push(ToolCallRecord::new("a", "spawn_subagent", serde_json::json!({})));
        arena.push(ToolCallRecord::new("b", "read_file", serde_json::json!({})));
        assert!(arena.push_nested("a", ToolCallRecord::new("a1", "list_files", serde_json::json!({}))));
        assert!(arena.push_nested("a", ToolCallRecord::new("a2", "read_file", serde_json::json!({}))));
        assert!(!arena.push_nested("missing", ToolCallRecord::new("x", "read_file", serde_json::json!({}))));

        let roots: Vec<_> = arena.roots().map(|r| r.id.as_str()).collect();
        assert_eq!(roots, vec!["a", "b"]);
        let children: Vec<_> = arena.nested("a").map(|r| r.id.as_str()).collect();
        assert_eq!(children, vec!["a1", "a2"]);
        assert_eq!(arena.nested("b").count(), 0);
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn arena_serializes_as_flat_list() {
        let mut arena = ToolCallArena::new();
        arena.push(ToolCallRecord::new("a", "spawn_subagent", serde_json::json!({})));
        arena.push_nested("a", ToolCallRecord::new("a1", "read_file", serde_json::json!({})));
        let value = serde_json::to_value(&arena).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(2));
        assert_eq!(value[1]["parent_id"], "a");
    }

    #[test]
    fn request_with_bad_arguments_keeps_raw_text() {
        let call = MessageToolCall::new("c1", "read_file", "{not json");
        let record = ToolCallRecord::from_request(&call);
        assert_eq!(record.parameters, serde_json::Value::String("{not json".into()));
        assert!(MessageToolCall::new("c2", "list_files", "").parsed_arguments().is_ok());
    }
}
