//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the agent act on a workspace: read and search files,
//! write changes, spawn sub-agents. Every execution receives a
//! [`ToolContext`] carrying the approval and undo policies and the monitor
//! for the current unit of work.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::approval::{ApprovalPolicy, AutoApprove};
use crate::debug_log::DebugLogger;
use crate::error::ToolError;
use crate::message::{MessageToolCall, ToolCallRecord};
use crate::monitor::TaskMonitor;
use crate::provider::ToolDefinition;
use crate::undo::{NoUndo, UndoPolicy};

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Convert a model request, failing on malformed argument JSON.
    pub fn from_request(call: &MessageToolCall) -> Result<Self, ToolError> {
        let arguments = call
            .parsed_arguments()
            .map_err(|e| ToolError::InvalidArguments(format!("{}: {e}", call.name)))?;
        Ok(Self::new(call.id.clone(), call.name.clone(), arguments))
    }
}

/// What a successful tool execution produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text fed back to the model as the tool result
    pub output: String,

    /// Text to surface as if the model said it directly (sub-agent answers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separate_response: Option<String>,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Calls made on this tool's behalf (sub-agent calls)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<ToolCallRecord>,
}

impl ToolOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The result of one dispatched call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok(ToolOutput),
    Err { message: String },
    Interrupted,
}

impl ToolOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Err {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Err { message } => Some(message),
            Self::Interrupted => Some("Interrupted by user"),
            Self::Ok(_) => None,
        }
    }

    /// The text the model sees for this call.
    ///
    /// Successful calls prefer the separate response; failures are rendered
    /// with the `Error:` prefix the loop keys its nudges on.
    pub fn history_content(&self) -> String {
        match self {
            Self::Ok(out) => out
                .separate_response
                .clone()
                .unwrap_or_else(|| out.output.clone()),
            Self::Err { message } => format!("Error: {message}"),
            Self::Interrupted => "Error: Interrupted by user".to_string(),
        }
    }
}

impl From<Result<ToolOutput, ToolError>> for ToolOutcome {
    fn from(result: Result<ToolOutput, ToolError>) -> Self {
        match result {
            Ok(output) => Self::Ok(output),
            Err(ToolError::Interrupted(_)) => Self::Interrupted,
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Everything a tool may need besides its arguments.
#[derive(Clone)]
pub struct ToolContext {
    pub approval: Arc<dyn ApprovalPolicy>,
    pub undo: Arc<dyn UndoPolicy>,
    pub monitor: TaskMonitor,
    pub debug: DebugLogger,
}

impl ToolContext {
    pub fn new(approval: Arc<dyn ApprovalPolicy>, undo: Arc<dyn UndoPolicy>, monitor: TaskMonitor) -> Self {
        Self {
            approval,
            undo,
            monitor,
            debug: DebugLogger::disabled(),
        }
    }

    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = debug;
        self
    }

    /// Auto-approving context with no undo, for tests and sub-agents.
    pub fn permissive(monitor: TaskMonitor) -> Self {
        Self::new(Arc::new(AutoApprove), Arc::new(NoUndo), monitor)
    }

    /// Same policies, different monitor.
    pub fn for_monitor(&self, monitor: TaskMonitor) -> Self {
        Self {
            monitor,
            ..self.clone()
        }
    }

    /// Fail fast when the current unit has been interrupted.
    pub fn check_interrupted(&self, tool_name: &str) -> Result<(), ToolError> {
        if self.monitor.is_interrupted() {
            return Err(ToolError::Interrupted(tool_name.to_string()));
        }
        Ok(())
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether this tool only observes the workspace.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// A copy of this registry without the named tool.
    pub fn without(&self, name: &str) -> Self {
        let mut copy = self.clone();
        copy.tools.remove(name);
        copy
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Names of tools that only observe the workspace.
    pub fn read_only_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .tools
            .values()
            .filter(|t| t.is_read_only())
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        ctx.check_interrupted(&call.name)?;
        tool.execute(call.arguments.clone(), ctx).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        fn is_read_only(&self) -> bool { true }
        async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> std::result::Result<ToolOutput, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolOutput::text(text))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::permissive(TaskMonitor::new("test"))
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.read_only_names(), vec!["echo".to_string()]);
        assert!(registry.without("echo").is_empty());
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let call = ToolCall::new("call_1", "echo", serde_json::json!({"text": "hello world"}));
        let result = registry.execute(&call, &ctx()).await.unwrap();
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("call_1", "nonexistent", serde_json::json!({}));
        let err = registry.execute(&call, &ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn interrupted_context_does_not_start_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let ctx = ctx();
        ctx.monitor.request_interrupt();
        let call = ToolCall::new("call_1", "echo", serde_json::json!({"text": "x"}));
        let outcome: ToolOutcome = registry.execute(&call, &ctx).await.into();
        assert!(outcome.is_interrupted());
    }

    #[test]
    fn history_content_prefers_separate_response() {
        let mut out = ToolOutput::text("raw");
        out.separate_response = Some("answer".into());
        assert_eq!(ToolOutcome::Ok(out).history_content(), "answer");
        assert_eq!(ToolOutcome::error("boom").history_content(), "Error: boom");
    }

    #[test]
    fn malformed_request_arguments_are_rejected() {
        let call = MessageToolCall::new("c1", "echo", "{oops");
        assert!(matches!(ToolCall::from_request(&call), Err(ToolError::InvalidArguments(_))));
    }
}
