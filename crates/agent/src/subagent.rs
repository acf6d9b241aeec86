//! Sub-agent tool: runs a focused child loop for one delegated task.
//!
//! The child gets a fresh session, the parent's tools minus this one, no
//! reasoning pre-phase and no learning. Its tool calls come back as nested
//! records under the spawning call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sweloop_core::error::ToolError;
use sweloop_core::message::ToolCallRecord;
use sweloop_core::provider::Provider;
use sweloop_core::session::Session;
use sweloop_core::tool::{Tool, ToolContext, ToolOutput, ToolRegistry};
use tracing::info;

use crate::loop_runner::AgentLoop;
use crate::settings::LoopSettings;

pub struct SubAgentTool {
    name: String,
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    settings: Arc<LoopSettings>,
}

impl SubAgentTool {
    /// `registry` is what the child may use; it must not contain this tool.
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>, parent: &LoopSettings) -> Self {
        Self {
            name: parent.subagent_tool.clone(),
            provider,
            registry,
            settings: Arc::new(parent.for_subagent()),
        }
    }

    /// Add a sub-agent tool to `registry`, giving the child every tool
    /// registered so far.
    pub fn register(registry: &mut ToolRegistry, provider: Arc<dyn Provider>, parent: &LoopSettings) {
        let child_tools = Arc::new(registry.without(&parent.subagent_tool));
        registry.register(Arc::new(Self::new(provider, child_tools, parent)));
    }
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Delegate a self-contained task to a sub-agent with its own context. Several calls in one \
         response run in parallel. Returns the sub-agent's final answer."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "A few words naming the task"
                },
                "prompt": {
                    "type": "string",
                    "description": "Full instructions for the sub-agent"
                }
            },
            "required": ["prompt"]
        })
    }

    /// Spawning needs no approval; the child's own calls are approved as
    /// usual.
    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let prompt = arguments["prompt"]
            .as_str()
            .or_else(|| arguments["task"].as_str())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'prompt' argument".into()))?;
        let description = arguments["description"].as_str().unwrap_or("sub-task");
        ctx.check_interrupted(&self.name)?;

        let child = AgentLoop::new(self.provider.clone(), self.registry.clone(), self.settings.clone())
            .without_learning()
            .with_approval(ctx.approval.clone())
            .with_undo(ctx.undo.clone())
            .with_debug(ctx.debug.clone());
        let mut session = Session::new();
        info!(description, session_id = %session.id, "Starting sub-agent");

        let outcome = child.run_turn_with_monitor(&mut session, prompt, &ctx.monitor).await;
        if outcome.interrupted {
            return Err(ToolError::Interrupted(self.name.clone()));
        }
        if let Some(error) = outcome.error {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: error,
            });
        }

        let nested: Vec<ToolCallRecord> = session
            .messages
            .iter()
            .flat_map(|m| m.tool_calls.iter().cloned())
            .collect();
        info!(description, calls = nested.len(), iterations = outcome.iterations, "Sub-agent finished");

        let mut output = ToolOutput::text(format!("[{description}] {}", outcome.summary)).with_data(json!({
            "description": description,
            "iterations": outcome.iterations,
            "completion_status": outcome.completion_status,
            "tool_calls": nested.len(),
        }));
        output.separate_response = Some(outcome.summary);
        output.nested = nested;
        Ok(output)
    }
}
