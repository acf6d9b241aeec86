//! Approval policies: who gets to say yes before a tool runs.
//!
//! The dispatcher asks the injected policy before every execution. Policies
//! may decide on their own or defer to an interactive prompter supplied by
//! the UI layer.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the dispatcher is about to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub tool_name: String,

    /// One-line human readable description of the operation
    pub description: String,

    pub arguments: serde_json::Value,
}

impl ApprovalRequest {
    pub fn new(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        let tool_name = tool_name.into();
        let description = describe(&tool_name, &arguments);
        Self {
            tool_name,
            description,
            arguments,
        }
    }
}

fn describe(tool_name: &str, arguments: &serde_json::Value) -> String {
    let target = ["path", "file_path", "pattern", "task", "description"]
        .iter()
        .find_map(|key| arguments.get(*key).and_then(|v| v.as_str()));
    match target {
        Some(target) => format!("{tool_name}({target})"),
        None => tool_name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Denied { reason: String },
}

impl ApprovalDecision {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[async_trait]
pub trait ApprovalPolicy: Send + Sync {
    async fn request(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalPolicy for AutoApprove {
    async fn request(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approved
    }
}

/// Denies everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl ApprovalPolicy for DenyAll {
    async fn request(&self, request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::denied(format!("{} is not allowed", request.tool_name))
    }
}

/// How much freedom the agent has to act.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    /// Can only read, never mutate
    ReadOnly,
    /// Must ask permission for mutating actions (default)
    #[default]
    Supervised,
    /// Full autonomy: execute everything
    Full,
}

/// Decides from the configured autonomy level, deferring mutating
/// operations to a prompter in supervised mode.
pub struct AutonomyApproval {
    level: AutonomyLevel,
    read_only_tools: HashSet<String>,
    prompter: Option<Arc<dyn ApprovalPolicy>>,
}

impl AutonomyApproval {
    pub fn new(level: AutonomyLevel, read_only_tools: impl IntoIterator<Item = String>) -> Self {
        Self {
            level,
            read_only_tools: read_only_tools.into_iter().collect(),
            prompter: None,
        }
    }

    /// Policy consulted for mutating operations in supervised mode.
    /// Without one, those operations are denied.
    pub fn with_prompter(mut self, prompter: Arc<dyn ApprovalPolicy>) -> Self {
        self.prompter = Some(prompter);
        self
    }
}

#[async_trait]
impl ApprovalPolicy for AutonomyApproval {
    async fn request(&self, request: &ApprovalRequest) -> ApprovalDecision {
        if self.read_only_tools.contains(&request.tool_name) {
            return ApprovalDecision::Approved;
        }
        match self.level {
            AutonomyLevel::Full => ApprovalDecision::Approved,
            AutonomyLevel::ReadOnly => {
                ApprovalDecision::denied(format!("{} is blocked in read-only mode", request.description))
            }
            AutonomyLevel::Supervised => match &self.prompter {
                Some(prompter) => prompter.request(request).await,
                None => ApprovalDecision::denied(format!(
                    "{} requires approval and no prompter is attached",
                    request.description
                )),
            },
        }
    }
}
