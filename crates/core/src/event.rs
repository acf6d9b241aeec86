//! Agent events: fire-and-forget notifications for the UI layer.
//!
//! The loop publishes an event at every observable step. Subscribers filter
//! for what they care about; publishing never waits on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    TurnStarted {
        session_id: String,
        query: String,
        timestamp: DateTime<Utc>,
    },

    /// The reasoning pre-phase produced a trace
    ReasoningProduced {
        trace: String,
        iteration: u32,
    },

    ToolCallStarted {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    ToolCallCompleted {
        call_id: String,
        tool_name: String,
        success: bool,
        interrupted: bool,
        summary: String,
        duration_ms: u64,
    },

    ParallelBatchStarted {
        call_ids: Vec<String>,
        max_parallel: usize,
    },

    ParallelBatchCompleted {
        succeeded: usize,
        failed: usize,
        cancelled: bool,
    },

    AssistantText {
        content: String,
        is_final: bool,
    },

    /// The turn was cancelled by the user
    Interrupted {
        phase: String,
    },

    Error {
        message: String,
    },

    ContextCompacted {
        before: usize,
        after: usize,
    },

    PlaybookUpdated {
        bullets: usize,
        operations: usize,
    },
}

/// A broadcast-based event bus for agent events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
