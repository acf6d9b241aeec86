//! Tool dispatcher.
//!
//! Executes the tool calls of one model response. A batch made only of
//! sub-agent calls (more than one) runs as a bounded parallel pool; any
//! other batch runs strictly in model order. Every call gets its own child
//! monitor, so interrupting the batch monitor reaches each member, while
//! members that have not started yet are never started.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde_json::json;
use sweloop_core::approval::{ApprovalDecision, ApprovalPolicy, ApprovalRequest, AutoApprove};
use sweloop_core::debug_log::DebugLogger;
use sweloop_core::error::ToolError;
use sweloop_core::event::{AgentEvent, EventBus};
use sweloop_core::message::MessageToolCall;
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::tool::{ToolCall, ToolContext, ToolOutcome, ToolRegistry};
use sweloop_core::undo::{NoUndo, UndoPolicy};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::settings::LoopSettings;
use crate::summarize::summarize_tool_result;

/// Error text of a call the approval policy refused.
pub const DENIED_MESSAGE: &str = "Operation denied by user";

/// Outcomes of one batch, keyed by call id.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub outcomes: HashMap<String, ToolOutcome>,
    /// Some member was interrupted; the loop must not call the model again.
    pub cancelled: bool,
    pub parallel: bool,
}

impl BatchOutcome {
    pub fn get(&self, call_id: &str) -> Option<&ToolOutcome> {
        self.outcomes.get(call_id)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.values().filter(|o| !o.is_ok()).count()
    }
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    settings: Arc<LoopSettings>,
    approval: Arc<dyn ApprovalPolicy>,
    undo: Arc<dyn UndoPolicy>,
    events: Arc<EventBus>,
    debug: DebugLogger,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, settings: Arc<LoopSettings>, events: Arc<EventBus>) -> Self {
        Self {
            registry,
            settings,
            approval: Arc::new(AutoApprove),
            undo: Arc::new(NoUndo),
            events,
            debug: DebugLogger::disabled(),
        }
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalPolicy>) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_undo(mut self, undo: Arc<dyn UndoPolicy>) -> Self {
        self.undo = undo;
        self
    }

    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = debug;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Whether `calls` qualify for the parallel agent pool.
    pub fn is_parallel_batch(&self, calls: &[MessageToolCall]) -> bool {
        calls.len() > 1 && calls.iter().all(|c| c.name == self.settings.subagent_tool)
    }

    /// Execute one call under `monitor`.
    ///
    /// Never fails: unknown tools, bad arguments, denials and tool errors
    /// all come back as [`ToolOutcome::Err`].
    pub async fn execute_one(&self, call: &MessageToolCall, monitor: &TaskMonitor) -> ToolOutcome {
        if monitor.is_interrupted() {
            return ToolOutcome::Interrupted;
        }

        let request = match ToolCall::from_request(call) {
            Ok(request) => request,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Malformed tool arguments");
                return self.finish(call, ToolOutcome::error(e.to_string()), Instant::now());
            }
        };
        if !self.registry.contains(&call.name) {
            let outcome = ToolOutcome::error(ToolError::NotFound(call.name.clone()).to_string());
            return self.finish(call, outcome, Instant::now());
        }

        let approval = ApprovalRequest::new(&call.name, request.arguments.clone());
        let decision = tokio::select! {
            decision = self.approval.request(&approval) => decision,
            _ = monitor.interrupted() => return ToolOutcome::Interrupted,
        };
        if let ApprovalDecision::Denied { reason } = decision {
            debug!(tool = %call.name, reason = %reason, "Tool call denied");
            return self.finish(call, ToolOutcome::error(DENIED_MESSAGE), Instant::now());
        }

        self.events.publish(AgentEvent::ToolCallStarted {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: request.arguments.clone(),
        });
        self.debug.log(
            "tool_call_start",
            "dispatcher",
            json!({ "call_id": call.id, "tool": call.name, "arguments": request.arguments }),
        );

        let started = Instant::now();
        let call_monitor = monitor.child(format!("tool:{}", call.name));
        let ctx = ToolContext::new(self.approval.clone(), self.undo.clone(), call_monitor)
            .with_debug(self.debug.clone());
        let outcome: ToolOutcome = self.registry.execute(&request, &ctx).await.into();
        self.finish(call, outcome, started)
    }

    fn finish(&self, call: &MessageToolCall, outcome: ToolOutcome, started: Instant) -> ToolOutcome {
        let duration_ms = started.elapsed().as_millis() as u64;
        let summary = match &outcome {
            ToolOutcome::Ok(out) => summarize_tool_result(&call.name, Some(&out.output), None),
            other => summarize_tool_result(&call.name, None, other.error_message()),
        };
        debug!(
            tool = %call.name,
            call_id = %call.id,
            success = outcome.is_ok(),
            duration_ms,
            "Tool call finished"
        );
        self.events.publish(AgentEvent::ToolCallCompleted {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: outcome.is_ok(),
            interrupted: outcome.is_interrupted(),
            summary: summary.clone(),
            duration_ms,
        });
        self.debug.log(
            "tool_call_complete",
            "dispatcher",
            json!({
                "call_id": call.id,
                "tool": call.name,
                "success": outcome.is_ok(),
                "interrupted": outcome.is_interrupted(),
                "summary": summary,
                "duration_ms": duration_ms,
            }),
        );
        outcome
    }

    /// Execute every call in `calls` under the batch `monitor`.
    pub async fn execute_batch(&self, calls: &[MessageToolCall], monitor: &TaskMonitor) -> BatchOutcome {
        if self.is_parallel_batch(calls) {
            self.execute_parallel(calls, monitor).await
        } else {
            self.execute_sequential(calls, monitor).await
        }
    }

    async fn execute_sequential(&self, calls: &[MessageToolCall], monitor: &TaskMonitor) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        for call in calls {
            let outcome = if batch.cancelled || monitor.is_interrupted() {
                ToolOutcome::Interrupted
            } else {
                self.execute_one(call, monitor).await
            };
            if outcome.is_interrupted() {
                batch.cancelled = true;
            }
            batch.outcomes.insert(call.id.clone(), outcome);
        }
        batch
    }

    async fn execute_parallel(&self, calls: &[MessageToolCall], monitor: &TaskMonitor) -> BatchOutcome {
        let max_parallel = self.settings.max_parallel_agents.max(1);
        info!(calls = calls.len(), max_parallel, "Running parallel agent batch");
        self.events.publish(AgentEvent::ParallelBatchStarted {
            call_ids: calls.iter().map(|c| c.id.clone()).collect(),
            max_parallel,
        });

        let permits = Arc::new(Semaphore::new(max_parallel));
        // Cancelled once any member is interrupted: stops new starts only.
        let halt = CancellationToken::new();

        let mut pending: FuturesUnordered<_> = calls
            .iter()
            .map(|call| {
                let permits = permits.clone();
                let halt = halt.clone();
                async move {
                    let permit = tokio::select! {
                        permit = permits.acquire_owned() => permit.ok(),
                        _ = halt.cancelled() => None,
                        _ = monitor.interrupted() => None,
                    };
                    let outcome = match permit {
                        Some(_permit) if !halt.is_cancelled() && !monitor.is_interrupted() => {
                            self.execute_one(call, monitor).await
                        }
                        _ => ToolOutcome::Interrupted,
                    };
                    (call.id.clone(), outcome)
                }
            })
            .collect();

        let mut batch = BatchOutcome {
            parallel: true,
            ..BatchOutcome::default()
        };
        while let Some((id, outcome)) = pending.next().await {
            if outcome.is_interrupted() {
                batch.cancelled = true;
                halt.cancel();
            }
            batch.outcomes.insert(id, outcome);
        }

        self.events.publish(AgentEvent::ParallelBatchCompleted {
            succeeded: batch.succeeded(),
            failed: batch.failed(),
            cancelled: batch.cancelled,
        });
        batch
    }
}
