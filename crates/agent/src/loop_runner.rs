//! The agent loop: one user turn, from query to final answer.
//!
//! Each iteration runs, in order: the optional reasoning pre-phase, context
//! compaction, the action call, and then either the tool batch or the
//! no-tool-call handling. Every unit of work runs under its own child
//! monitor registered with the [`InterruptHandle`], so an interrupt cancels
//! exactly the work in flight and the loop stops at the next boundary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sweloop_config::AppConfig;
use sweloop_core::approval::{ApprovalPolicy, AutoApprove, AutonomyApproval};
use sweloop_core::debug_log::DebugLogger;
use sweloop_core::error::ProviderError;
use sweloop_core::event::{AgentEvent, EventBus};
use sweloop_core::message::{Message, MessageToolCall, Role, ToolCallArena, ToolCallRecord};
use sweloop_core::monitor::{InterruptHandle, TaskMonitor};
use sweloop_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use sweloop_core::session::{Session, SessionStore};
use sweloop_core::tool::{ToolOutcome, ToolRegistry};
use sweloop_core::undo::{NoUndo, UndoPolicy};
use sweloop_memory::{ConversationMemory, ConversationSummarizer, FileSessionStore};
use tracing::{debug, info, warn};

use crate::context::{ContextCompactor, LlmCompactor, compact_if_needed};
use crate::dispatcher::{DENIED_MESSAGE, ToolDispatcher};
use crate::learning::{AgentResponse, LearningLoop, LearningStep};
use crate::nudges::{EMPTY_REPLY_TEXT, NUDGES_EXHAUSTED_TEXT, READ_NUDGE, ToolErrorKind, smart_nudge};
use crate::reasoning::{ReasoningPhase, ReasoningTrace};
use crate::settings::LoopSettings;
use crate::subagent::SubAgentTool;
use crate::summarize::summarize_tool_result;

/// The pseudo-tool the model calls to end a turn explicitly.
pub const TASK_COMPLETE_TOOL: &str = "task_complete";

const DEFAULT_COMPLETION_SUMMARY: &str = "Task completed";

/// How the model reported the end of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Success,
    Failed,
}

/// What a finished turn reports back to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// The final answer shown to the user
    pub summary: String,
    /// Set when the turn ended on a model error
    pub error: Option<String>,
    /// Duration of the last model call
    pub latency_ms: u64,
    /// Set when the model ended the turn through `task_complete`
    pub completion_status: Option<CompletionStatus>,
    pub interrupted: bool,
    pub iterations: u32,
    /// Context usage at the last compaction check, in percent
    pub context_usage_pct: Option<f32>,
}

/// Mutable per-turn state of the loop.
#[derive(Debug, Clone)]
pub struct IterationContext {
    pub query: String,
    /// Working message list sent to the model; starts with the system prompt
    pub messages: Vec<Message>,
    pub consecutive_read_count: u32,
    /// Corrective nudges sent since the last fully successful batch
    pub consecutive_no_tool_call_count: u32,
    pub iteration_count: u32,
    pub last_batch_was_subagent: bool,
    pub last_tool_failed: bool,
    /// Error text of the last failed tool result in this turn's latest batch
    pub last_tool_error: Option<String>,
    pub last_response: Option<AgentResponse>,
    pub reasoning: Option<ReasoningTrace>,
}

impl IterationContext {
    pub fn new(query: &str, system_prompt: &str, history: &[Message]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
        Self {
            query: query.to_string(),
            messages,
            consecutive_read_count: 0,
            consecutive_no_tool_call_count: 0,
            iteration_count: 0,
            last_batch_was_subagent: false,
            last_tool_failed: false,
            last_tool_error: None,
            last_response: None,
            reasoning: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopAction {
    Continue,
    Break,
}

/// Everything one turn works on.
struct Turn<'a> {
    session: &'a mut Session,
    monitor: &'a TaskMonitor,
    system_prompt: String,
    tools: Vec<ToolDefinition>,
    memory: ConversationMemory,
    compactor: Option<Arc<dyn ContextCompactor>>,
    reasoning: ReasoningPhase,
    dispatcher: ToolDispatcher,
    debug: DebugLogger,
    ctx: IterationContext,
    outcome: TurnOutcome,
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    settings: Arc<LoopSettings>,
    approval: Arc<dyn ApprovalPolicy>,
    undo: Arc<dyn UndoPolicy>,
    events: Arc<EventBus>,
    interrupt: InterruptHandle,
    debug: DebugLogger,
    debug_dir: Option<PathBuf>,
    /// Replaces the default per-turn compactor when set
    compactor: Option<Arc<dyn ContextCompactor>>,
    learning: Option<Arc<LearningLoop>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>, settings: Arc<LoopSettings>) -> Self {
        let learning = settings.learning.enabled.then(|| {
            Arc::new(LearningLoop::with_provider(
                provider.clone(),
                &settings.auxiliary_model,
                settings.learning.max_retries,
            ))
        });
        Self {
            provider,
            registry,
            settings,
            approval: Arc::new(AutoApprove),
            undo: Arc::new(NoUndo),
            events: Arc::new(EventBus::default()),
            interrupt: InterruptHandle::new(),
            debug: DebugLogger::disabled(),
            debug_dir: None,
            compactor: None,
            learning,
            store: None,
        }
    }

    /// Wire an agent from configuration: workspace tools plus the sub-agent
    /// tool, autonomy-based approval, per-session debug logs and session
    /// auto-save as configured.
    ///
    /// In supervised mode mutating tools are refused until an approval
    /// policy with a prompter is supplied through [`with_approval`](Self::with_approval).
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let settings = Arc::new(LoopSettings::from_config(config));
        let mut registry = sweloop_tools::default_registry(config.workspace_dir());
        SubAgentTool::register(&mut registry, provider.clone(), &settings);
        let approval = AutonomyApproval::new(config.autonomy.level, registry.read_only_names());

        let mut agent = Self::new(provider, Arc::new(registry), settings).with_approval(Arc::new(approval));
        if config.debug.enabled {
            agent = agent.with_debug_dir(config.debug_dir());
        }
        if config.sessions.auto_save {
            agent = agent.with_session_store(Arc::new(FileSessionStore::new(config.sessions_dir())));
        }
        agent
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalPolicy>) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_undo(mut self, undo: Arc<dyn UndoPolicy>) -> Self {
        self.undo = undo;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_interrupt_handle(mut self, handle: InterruptHandle) -> Self {
        self.interrupt = handle;
        self
    }

    /// Log every turn to `debug`.
    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = debug;
        self
    }

    /// Open one debug log per session under `dir`.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn with_compactor(mut self, compactor: Arc<dyn ContextCompactor>) -> Self {
        self.compactor = Some(compactor);
        self
    }

    pub fn with_learning(mut self, learning: Arc<LearningLoop>) -> Self {
        self.learning = Some(learning);
        self
    }

    pub fn without_learning(mut self) -> Self {
        self.learning = None;
        self
    }

    /// Save the session after every turn.
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Handle for interrupting the turn in flight from another task.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one user turn against `session`.
    pub async fn run_turn(&self, session: &mut Session, query: &str) -> TurnOutcome {
        let monitor = TaskMonitor::new(format!("turn:{}", session.id));
        self.run_turn_with_monitor(session, query, &monitor).await
    }

    /// Run one user turn whose units of work are children of `parent`.
    pub async fn run_turn_with_monitor(&self, session: &mut Session, query: &str, parent: &TaskMonitor) -> TurnOutcome {
        let monitor = parent.child("turn");
        let _turn_guard = self.interrupt.activate(&monitor);
        let debug = self.turn_debug_logger(&session.id);
        info!(session_id = %session.id, model = %self.settings.model, "Processing turn");
        self.events.publish(AgentEvent::TurnStarted {
            session_id: session.id.clone(),
            query: query.to_string(),
            timestamp: chrono::Utc::now(),
        });
        debug.log("turn_start", "agent_loop", json!({ "query": query }));

        let system_prompt = self.system_prompt(session);
        let mut memory = ConversationMemory::new(
            ConversationSummarizer::new(
                self.provider.clone(),
                self.settings.auxiliary_model.clone(),
                self.settings.summarizer,
            )
            .with_debug(debug.clone()),
            self.settings.short_term,
        );
        memory.attach(session);

        session.append_message(Message::user(query));
        let ctx = IterationContext::new(query, &system_prompt, session.current_messages());
        let tools = self.tool_definitions();
        let compactor = self.turn_compactor(&tools, &debug);

        let mut turn = Turn {
            session,
            monitor: &monitor,
            system_prompt,
            tools,
            memory,
            compactor,
            reasoning: ReasoningPhase::new(self.provider.clone(), self.settings.model.clone(), self.settings.reasoning)
                .with_debug(debug.clone()),
            dispatcher: ToolDispatcher::new(self.registry.clone(), self.settings.clone(), self.events.clone())
                .with_approval(self.approval.clone())
                .with_undo(self.undo.clone())
                .with_debug(debug.clone()),
            debug,
            ctx,
            outcome: TurnOutcome::default(),
        };

        loop {
            turn.ctx.iteration_count += 1;
            if turn.ctx.iteration_count > self.settings.max_iterations {
                warn!(
                    session_id = %turn.session.id,
                    max_iterations = self.settings.max_iterations,
                    "Iteration limit reached"
                );
                let text = format!(
                    "Stopped after {} iterations without finishing. Send a follow-up message to continue.",
                    self.settings.max_iterations
                );
                self.finish(&mut turn, text, None);
                break;
            }
            if turn.monitor.is_interrupted() {
                self.interrupted(&mut turn, "turn");
                break;
            }
            debug!(iteration = turn.ctx.iteration_count, "Agent loop iteration");
            if self.run_iteration(&mut turn).await == LoopAction::Break {
                break;
            }
        }

        let Turn {
            session,
            memory,
            compactor,
            debug,
            ctx,
            mut outcome,
            ..
        } = turn;
        outcome.iterations = ctx.iteration_count.min(self.settings.max_iterations);
        outcome.context_usage_pct = compactor.map(|c| c.usage_pct());
        memory.persist(session);

        if let Some(store) = &self.store
            && let Err(e) = store.save(session).await
        {
            warn!(session_id = %session.id, error = %e, "Failed to save session");
        }
        debug.log(
            "turn_end",
            "agent_loop",
            json!({
                "iterations": outcome.iterations,
                "interrupted": outcome.interrupted,
                "error": outcome.error,
                "tokens": monitor.token_count(),
            }),
        );
        info!(
            session_id = %session.id,
            iterations = outcome.iterations,
            interrupted = outcome.interrupted,
            "Turn finished"
        );
        outcome
    }

    async fn run_iteration(&self, turn: &mut Turn<'_>) -> LoopAction {
        // Reasoning pre-phase, skipped right after a sub-agent batch.
        let mut trace = None;
        if turn.reasoning.enabled() && !turn.ctx.last_batch_was_subagent {
            let monitor = turn.monitor.child("reasoning");
            let _guard = self.interrupt.activate(&monitor);
            // Recall reads the persisted history so the summary index stays
            // valid across turns.
            let recalled = turn.memory.recall(turn.session.current_messages(), &monitor).await;
            match turn.reasoning.plan(&recalled, &turn.system_prompt, &monitor).await {
                Ok(plan) => trace = plan,
                Err(_) => return self.interrupted(turn, "reasoning"),
            }
        }
        if let Some(plan) = &trace {
            self.events.publish(AgentEvent::ReasoningProduced {
                trace: plan.stored(),
                iteration: turn.ctx.iteration_count,
            });
            turn.ctx.reasoning = Some(plan.clone());
        }

        if let Some(compactor) = turn.compactor.clone() {
            let monitor = turn.monitor.child("compaction");
            let compacted = {
                let _guard = self.interrupt.activate(&monitor);
                compact_if_needed(compactor.as_ref(), &turn.ctx.messages, &turn.system_prompt, &monitor).await
            };
            if monitor.is_interrupted() {
                return self.interrupted(turn, "compaction");
            }
            if let Some(messages) = compacted {
                let before = turn.ctx.messages.len();
                turn.ctx.messages = messages;
                self.events.publish(AgentEvent::ContextCompacted {
                    before,
                    after: turn.ctx.messages.len(),
                });
            }
        }

        let mut messages = turn.ctx.messages.clone();
        if let Some(plan) = &trace {
            messages.push(Message::user(plan.injection()));
        }
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: turn.tools.clone(),
        };

        let monitor = turn.monitor.child("model_call");
        let started = Instant::now();
        let result = {
            let _guard = self.interrupt.activate(&monitor);
            tokio::select! {
                result = self.provider.complete(request, &monitor) => result,
                _ = monitor.interrupted() => Err(ProviderError::Interrupted),
            }
        };
        turn.outcome.latency_ms = started.elapsed().as_millis() as u64;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_interrupted() || monitor.is_interrupted() => {
                return self.interrupted(turn, "model_call");
            }
            Err(e) => return self.model_error(turn, e),
        };

        if let Some(usage) = &response.usage {
            turn.monitor.add_tokens(u64::from(usage.total_tokens));
        }
        turn.debug.log(
            "llm_response",
            "agent_loop",
            json!({
                "iteration": turn.ctx.iteration_count,
                "latency_ms": turn.outcome.latency_ms,
                "content": response.content,
                "tool_calls": response.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            }),
        );

        let content = response.content.trim().to_string();
        turn.ctx.last_response = Some(AgentResponse {
            content: content.clone(),
            tool_names: response.tool_calls.iter().map(|c| c.name.clone()).collect(),
        });

        if response.tool_calls.is_empty() {
            self.handle_no_tool_calls(turn, content, &response)
        } else {
            self.handle_tool_calls(turn, content, &response).await
        }
    }

    fn handle_no_tool_calls(&self, turn: &mut Turn<'_>, content: String, response: &ProviderResponse) -> LoopAction {
        let Some(error_text) = turn.ctx.last_tool_error.clone() else {
            let text = if content.is_empty() {
                EMPTY_REPLY_TEXT.to_string()
            } else {
                content
            };
            self.finish(turn, text, Some(response));
            return LoopAction::Break;
        };

        if turn.ctx.consecutive_no_tool_call_count < self.settings.max_failed_tool_nudges {
            turn.ctx.consecutive_no_tool_call_count += 1;
            if !content.is_empty() {
                self.events.publish(AgentEvent::AssistantText {
                    content: content.clone(),
                    is_final: false,
                });
                turn.ctx.messages.push(Message::assistant(content));
            }
            let kind = ToolErrorKind::classify(&error_text);
            debug!(
                kind = %kind,
                nudges = turn.ctx.consecutive_no_tool_call_count,
                "Nudging after failed tool"
            );
            turn.ctx.messages.push(Message::user(smart_nudge(&error_text)));
            return LoopAction::Continue;
        }

        let text = if content.is_empty() {
            NUDGES_EXHAUSTED_TEXT.to_string()
        } else {
            content
        };
        self.finish(turn, text, Some(response));
        LoopAction::Break
    }

    async fn handle_tool_calls(&self, turn: &mut Turn<'_>, content: String, response: &ProviderResponse) -> LoopAction {
        let calls = &response.tool_calls;

        if calls.iter().all(|c| self.settings.is_read_only(&c.name)) {
            turn.ctx.consecutive_read_count += 1;
        } else {
            turn.ctx.consecutive_read_count = 0;
        }

        if let Some(call) = calls.iter().find(|c| c.name == TASK_COMPLETE_TOOL) {
            let args = call.parsed_arguments().unwrap_or_default();
            let summary = args["summary"]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_COMPLETION_SUMMARY)
                .to_string();
            let status = match args["status"].as_str() {
                Some("failed") => CompletionStatus::Failed,
                _ => CompletionStatus::Success,
            };
            info!(status = ?status, "Task completed by model");
            turn.outcome.completion_status = Some(status);
            self.finish(turn, summary, Some(response));
            return LoopAction::Break;
        }

        if !content.is_empty() {
            self.events.publish(AgentEvent::AssistantText {
                content: content.clone(),
                is_final: false,
            });
        }
        debug!(tool_count = calls.len(), "Executing tool calls");

        let monitor = turn.monitor.child("tool_batch");
        let batch = {
            let _guard = self.interrupt.activate(&monitor);
            turn.dispatcher.execute_batch(calls, &monitor).await
        };

        let mut records = ToolCallArena::new();
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let outcome = batch.get(&call.id).cloned().unwrap_or(ToolOutcome::Interrupted);
            let (record, nested) = build_record(call, &outcome);
            records.push(record);
            for child in nested {
                records.push_nested(&call.id, child);
            }
            if let ToolOutcome::Ok(output) = &outcome
                && let Some(answer) = &output.separate_response
            {
                self.events.publish(AgentEvent::AssistantText {
                    content: answer.clone(),
                    is_final: false,
                });
            }
            results.push(Message::tool_result(call.id.clone(), outcome.history_content()));
        }

        let step = Message::assistant(content).with_tool_calls(records.clone());
        turn.ctx.messages.push(step.clone());
        turn.ctx.messages.extend(results.iter().cloned());
        turn.ctx.last_batch_was_subagent = calls.iter().all(|c| c.name == self.settings.subagent_tool);
        turn.ctx.last_tool_error = last_tool_error(&results);
        turn.ctx.last_tool_failed = turn.ctx.last_tool_error.is_some();

        if batch.cancelled {
            return self.interrupted(turn, "tool_dispatch");
        }

        turn.session.append_message(step);
        for result in results {
            turn.session.append_message(result);
        }
        if batch.failed() == 0 {
            turn.ctx.consecutive_no_tool_call_count = 0;
        }

        if let Some(learning) = &self.learning {
            let roots: Vec<ToolCallRecord> = records.roots().cloned().collect();
            let monitor = turn.monitor.child("learning");
            let _guard = self.interrupt.activate(&monitor);
            learning
                .record(
                    turn.session,
                    LearningStep {
                        query: &turn.ctx.query,
                        response: turn.ctx.last_response.as_ref(),
                        records: &roots,
                    },
                    &monitor,
                    &turn.debug,
                    &self.events,
                )
                .await;
            if monitor.is_interrupted() {
                return self.interrupted(turn, "learning");
            }
        }

        if turn.ctx.consecutive_read_count >= self.settings.read_nudge_threshold {
            debug!(reads = turn.ctx.consecutive_read_count, "Nudging after consecutive reads");
            turn.ctx.messages.push(Message::user(READ_NUDGE));
            turn.ctx.consecutive_read_count = 0;
        }
        LoopAction::Continue
    }

    /// Persist the final assistant message and end the turn.
    fn finish(&self, turn: &mut Turn<'_>, text: String, response: Option<&ProviderResponse>) {
        let mut message = Message::assistant(text.clone());
        message.thinking_trace = turn.ctx.reasoning.as_ref().map(ReasoningTrace::stored);
        if let Some(response) = response {
            message.reasoning_content = response.reasoning_content.clone();
            message.token_usage = response.usage;
        }
        turn.session.append_message(message);
        self.events.publish(AgentEvent::AssistantText {
            content: text.clone(),
            is_final: true,
        });
        turn.outcome.summary = text;
    }

    fn model_error(&self, turn: &mut Turn<'_>, error: ProviderError) -> LoopAction {
        let text = error.to_string();
        warn!(session_id = %turn.session.id, error = %text, "Model call failed");
        turn.debug.log("llm_error", "agent_loop", json!({ "error": text }));
        let mut message = Message::assistant(text.clone());
        message.metadata.insert("error".into(), json!(true));
        turn.session.append_message(message);
        self.events.publish(AgentEvent::Error { message: text.clone() });
        turn.outcome.error = Some(text);
        LoopAction::Break
    }

    fn interrupted(&self, turn: &mut Turn<'_>, phase: &str) -> LoopAction {
        info!(session_id = %turn.session.id, phase, "Turn interrupted");
        turn.debug.log("interrupted", "agent_loop", json!({ "phase": phase }));
        self.events.publish(AgentEvent::Interrupted { phase: phase.to_string() });
        turn.outcome.interrupted = true;
        LoopAction::Break
    }

    /// Base system prompt plus the session's learned strategies.
    fn system_prompt(&self, session: &Session) -> String {
        let mut prompt = self.settings.system_prompt.clone();
        if self.learning.is_some() {
            let strategies = session.playbook().as_context(self.settings.learning.max_strategies);
            if !strategies.is_empty() {
                prompt.push_str("\n\n");
                prompt.push_str(strategies.trim_end());
            }
        }
        prompt
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut tools = self.registry.definitions();
        tools.push(task_complete_definition());
        tools
    }

    fn turn_compactor(&self, tools: &[ToolDefinition], debug: &DebugLogger) -> Option<Arc<dyn ContextCompactor>> {
        if let Some(compactor) = &self.compactor {
            return Some(compactor.clone());
        }
        self.settings.compaction.enabled.then(|| {
            Arc::new(
                LlmCompactor::new(
                    self.provider.clone(),
                    self.settings.auxiliary_model.clone(),
                    self.settings.compaction,
                )
                .with_tools(tools)
                .with_debug(debug.clone()),
            ) as Arc<dyn ContextCompactor>
        })
    }

    fn turn_debug_logger(&self, session_id: &str) -> DebugLogger {
        if self.debug.is_enabled() {
            return self.debug.clone();
        }
        let Some(dir) = &self.debug_dir else {
            return DebugLogger::disabled();
        };
        DebugLogger::open(dir, session_id).unwrap_or_else(|e| {
            warn!(dir = %dir.display(), error = %e, "Could not open debug log");
            DebugLogger::disabled()
        })
    }
}

pub fn task_complete_definition() -> ToolDefinition {
    ToolDefinition {
        name: TASK_COMPLETE_TOOL.into(),
        description: "Finish the current task. Call this once the request is done, or when it cannot be done."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Short summary of what was done, shown to the user"
                },
                "status": {
                    "type": "string",
                    "enum": ["success", "failed"],
                    "description": "Whether the task succeeded"
                }
            },
            "required": ["summary"]
        }),
    }
}

/// Error text of the most recent tool result, if that result failed.
fn last_tool_error(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Tool)
        .filter(|m| m.is_tool_error())
        .map(|m| m.content.clone())
}

/// The stored record for one executed call, plus any calls it made itself.
fn build_record(call: &MessageToolCall, outcome: &ToolOutcome) -> (ToolCallRecord, Vec<ToolCallRecord>) {
    let mut record = ToolCallRecord::from_request(call);
    match outcome {
        ToolOutcome::Ok(output) => {
            record.result = output
                .data
                .clone()
                .unwrap_or_else(|| serde_json::Value::String(output.output.clone()));
            record.result_summary = Some(summarize_tool_result(&call.name, Some(&output.output), None));
            (record, output.nested.clone())
        }
        other => {
            let error = other.error_message().unwrap_or_default().to_string();
            record.approved = error != DENIED_MESSAGE;
            record.result_summary = Some(summarize_tool_result(&call.name, None, Some(&error)));
            record.error = Some(error);
            (record, Vec::new())
        }
    }
}
