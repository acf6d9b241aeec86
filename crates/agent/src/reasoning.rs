//! Reasoning pre-phase.
//!
//! Before an action call the loop can ask the model for a short plan. The
//! plan is built from recalled memory only (episodic summary plus the
//! short-term window), never from the full transcript, and is injected
//! into the next action request as a user message.

use std::sync::Arc;

use serde_json::json;
use sweloop_config::ReasoningMode;
use sweloop_core::debug_log::DebugLogger;
use sweloop_core::error::ProviderError;
use sweloop_core::message::Message;
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::provider::{Provider, ProviderRequest};
use sweloop_memory::MemoryContext;
use tracing::{debug, warn};

const THINKING_SYSTEM_PROMPT: &str = "You plan the next step of a software engineering agent. \
You cannot call tools. Read the conversation context and describe, in a few short lines, what the \
agent should do next and why. Name the tools it should use.";

const ANALYSIS_PROMPT: &str = "Analyse the request and the progress so far. What is the single \
best next action? Keep it under ten lines.";

const CRITIQUE_SYSTEM_PROMPT: &str = "You review plans written by a software engineering agent. \
Point out wrong assumptions, missing steps and risky actions. Be brief.";

const NO_HISTORY: &str = "(No conversation history)";

/// A plan produced by the pre-phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningTrace {
    pub plan: String,
    pub critique: Option<String>,
}

impl ReasoningTrace {
    /// The text injected before the action call.
    pub fn injection(&self) -> String {
        let mut text = format!("THINKING TRACE (your plan for this step):\n{}", self.plan);
        if let Some(critique) = &self.critique {
            text.push_str("\n\n[Critique]\n");
            text.push_str(critique);
        }
        text.push_str("\n\nNow act on this plan.");
        text
    }

    /// Plan and critique as stored on the final message.
    pub fn stored(&self) -> String {
        match &self.critique {
            Some(critique) => format!("{}\n\n[Critique]\n{critique}", self.plan),
            None => self.plan.clone(),
        }
    }
}

pub struct ReasoningPhase {
    provider: Arc<dyn Provider>,
    model: String,
    mode: ReasoningMode,
    debug: DebugLogger,
}

impl ReasoningPhase {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, mode: ReasoningMode) -> Self {
        Self {
            provider,
            model: model.into(),
            mode,
            debug: DebugLogger::disabled(),
        }
    }

    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = debug;
        self
    }

    pub fn enabled(&self) -> bool {
        self.mode != ReasoningMode::Off
    }

    /// Produce a plan for the next action.
    ///
    /// Model failures are logged and yield `Ok(None)`; only an interrupt is
    /// reported as an error, so the loop can stop the turn.
    pub async fn plan(
        &self,
        memory: &MemoryContext,
        system_prompt: &str,
        monitor: &TaskMonitor,
    ) -> Result<Option<ReasoningTrace>, ProviderError> {
        if !self.enabled() {
            return Ok(None);
        }

        let messages = vec![
            Message::system(format!("{THINKING_SYSTEM_PROMPT}\n\n{}", render_context(memory, system_prompt))),
            Message::user(ANALYSIS_PROMPT),
        ];
        let Some(plan) = self.ask(messages, monitor).await? else {
            return Ok(None);
        };
        debug!(chars = plan.len(), "Reasoning trace produced");

        let critique = if self.mode == ReasoningMode::SelfCritique {
            let messages = vec![
                Message::system(CRITIQUE_SYSTEM_PROMPT),
                Message::user(format!("Please critique the following plan:\n\n{plan}")),
            ];
            self.ask(messages, monitor).await?
        } else {
            None
        };

        self.debug.log(
            "reasoning_trace",
            "reasoning",
            json!({ "plan": plan, "critique": critique }),
        );
        Ok(Some(ReasoningTrace { plan, critique }))
    }

    async fn ask(&self, messages: Vec<Message>, monitor: &TaskMonitor) -> Result<Option<String>, ProviderError> {
        let request = ProviderRequest::plain(&self.model, messages);
        let result = tokio::select! {
            result = self.provider.complete(request, monitor) => result,
            _ = monitor.interrupted() => Err(ProviderError::Interrupted),
        };
        match result {
            Ok(response) => {
                let text = response.content.trim();
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
            Err(e) if e.is_interrupted() || monitor.is_interrupted() => Err(ProviderError::Interrupted),
            Err(e) => {
                warn!(error = %e, "Reasoning call failed; continuing without a plan");
                Ok(None)
            }
        }
    }
}

fn render_context(memory: &MemoryContext, system_prompt: &str) -> String {
    let mut out = String::from("AGENT INSTRUCTIONS:\n");
    out.push_str(system_prompt);
    if let Some(summary) = &memory.episodic {
        out.push_str("\n\nCONVERSATION SUMMARY (episodic memory):\n");
        out.push_str(summary);
    }
    out.push_str("\n\nRECENT CONVERSATION:\n");
    if memory.recent.is_empty() {
        out.push_str(NO_HISTORY);
    } else {
        out.push_str(&memory.render_recent());
    }
    out
}
