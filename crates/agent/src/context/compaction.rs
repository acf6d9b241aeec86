//! Context compaction.
//!
//! When the working message list approaches the context window, everything
//! between the head system message and the most recent messages is replaced
//! by a single `[CONVERSATION SUMMARY]` user message. The input list is never
//! modified; callers swap in the returned list as a whole.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use sweloop_core::debug_log::DebugLogger;
use sweloop_core::message::{Message, Role};
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::provider::{Provider, ProviderRequest, ToolDefinition};
use tracing::{info, warn};

use super::token::{estimate_message_tokens, estimate_tokens, estimate_tools_tokens};
use crate::settings::CompactionSettings;

pub const COMPACTION_SUMMARY_PREFIX: &str = "[CONVERSATION SUMMARY]";

const COMPACTED_PLACEHOLDER: &str = "[Previous conversation context was compacted.]";

/// Lists this short are never compacted.
const MIN_COMPACTABLE: usize = 4;
const MAX_KEEP_RECENT: usize = 10;
const MIN_KEEP_RECENT: usize = 2;

/// Chars of each message sent to the summarizing model.
const PROMPT_SNIPPET_CHARS: usize = 500;
const FALLBACK_SNIPPET_CHARS: usize = 200;
const FALLBACK_BUDGET_CHARS: usize = 2000;

const COMPACTION_SYSTEM_PROMPT: &str = "Summarize the following part of a coding session so the \
assistant can continue without it. Keep the user's requests, files inspected or changed, \
decisions, errors and anything still unresolved. Be concise.";

#[async_trait]
pub trait ContextCompactor: Send + Sync {
    /// Whether `messages` plus `system_prompt` exceed the compaction
    /// threshold. Records the measured size for [`usage_pct`](Self::usage_pct).
    fn should_compact(&self, messages: &[Message], system_prompt: &str) -> bool;

    /// A compacted copy of `messages`. Returns the input unchanged when
    /// there is nothing to summarize.
    async fn compact(&self, messages: &[Message], system_prompt: &str, monitor: &TaskMonitor) -> Vec<Message>;

    /// Context usage measured by the last `should_compact`, in percent of
    /// the window.
    fn usage_pct(&self) -> f32;
}

/// Compactor that asks the model for the summary and falls back to a
/// deterministic digest when that fails.
pub struct LlmCompactor {
    provider: Arc<dyn Provider>,
    model: String,
    settings: CompactionSettings,
    last_token_count: AtomicUsize,
    /// Cost of the tool schemas sent with every request
    tool_tokens: usize,
    debug: DebugLogger,
}

impl LlmCompactor {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, settings: CompactionSettings) -> Self {
        Self {
            provider,
            model: model.into(),
            settings,
            last_token_count: AtomicUsize::new(0),
            tool_tokens: 0,
            debug: DebugLogger::disabled(),
        }
    }

    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = debug;
        self
    }

    /// Count `tools` against the window on every check.
    pub fn with_tools(mut self, tools: &[ToolDefinition]) -> Self {
        self.tool_tokens = estimate_tools_tokens(tools);
        self
    }

    pub fn last_token_count(&self) -> usize {
        self.last_token_count.load(Ordering::Relaxed)
    }

    /// The system prompt counts once; system messages in the list are the
    /// same prompt and are skipped.
    fn count_tokens(&self, messages: &[Message], system_prompt: &str) -> usize {
        self.tool_tokens
            + estimate_tokens(system_prompt)
            + messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(estimate_message_tokens)
                .sum::<usize>()
    }

    fn limit(&self) -> usize {
        (self.settings.context_window as f64 * f64::from(self.settings.threshold)) as usize
    }

    async fn summarize(&self, middle: &[Message], monitor: &TaskMonitor) -> String {
        let conversation: Vec<String> = middle
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| {
                let snippet: String = m.content.chars().take(PROMPT_SNIPPET_CHARS).collect();
                format!("[{}] {snippet}", m.role.as_str())
            })
            .collect();

        let request = ProviderRequest {
            temperature: 0.2,
            max_tokens: Some(1024),
            ..ProviderRequest::plain(
                self.model.clone(),
                vec![
                    Message::system(COMPACTION_SYSTEM_PROMPT),
                    Message::user(conversation.join("\n")),
                ],
            )
        };

        match self.provider.complete(request, monitor).await {
            Ok(response) if !response.content.trim().is_empty() => response.content.trim().to_string(),
            Ok(_) => {
                warn!("Compaction model returned an empty summary, using fallback");
                fallback_summary(middle)
            }
            Err(e) => {
                warn!(error = %e, "Compaction summary failed, using fallback");
                fallback_summary(middle)
            }
        }
    }
}

#[async_trait]
impl ContextCompactor for LlmCompactor {
    fn should_compact(&self, messages: &[Message], system_prompt: &str) -> bool {
        let total = self.count_tokens(messages, system_prompt);
        self.last_token_count.store(total, Ordering::Relaxed);
        self.settings.enabled && total > self.limit()
    }

    async fn compact(&self, messages: &[Message], _system_prompt: &str, monitor: &TaskMonitor) -> Vec<Message> {
        if messages.len() <= MIN_COMPACTABLE {
            return messages.to_vec();
        }

        let keep_recent = (messages.len() / 3).clamp(MIN_KEEP_RECENT, MAX_KEEP_RECENT);
        let head = usize::from(messages[0].role == Role::System);
        let mut tail_start = messages.len() - keep_recent;
        // A tool result must stay with the assistant message that asked for it.
        while tail_start > head && messages[tail_start].role == Role::Tool {
            tail_start -= 1;
        }

        let middle = &messages[head..tail_start];
        if middle.is_empty() {
            return messages.to_vec();
        }

        let mut summary = self.summarize(middle, monitor).await;
        if summary.trim().is_empty() {
            summary = COMPACTED_PLACEHOLDER.to_string();
        }

        let mut compacted = Vec::with_capacity(head + 1 + messages.len() - tail_start);
        compacted.extend_from_slice(&messages[..head]);
        compacted.push(Message::user(format!("{COMPACTION_SUMMARY_PREFIX}\n{summary}")));
        compacted.extend_from_slice(&messages[tail_start..]);

        info!(
            before = messages.len(),
            after = compacted.len(),
            removed = middle.len(),
            kept = messages.len() - tail_start,
            "Compacted conversation"
        );
        self.debug.log(
            "context_compacted",
            "compactor",
            json!({
                "before": messages.len(),
                "after": compacted.len(),
                "tokens_before": self.last_token_count(),
            }),
        );
        compacted
    }

    fn usage_pct(&self) -> f32 {
        if self.settings.context_window == 0 {
            return 0.0;
        }
        self.last_token_count() as f32 / self.settings.context_window as f32 * 100.0
    }
}

/// Compact `messages` only when they are over the threshold.
///
/// Returns `None` when nothing changed, so a list that was just compacted
/// is left alone by the next check.
pub async fn compact_if_needed(
    compactor: &dyn ContextCompactor,
    messages: &[Message],
    system_prompt: &str,
    monitor: &TaskMonitor,
) -> Option<Vec<Message>> {
    if !compactor.should_compact(messages, system_prompt) {
        return None;
    }
    let compacted = compactor.compact(messages, system_prompt, monitor).await;
    (compacted.len() < messages.len()).then_some(compacted)
}

/// Deterministic digest of `messages` used when the model cannot summarize.
pub fn fallback_summary(messages: &[Message]) -> String {
    let mut parts = Vec::new();
    let mut total = 0;
    for msg in messages {
        if msg.content.is_empty() || !matches!(msg.role, Role::User | Role::Assistant) {
            continue;
        }
        let snippet: String = msg.content.chars().take(FALLBACK_SNIPPET_CHARS).collect();
        total += snippet.chars().count();
        parts.push(format!("- [{}] {snippet}", msg.role.as_str()));
        if total > FALLBACK_BUDGET_CHARS {
            parts.push(format!("... ({} more messages)", messages.len().saturating_sub(parts.len())));
            break;
        }
    }
    parts.join("\n")
}
