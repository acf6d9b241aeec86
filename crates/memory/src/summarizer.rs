//! Episodic memory: an incrementally maintained conversation summary.
//!
//! Only messages between the cached `last_summarized_index` and the cut
//! point are sent to the model, together with the previous summary text.
//! The newest `exclude_last_n` messages are left for the short-term tier
//! and never reach the summarizer. System messages are dropped entirely.

use std::sync::Arc;

use serde_json::json;
use sweloop_core::debug_log::DebugLogger;
use sweloop_core::message::{Message, Role};
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::provider::{Provider, ProviderRequest};
use sweloop_core::session::{ConversationSummaryCache, Session};
use sweloop_core::text::{take_chars, truncate_chars};
use tracing::{debug, warn};

/// Chars of each message shown to the summarizer.
const SNIPPET_CHARS: usize = 200;

const SUMMARIZER_SYSTEM_PROMPT: &str = "You maintain a running summary of a coding session. \
Merge the new messages into the previous summary. Keep the user's goals, decisions made, \
files touched and open problems. Reply with the summary text only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizerSettings {
    pub regenerate_threshold: usize,
    pub exclude_last_n: usize,
    pub max_summary_length: usize,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            regenerate_threshold: 5,
            exclude_last_n: 6,
            max_summary_length: 500,
        }
    }
}

pub struct ConversationSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
    settings: SummarizerSettings,
    cache: Option<ConversationSummaryCache>,
    debug: DebugLogger,
}

impl ConversationSummarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, settings: SummarizerSettings) -> Self {
        Self {
            provider,
            model: model.into(),
            settings,
            cache: None,
            debug: DebugLogger::disabled(),
        }
    }

    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = debug;
        self
    }

    pub fn settings(&self) -> &SummarizerSettings {
        &self.settings
    }

    pub fn cache(&self) -> Option<&ConversationSummaryCache> {
        self.cache.as_ref()
    }

    pub fn cached_summary(&self) -> Option<&str> {
        self.cache.as_ref().map(|c| c.summary.as_str())
    }

    pub fn set_cache(&mut self, cache: Option<ConversationSummaryCache>) {
        self.cache = cache;
    }

    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    /// Adopt the cache persisted in `session` (if any).
    pub fn load_from(&mut self, session: &Session) {
        self.cache = session.summary_cache();
    }

    /// Persist the current cache into `session` metadata.
    pub fn store_into(&self, session: &mut Session) {
        session.set_summary_cache(self.cache.as_ref());
    }

    /// True iff there is no cache, or at least `regenerate_threshold`
    /// messages arrived since it was produced.
    pub fn needs_regeneration(&self, current_count: usize) -> bool {
        match &self.cache {
            None => true,
            Some(cache) => {
                current_count.saturating_sub(cache.total_message_count_at_creation)
                    >= self.settings.regenerate_threshold
            }
        }
    }

    /// The episodic summary for `messages`, regenerating incrementally when
    /// due. Returns the cached text (possibly `None`) whenever there is
    /// nothing new to fold in or the model call fails.
    pub async fn generate_summary(&mut self, messages: &[Message], monitor: &TaskMonitor) -> Option<String> {
        if !self.needs_regeneration(messages.len()) {
            return self.cached_summary().map(str::to_string);
        }

        let filtered: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
        if filtered.len() <= self.settings.exclude_last_n {
            return self.cached_summary().map(str::to_string);
        }
        let end = filtered.len() - self.settings.exclude_last_n;

        let start = match &self.cache {
            // History shrank (compaction); fold everything eligible into the old summary.
            Some(cache) if cache.last_summarized_index > end => 0,
            Some(cache) => cache.last_summarized_index,
            None => 0,
        };
        if start >= end {
            return self.cached_summary().map(str::to_string);
        }

        let new_messages = &filtered[start..end];
        let prompt = build_summary_prompt(self.cached_summary(), new_messages);
        self.debug.log(
            "summary_request",
            "conversation_summarizer",
            json!({ "start": start, "end": end, "new_messages": new_messages.len() }),
        );

        let request = ProviderRequest::plain(
            self.model.clone(),
            vec![Message::system(SUMMARIZER_SYSTEM_PROMPT), Message::user(prompt)],
        );
        match self.provider.complete(request, monitor).await {
            Ok(response) if !response.content.trim().is_empty() => {
                let summary = take_chars(response.content.trim(), self.settings.max_summary_length);
                debug!(
                    covered = end,
                    total = messages.len(),
                    chars = summary.len(),
                    "Episodic summary regenerated"
                );
                self.cache = Some(ConversationSummaryCache {
                    summary: summary.clone(),
                    total_message_count_at_creation: messages.len(),
                    last_summarized_index: end,
                });
                Some(summary)
            }
            Ok(_) => {
                warn!("Summarizer returned empty text, keeping previous summary");
                self.cached_summary().map(str::to_string)
            }
            Err(e) => {
                warn!(error = %e, "Summary generation failed, keeping previous summary");
                self.debug.log("summary_error", "conversation_summarizer", json!({ "error": e.to_string() }));
                self.cached_summary().map(str::to_string)
            }
        }
    }
}

/// Merge prompt: the previous summary plus a compact rendering of the new
/// messages.
pub fn build_summary_prompt(previous: Option<&str>, new_messages: &[&Message]) -> String {
    let mut prompt = String::from("Previous summary:\n");
    prompt.push_str(previous.unwrap_or("(No previous summary)"));
    prompt.push_str("\n\nNew messages:\n");
    for msg in new_messages {
        prompt.push_str(&render_for_summary(msg));
        prompt.push('\n');
    }
    prompt.push_str("\nWrite the updated summary.");
    prompt
}

fn render_for_summary(msg: &Message) -> String {
    match msg.role {
        Role::User => format!("User: {}", truncate_chars(&msg.content, SNIPPET_CHARS)),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            format!("Assistant: [Called tools: {}]", msg.tool_names().join(", "))
        }
        Role::Assistant => format!("Assistant: {}", truncate_chars(&msg.content, SNIPPET_CHARS)),
        Role::Tool => "Tool: [result received]".to_string(),
        Role::System => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;

    fn history(n: usize) -> Vec<Message> {
        let mut msgs = vec![Message::system("you are helpful")];
        for i in 0..n {
            if i % 2 == 0 {
                msgs.push(Message::user(format!("question {i}")));
            } else {
                msgs.push(Message::assistant(format!("answer {i}")));
            }
        }
        msgs
    }

    fn summarizer(provider: Arc<ScriptedProvider>) -> ConversationSummarizer {
        ConversationSummarizer::new(provider, "mock", SummarizerSettings::default())
    }

    #[test]
    fn needs_regeneration_without_cache() {
        let s = summarizer(Arc::new(ScriptedProvider::new(vec![])));
        assert!(s.needs_regeneration(0));
    }

    #[test]
    fn needs_regeneration_respects_threshold() {
        let mut s = summarizer(Arc::new(ScriptedProvider::new(vec![])));
        s.set_cache(Some(ConversationSummaryCache {
            summary: "x".into(),
            total_message_count_at_creation: 10,
            last_summarized_index: 4,
        }));
        assert!(!s.needs_regeneration(14));
        assert!(s.needs_regeneration(15));
    }

    #[tokio::test]
    async fn too_short_history_makes_no_call() {
        let provider = Arc::new(ScriptedProvider::new(vec!["never".into()]));
        let mut s = summarizer(provider.clone());
        let out = s.generate_summary(&history(6), &TaskMonitor::new("t")).await;
        assert!(out.is_none());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn excluded_tail_and_system_never_reach_model() {
        let provider = Arc::new(ScriptedProvider::new(vec!["summary one".into()]));
        let mut s = summarizer(provider.clone());
        let msgs = history(10);

        let out = s.generate_summary(&msgs, &TaskMonitor::new("t")).await;
        assert_eq!(out.as_deref(), Some("summary one"));

        let sent = provider.prompts().join("\n");
        // messages 0..4 are eligible, 4..10 are the exclusion window
        for i in 0..4 {
            assert!(sent.contains(&format!(" {i}")), "missing message {i}");
        }
        for i in 4..10 {
            assert!(!sent.contains(&format!("question {i}")) && !sent.contains(&format!("answer {i}")));
        }
        assert!(!sent.contains("you are helpful"));

        let cache = s.cache().unwrap();
        assert_eq!(cache.last_summarized_index, 4);
        assert_eq!(cache.total_message_count_at_creation, 11);
    }

    #[tokio::test]
    async fn second_call_below_threshold_is_cached() {
        let provider = Arc::new(ScriptedProvider::new(vec!["first".into(), "second".into()]));
        let mut s = summarizer(provider.clone());
        let monitor = TaskMonitor::new("t");
        let mut msgs = history(10);

        let first = s.generate_summary(&msgs, &monitor).await;
        msgs.push(Message::user("more"));
        msgs.push(Message::assistant("more answers"));
        let second = s.generate_summary(&msgs, &monitor).await;

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn regeneration_only_sends_new_slice_with_previous_summary() {
        let provider = Arc::new(ScriptedProvider::new(vec!["first".into(), "merged".into()]));
        let mut s = summarizer(provider.clone());
        let monitor = TaskMonitor::new("t");
        let mut msgs = history(10);
        s.generate_summary(&msgs, &monitor).await;

        for i in 10..15 {
            msgs.push(Message::user(format!("question {i}")));
        }
        let out = s.generate_summary(&msgs, &monitor).await;
        assert_eq!(out.as_deref(), Some("merged"));

        let second_prompt = provider.prompts().pop().unwrap();
        assert!(second_prompt.contains("Previous summary:\nfirst"));
        assert!(!second_prompt.contains("question 0"));
        assert!(second_prompt.contains("question 4"));
        assert!(second_prompt.contains("question 8"));
        assert!(!second_prompt.contains("question 10"));
        assert_eq!(s.cache().unwrap().last_summarized_index, 9);
    }

    #[tokio::test]
    async fn model_failure_keeps_previous_cache() {
        let provider = Arc::new(ScriptedProvider::failing());
        let mut s = summarizer(provider);
        let cache = ConversationSummaryCache {
            summary: "old".into(),
            total_message_count_at_creation: 0,
            last_summarized_index: 0,
        };
        s.set_cache(Some(cache.clone()));
        let out = s.generate_summary(&history(12), &TaskMonitor::new("t")).await;
        assert_eq!(out.as_deref(), Some("old"));
        assert_eq!(s.cache(), Some(&cache));
    }

    #[tokio::test]
    async fn summary_is_cut_at_exactly_the_cap() {
        let provider = Arc::new(ScriptedProvider::new(vec!["y".repeat(900)]));
        let mut s = summarizer(provider);
        let out = s.generate_summary(&history(10), &TaskMonitor::new("t")).await.unwrap();
        assert_eq!(out.chars().count(), 500);
        assert!(!out.ends_with("..."));
    }

    #[test]
    fn tool_calls_render_as_names() {
        use sweloop_core::message::{ToolCallArena, ToolCallRecord};
        let arena: ToolCallArena = vec![
            ToolCallRecord::new("a", "list_files", json!({})),
            ToolCallRecord::new("b", "read_file", json!({})),
        ]
        .into_iter()
        .collect();
        let msg = Message::assistant("").with_tool_calls(arena);
        let tool = Message::tool_result("a", "lots of output");
        let prompt = build_summary_prompt(None, &[&msg, &tool]);
        assert!(prompt.contains("Assistant: [Called tools: list_files, read_file]"));
        assert!(prompt.contains("Tool: [result received]"));
        assert!(prompt.contains("(No previous summary)"));
    }
}
