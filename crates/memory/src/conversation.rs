//! Dual-tier conversation memory.
//!
//! Combines the episodic summary of older history with the short-term
//! window of recent exchanges. The reasoning pre-phase reads it to plan the
//! next step without carrying the whole transcript.

use sweloop_core::message::Message;
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::session::Session;

use crate::short_term::{ShortTermSettings, render_window, short_term_window};
use crate::summarizer::ConversationSummarizer;

/// What memory recalls for one iteration.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub episodic: Option<String>,
    pub recent: Vec<Message>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.episodic.is_none() && self.recent.is_empty()
    }

    pub fn render_recent(&self) -> String {
        render_window(&self.recent)
    }
}

pub struct ConversationMemory {
    summarizer: ConversationSummarizer,
    short_term: ShortTermSettings,
}

impl ConversationMemory {
    pub fn new(summarizer: ConversationSummarizer, short_term: ShortTermSettings) -> Self {
        Self {
            summarizer,
            short_term,
        }
    }

    pub fn summarizer(&self) -> &ConversationSummarizer {
        &self.summarizer
    }

    pub fn summarizer_mut(&mut self) -> &mut ConversationSummarizer {
        &mut self.summarizer
    }

    /// Pick up the summary cache persisted with `session`.
    pub fn attach(&mut self, session: &Session) {
        self.summarizer.load_from(session);
    }

    /// Write the summary cache back into `session`.
    pub fn persist(&self, session: &mut Session) {
        self.summarizer.store_into(session);
    }

    /// Recall both tiers for `messages`, regenerating the summary if due.
    pub async fn recall(&mut self, messages: &[Message], monitor: &TaskMonitor) -> MemoryContext {
        let episodic = self.summarizer.generate_summary(messages, monitor).await;
        MemoryContext {
            episodic,
            recent: short_term_window(messages, &self.short_term),
        }
    }

    /// Short-term tier only; never calls the model.
    pub fn recent(&self, messages: &[Message]) -> Vec<Message> {
        short_term_window(messages, &self.short_term)
    }
}
