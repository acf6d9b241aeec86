//! Memory for sweloop: where sessions are kept, and what the agent
//! remembers of them.
//!
//! - [`FileSessionStore`] / [`InMemorySessionStore`] persist whole sessions.
//! - [`ConversationSummarizer`] maintains the episodic summary incrementally.
//! - [`short_term_window`] extracts the recent exchanges kept verbatim.
//! - [`ConversationMemory`] combines the two tiers.

pub mod conversation;
pub mod file_backend;
pub mod in_memory;
pub mod short_term;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod test_support;

pub use conversation::{ConversationMemory, MemoryContext};
pub use file_backend::FileSessionStore;
pub use in_memory::InMemorySessionStore;
pub use short_term::{ShortTermSettings, render_window, short_term_window};
pub use summarizer::{ConversationSummarizer, SummarizerSettings, build_summary_prompt};
