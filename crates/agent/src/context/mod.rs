//! Context-window management: token estimates and compaction.

pub mod compaction;
pub mod token;

pub use compaction::{
    COMPACTION_SUMMARY_PREFIX, ContextCompactor, LlmCompactor, compact_if_needed, fallback_summary,
};
pub use token::{estimate_message_tokens, estimate_tokens, estimate_tools_tokens};
