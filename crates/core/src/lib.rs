//! # sweloop core
//!
//! Domain types, traits, and error definitions for the sweloop agent
//! execution engine. This crate has no runtime of its own; it defines the
//! model that the memory, tools and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam the engine talks through is a trait here: [`Provider`] for the
//! language model, [`Tool`] for capabilities, [`ApprovalPolicy`] and
//! [`UndoPolicy`] for the user's say over mutations, [`SessionStore`] for
//! persistence. Tests swap in scripted implementations.

pub mod approval;
pub mod debug_log;
pub mod error;
pub mod event;
pub mod message;
pub mod monitor;
pub mod playbook;
pub mod provider;
pub mod session;
pub mod text;
pub mod tool;
pub mod undo;

// Re-export key types at crate root for ergonomics
pub use approval::{ApprovalDecision, ApprovalPolicy, ApprovalRequest, AutoApprove, AutonomyApproval, AutonomyLevel, DenyAll};
pub use debug_log::DebugLogger;
pub use error::{Error, Result};
pub use event::{AgentEvent, EventBus};
pub use message::{Message, MessageToolCall, Role, ToolCallArena, ToolCallRecord};
pub use monitor::{InterruptHandle, TaskMonitor};
pub use playbook::{Bullet, BulletTag, DeltaBatch, DeltaOperation, Playbook};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use session::{ConversationSummaryCache, Session, SessionStore};
pub use tool::{Tool, ToolCall, ToolContext, ToolOutcome, ToolOutput, ToolRegistry};
pub use undo::{UndoEntry, UndoLog, UndoPolicy};
