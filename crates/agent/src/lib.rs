//! The agent execution engine of sweloop.
//!
//! One user turn runs as an iteration loop:
//!
//! 1. **Reason** (optional): plan the next step from recalled memory
//! 2. **Compact** the working context when it nears the window
//! 3. **Act**: call the model with the tool schemas
//! 4. **Dispatch** the requested tools, sequentially or as a bounded
//!    parallel pool of sub-agents
//! 5. **Learn**: reflect on the step and curate the session playbook
//!
//! The loop ends on a text answer, a `task_complete` call, a model error,
//! the iteration limit, or an interrupt.

pub mod context;
pub mod dispatcher;
pub mod learning;
pub mod loop_runner;
pub mod nudges;
pub mod reasoning;
pub mod settings;
pub mod subagent;
pub mod summarize;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ContextCompactor, LlmCompactor, compact_if_needed};
pub use dispatcher::{BatchOutcome, DENIED_MESSAGE, ToolDispatcher};
pub use learning::{AgentResponse, Curator, LearningLoop, LearningStep, Reflector};
pub use loop_runner::{AgentLoop, CompletionStatus, IterationContext, TASK_COMPLETE_TOOL, TurnOutcome};
pub use nudges::{ToolErrorKind, smart_nudge};
pub use reasoning::{ReasoningPhase, ReasoningTrace};
pub use settings::{CompactionSettings, LearningSettings, LoopSettings};
pub use subagent::SubAgentTool;
pub use summarize::summarize_tool_result;
