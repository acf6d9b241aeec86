//! Immutable loop settings.
//!
//! Built once from [`AppConfig`] and shared as `Arc<LoopSettings>`; a turn
//! never sees a setting change halfway through.

use std::collections::HashSet;

use sweloop_config::{AppConfig, ReasoningMode};
use sweloop_memory::{ShortTermSettings, SummarizerSettings};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a software engineering assistant working inside a \
code repository. Use the available tools to inspect and change files. Prefer reading before \
writing. When the task is finished, call task_complete with a short summary and a status of \
success or failed.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactionSettings {
    pub enabled: bool,
    pub context_window: usize,
    /// Fraction of the window that triggers compaction
    pub threshold: f32,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            context_window: 100_000,
            threshold: 0.70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearningSettings {
    pub enabled: bool,
    /// Strategies injected into the system prompt
    pub max_strategies: usize,
    /// Attempts per reflector/curator call
    pub max_retries: u32,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_strategies: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    /// Model for summaries, compaction and learning
    pub auxiliary_model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: String,

    pub max_iterations: u32,
    pub read_nudge_threshold: u32,
    pub max_failed_tool_nudges: u32,
    pub read_only_tools: HashSet<String>,
    pub reasoning: ReasoningMode,

    pub max_parallel_agents: usize,
    pub subagent_tool: String,
    pub subagent_max_iterations: u32,

    pub summarizer: SummarizerSettings,
    pub short_term: ShortTermSettings,
    pub compaction: CompactionSettings,
    pub learning: LearningSettings,
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            auxiliary_model: config.auxiliary_model().to_string(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_iterations: config.agent.max_iterations,
            read_nudge_threshold: config.agent.read_nudge_threshold,
            max_failed_tool_nudges: config.agent.max_failed_tool_nudges,
            read_only_tools: config.agent.read_only_tools.iter().cloned().collect(),
            reasoning: config.agent.reasoning,
            max_parallel_agents: config.dispatcher.max_parallel_agents.max(1),
            subagent_tool: config.dispatcher.subagent_tool.clone(),
            subagent_max_iterations: config.dispatcher.subagent_max_iterations,
            summarizer: SummarizerSettings {
                regenerate_threshold: config.memory.regenerate_threshold,
                exclude_last_n: config.memory.exclude_last_n,
                max_summary_length: config.memory.max_summary_length,
            },
            short_term: ShortTermSettings {
                pairs: config.memory.short_term_pairs,
                message_chars: config.memory.message_chars,
                tool_result_chars: config.memory.tool_result_chars,
            },
            compaction: CompactionSettings {
                enabled: config.compaction.enabled,
                context_window: config.compaction.context_window,
                threshold: config.compaction.threshold,
            },
            learning: LearningSettings {
                enabled: config.learning.enabled,
                max_strategies: config.learning.max_strategies,
                max_retries: config.learning.max_retries,
            },
        }
    }

    /// Whether `tool` counts towards the consecutive-read nudge.
    pub fn is_read_only(&self, tool: &str) -> bool {
        self.read_only_tools.contains(tool)
    }

    /// Settings for a sub-agent loop: no reasoning pre-phase, no learning,
    /// its own iteration cap.
    pub fn for_subagent(&self) -> Self {
        Self {
            max_iterations: self.subagent_max_iterations.max(1),
            reasoning: ReasoningMode::Off,
            learning: LearningSettings {
                enabled: false,
                ..self.learning
            },
            ..self.clone()
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
