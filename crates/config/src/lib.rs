//! Configuration loading, validation, and management for sweloop.
//!
//! Loads configuration from `~/.sweloop/config.toml` with environment
//! variable overrides. Validates all settings at startup. The agent crate
//! turns a loaded [`AppConfig`] into an immutable per-turn snapshot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sweloop_core::AutonomyLevel;

/// The root configuration structure.
///
/// Maps directly to `~/.sweloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// LLM provider name
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model used for the main loop
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for summaries, reflection and curation (defaults to `model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Replace the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Directory the file tools are confined to (defaults to the cwd)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    #[serde(default)]
    pub agent: AgentLoopConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub compaction: CompactionConfig,

    #[serde(default)]
    pub learning: LearningConfig,

    #[serde(default)]
    pub autonomy: AutonomyConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("auxiliary_model", &self.auxiliary_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("workspace", &self.workspace)
            .field("agent", &self.agent)
            .field("dispatcher", &self.dispatcher)
            .field("memory", &self.memory)
            .field("compaction", &self.compaction)
            .field("learning", &self.learning)
            .field("autonomy", &self.autonomy)
            .field("sessions", &self.sessions)
            .field("debug", &self.debug)
            .finish()
    }
}

/// How the loop runs its reasoning pre-phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    #[default]
    Off,
    /// One planning call before each model call
    On,
    /// Planning call followed by a critique-and-refine call
    SelfCritique,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopConfig {
    /// Safety limit on model calls per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Consecutive all-read-only batches before the "conclude" nudge
    #[serde(default = "default_read_nudge_threshold")]
    pub read_nudge_threshold: u32,

    /// Corrective nudges after failed tools before accepting an answer
    #[serde(default = "default_max_failed_tool_nudges")]
    pub max_failed_tool_nudges: u32,

    /// Tools counted as read-only for the nudge counter
    #[serde(default = "default_read_only_tools")]
    pub read_only_tools: Vec<String>,

    #[serde(default)]
    pub reasoning: ReasoningMode,
}

fn default_max_iterations() -> u32 {
    50
}
fn default_read_nudge_threshold() -> u32 {
    5
}
fn default_max_failed_tool_nudges() -> u32 {
    3
}
fn default_read_only_tools() -> Vec<String> {
    vec!["read_file".into(), "list_files".into(), "search_code".into()]
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            read_nudge_threshold: default_read_nudge_threshold(),
            max_failed_tool_nudges: default_max_failed_tool_nudges(),
            read_only_tools: default_read_only_tools(),
            reasoning: ReasoningMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Worker ceiling for parallel sub-agent batches
    #[serde(default = "default_max_parallel_agents")]
    pub max_parallel_agents: usize,

    /// Name of the sub-agent spawn tool
    #[serde(default = "default_subagent_tool")]
    pub subagent_tool: String,

    /// Iteration limit for each sub-agent
    #[serde(default = "default_subagent_max_iterations")]
    pub subagent_max_iterations: u32,
}

fn default_max_parallel_agents() -> usize {
    5
}
fn default_subagent_tool() -> String {
    "spawn_subagent".into()
}
fn default_subagent_max_iterations() -> u32 {
    20
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_parallel_agents: default_max_parallel_agents(),
            subagent_tool: default_subagent_tool(),
            subagent_max_iterations: default_subagent_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// New messages needed before the episodic summary is regenerated
    #[serde(default = "default_regenerate_threshold")]
    pub regenerate_threshold: usize,

    /// Most recent messages never sent to the summarizer
    #[serde(default = "default_exclude_last_n")]
    pub exclude_last_n: usize,

    #[serde(default = "default_max_summary_length")]
    pub max_summary_length: usize,

    /// Complete exchanges kept verbatim in the short-term tier
    #[serde(default = "default_short_term_pairs")]
    pub short_term_pairs: usize,

    /// Per-message character budget in the short-term tier
    #[serde(default = "default_message_chars")]
    pub message_chars: usize,

    /// Per-tool-result character budget in the short-term tier
    #[serde(default = "default_tool_result_chars")]
    pub tool_result_chars: usize,
}

fn default_regenerate_threshold() -> usize {
    5
}
fn default_exclude_last_n() -> usize {
    6
}
fn default_max_summary_length() -> usize {
    500
}
fn default_short_term_pairs() -> usize {
    3
}
fn default_message_chars() -> usize {
    500
}
fn default_tool_result_chars() -> usize {
    200
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            regenerate_threshold: default_regenerate_threshold(),
            exclude_last_n: default_exclude_last_n(),
            max_summary_length: default_max_summary_length(),
            short_term_pairs: default_short_term_pairs(),
            message_chars: default_message_chars(),
            tool_result_chars: default_tool_result_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider context window in tokens
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Fraction of the window that triggers compaction
    #[serde(default = "default_compaction_threshold")]
    pub threshold: f32,
}

fn default_context_window() -> usize {
    100_000
}
fn default_compaction_threshold() -> f32 {
    0.70
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_window: default_context_window(),
            threshold: default_compaction_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Strategies injected into the system prompt
    #[serde(default = "default_max_strategies")]
    pub max_strategies: usize,

    /// Attempts at getting parseable JSON from the reflector/curator
    #[serde(default = "default_learning_retries")]
    pub max_retries: u32,
}

fn default_max_strategies() -> usize {
    30
}
fn default_learning_retries() -> u32 {
    3
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_strategies: default_max_strategies(),
            max_retries: default_learning_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutonomyConfig {
    #[serde(default)]
    pub level: AutonomyLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Where session JSON files live (defaults to `~/.sweloop/sessions`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Save the session after every turn
    #[serde(default = "default_true")]
    pub auto_save: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            auto_save: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Write a JSONL debug event log per session
    #[serde(default)]
    pub enabled: bool,

    /// Where debug logs go (defaults to `~/.sweloop/debug`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.sweloop/config.toml).
    ///
    /// Environment overrides:
    /// - `SWELOOP_API_KEY`, then `OPENAI_API_KEY` (only if no key is configured)
    /// - `SWELOOP_PROVIDER`
    /// - `SWELOOP_MODEL`
    /// - `SWELOOP_DEBUG` (any value enables the debug event log)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("SWELOOP_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(provider) = std::env::var("SWELOOP_PROVIDER") {
            self.provider = provider;
        }
        if let Ok(model) = std::env::var("SWELOOP_MODEL") {
            self.model = model;
        }
        if std::env::var_os("SWELOOP_DEBUG").is_some() {
            self.debug.enabled = true;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sweloop")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("sessions"))
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.debug
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("debug"))
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Model for summaries and learning calls.
    pub fn auxiliary_model(&self) -> &str {
        self.auxiliary_model.as_deref().unwrap_or(&self.model)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }
        if self.agent.read_nudge_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "agent.read_nudge_threshold must be > 0".into(),
            ));
        }
        if self.dispatcher.max_parallel_agents == 0 {
            return Err(ConfigError::ValidationError(
                "dispatcher.max_parallel_agents must be > 0".into(),
            ));
        }
        if self.memory.regenerate_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "memory.regenerate_threshold must be > 0".into(),
            ));
        }
        if !(self.compaction.threshold > 0.0 && self.compaction.threshold <= 1.0) {
            return Err(ConfigError::ValidationError(
                "compaction.threshold must be in (0.0, 1.0]".into(),
            ));
        }
        if self.compaction.context_window == 0 {
            return Err(ConfigError::ValidationError(
                "compaction.context_window must be > 0".into(),
            ));
        }
        if self.learning.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "learning.max_retries must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: default_model(),
            auxiliary_model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            workspace: None,
            agent: AgentLoopConfig::default(),
            dispatcher: DispatcherConfig::default(),
            memory: MemoryConfig::default(),
            compaction: CompactionConfig::default(),
            learning: LearningConfig::default(),
            autonomy: AutonomyConfig::default(),
            sessions: SessionsConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.read_nudge_threshold, 5);
        assert_eq!(config.agent.max_failed_tool_nudges, 3);
        assert_eq!(config.dispatcher.max_parallel_agents, 5);
        assert_eq!(config.memory.exclude_last_n, 6);
        assert!((config.compaction.threshold - 0.70).abs() < f32::EPSILON);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.dispatcher.subagent_tool, "spawn_subagent");
        assert_eq!(parsed.autonomy.level, AutonomyLevel::Supervised);
    }

    #[test]
    fn invalid_values_rejected() {
        let hot = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(hot.validate().is_err());

        let mut no_workers = AppConfig::default();
        no_workers.dispatcher.max_parallel_agents = 0;
        assert!(no_workers.validate().is_err());

        let mut bad_threshold = AppConfig::default();
        bad_threshold.compaction.threshold = 1.5;
        assert!(bad_threshold.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider, "openai");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "local-coder"

[agent]
read_nudge_threshold = 8
reasoning = "self_critique"

[autonomy]
level = "full"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "local-coder");
        assert_eq!(config.auxiliary_model(), "local-coder");
        assert_eq!(config.agent.read_nudge_threshold, 8);
        assert_eq!(config.agent.max_failed_tool_nudges, 3);
        assert_eq!(config.agent.reasoning, ReasoningMode::SelfCritique);
        assert_eq!(config.autonomy.level, AutonomyLevel::Full);
        assert_eq!(config.memory.regenerate_threshold, 5);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("[REDACTED]"));
    }
}
