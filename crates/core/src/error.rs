//! Error types for the sweloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all sweloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Session persistence ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Playbook mutation ---
    #[error("Playbook error: {0}")]
    Playbook(#[from] PlaybookError),

    // --- Learning loop ---
    #[error("Learning error: {0}")]
    Learning(#[from] LearningError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The call was cancelled through its task monitor.
    #[error("Request interrupted by user")]
    Interrupted,

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether this failure was a user-requested cancellation.
    ///
    /// Clients that cannot raise [`ProviderError::Interrupted`] directly
    /// report cancellation in their error text instead.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Interrupted => true,
            other => other.to_string().to_lowercase().contains("interrupted"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Sandbox violation: {0}")]
    SandboxViolation(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool interrupted: {0}")]
    Interrupted(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt session record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybookError {
    #[error("Unknown bullet id: {0}")]
    UnknownBullet(String),

    #[error("Invalid delta operation: {0}")]
    InvalidOperation(String),

    #[error("Unknown tag '{0}' (expected helpful, harmful or neutral)")]
    UnknownTag(String),
}

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("Reflector failed: {0}")]
    Reflector(String),

    #[error("Curator failed: {0}")]
    Curator(String),

    #[error("Could not parse model output after {attempts} attempts: {reason}")]
    Unparseable { attempts: u32, reason: String },
}
