//! Corrective messages the loop injects to steer the model.

use std::fmt;

/// Sent after `read_nudge_threshold` consecutive read-only batches.
pub const READ_NUDGE: &str =
    "Based on what you've seen, please summarize your findings and explain what needs to be done next.";

/// Final text when the model keeps failing and gives no answer.
pub const NUDGES_EXHAUSTED_TEXT: &str = "Warning: could not complete after multiple attempts.";

/// Final text when the model returns nothing at all.
pub const EMPTY_REPLY_TEXT: &str = "Warning: model returned no reply.";

const GENERIC_NUDGE: &str = "The previous operation failed. Please fix the issue and try again, \
or call task_complete with status='failed' if you cannot proceed.";

/// Coarse class of a failed tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    PermissionError,
    EditMismatch,
    FileNotFound,
    SyntaxError,
    RateLimit,
    Timeout,
    Generic,
}

impl ToolErrorKind {
    /// Classify an error text. First match wins.
    pub fn classify(error_text: &str) -> Self {
        let lower = error_text.to_lowercase();
        if lower.contains("permission denied") {
            Self::PermissionError
        } else if lower.contains("old_content") || lower.contains("old content") {
            Self::EditMismatch
        } else if lower.contains("no such file") || lower.contains("not found") {
            Self::FileNotFound
        } else if lower.contains("syntax") {
            Self::SyntaxError
        } else if lower.contains("429") || lower.contains("rate limit") {
            Self::RateLimit
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else {
            Self::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionError => "permission_error",
            Self::EditMismatch => "edit_mismatch",
            Self::FileNotFound => "file_not_found",
            Self::SyntaxError => "syntax_error",
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::Generic => "generic",
        }
    }

    /// The corrective user message for this class of failure.
    pub fn nudge(&self) -> &'static str {
        match self {
            Self::PermissionError => {
                "The previous operation was denied. Do not retry it as-is. Choose a different \
                 approach that stays within what you are allowed to do, or call task_complete \
                 with status='failed' and explain what permission is needed."
            }
            Self::EditMismatch => {
                "The edit failed because the expected content did not match the file. Read the \
                 file again to get its current content, then retry the edit."
            }
            Self::FileNotFound => {
                "The file or directory was not found. Use list_files or search_code to locate \
                 the correct path before trying again."
            }
            Self::SyntaxError => {
                "The previous operation produced a syntax error. Re-read the affected code, fix \
                 the syntax, and try again."
            }
            Self::RateLimit => {
                "The previous operation was rate limited. Continue with work that does not \
                 repeat the same request, or retry it once."
            }
            Self::Timeout => {
                "The previous operation timed out. Try a narrower request, for example a smaller \
                 path or a more specific search pattern."
            }
            Self::Generic => GENERIC_NUDGE,
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The nudge for a failed tool result text.
pub fn smart_nudge(error_text: &str) -> &'static str {
    ToolErrorKind::classify(error_text).nudge()
}
