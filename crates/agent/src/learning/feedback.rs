//! Execution feedback handed to the reflector.

use std::fmt::Write;

use sweloop_core::message::ToolCallRecord;
use sweloop_core::text::truncate_chars;

/// Errors listed individually in the feedback text.
const MAX_LISTED_ERRORS: usize = 3;
const MAX_ERROR_CHARS: usize = 200;

/// How a batch of tool calls went, as seen by the learning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Partial,
    Error,
}

impl StepOutcome {
    /// Every call succeeded, every call failed, or something in between.
    pub fn from_records(records: &[ToolCallRecord]) -> Self {
        let failed = records.iter().filter(|r| !r.succeeded()).count();
        if failed == 0 {
            Self::Success
        } else if failed == records.len() {
            Self::Error
        } else {
            Self::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }
}

pub fn format_tool_feedback(records: &[ToolCallRecord], outcome: StepOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Outcome: {}", outcome.as_str());
    let _ = writeln!(out, "Tools executed: {}", records.len());

    match outcome {
        StepOutcome::Success => {
            out.push_str("All tools completed successfully\n");
            let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
            let _ = writeln!(out, "Tools: {}", names.join(", "));
        }
        StepOutcome::Error => {
            let errors: Vec<&ToolCallRecord> = records.iter().filter(|r| !r.succeeded()).collect();
            let _ = writeln!(out, "Errors ({}):", errors.len());
            for record in errors.into_iter().take(MAX_LISTED_ERRORS) {
                let text = record.error.as_deref().unwrap_or_default();
                let _ = writeln!(out, "  - {}: {}", record.name, truncate_chars(text, MAX_ERROR_CHARS));
            }
        }
        StepOutcome::Partial => {
            let succeeded = records.iter().filter(|r| r.succeeded()).count();
            let _ = writeln!(
                out,
                "Partial success: {succeeded}/{} tools succeeded",
                records.len()
            );
        }
    }
    out.trim_end().to_string()
}
