//! Per-session JSONL debug event log.
//!
//! An explicit handle passed to every component that records events. The
//! disabled variant does nothing; the file variant appends one JSON object
//! per line under a mutex, so concurrent sub-agent tasks can share it.
//!
//! Line format:
//! `{"ts": "...", "elapsed_ms": 12, "event": "tool_call_start", "component": "dispatcher", "data": {...}}`

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

/// Longest string value kept verbatim in a log line.
pub const MAX_LOGGED_CHARS: usize = 200;

#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    started_at: Instant,
    file: Mutex<File>,
}

#[derive(Debug, Clone, Default)]
pub enum DebugLogger {
    #[default]
    Disabled,
    File(Arc<FileSink>),
}

impl DebugLogger {
    pub fn disabled() -> Self {
        Self::Disabled
    }

    /// Open (or append to) `<dir>/<session_id>.debug.jsonl`.
    pub fn open(dir: &Path, session_id: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{session_id}.debug.jsonl"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self::File(Arc::new(FileSink {
            path,
            started_at: Instant::now(),
            file: Mutex::new(file),
        })))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Disabled => None,
            Self::File(sink) => Some(&sink.path),
        }
    }

    /// Append one event. Write failures are reported through `tracing`
    /// and otherwise ignored.
    pub fn log(&self, event: &str, component: &str, data: Value) {
        let Self::File(sink) = self else {
            return;
        };
        let line = json!({
            "ts": Utc::now().to_rfc3339(),
            "elapsed_ms": sink.started_at.elapsed().as_millis() as u64,
            "event": event,
            "component": component,
            "data": truncate_strings(data),
        });
        let mut file = sink.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(file, "{line}") {
            warn!(path = %sink.path.display(), error = %e, "Failed to write debug log line");
        }
    }
}

/// Shorten every string in `value` to [`MAX_LOGGED_CHARS`] characters.
pub fn truncate_strings(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_for_log(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(truncate_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, truncate_strings(v)))
                .collect(),
        ),
        other => other,
    }
}

fn truncate_for_log(s: &str) -> String {
    let total = s.chars().count();
    if total <= MAX_LOGGED_CHARS {
        return s.to_string();
    }
    let head: String = s.chars().take(MAX_LOGGED_CHARS).collect();
    format!("{head}... ({total} chars)")
}
