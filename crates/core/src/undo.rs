//! Undo recording for mutating tools.
//!
//! Tools that change the workspace record the previous state of what they
//! touched through the injected [`UndoPolicy`] before writing.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of one file before a tool modified it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub tool_name: String,
    pub path: PathBuf,

    /// `None` when the file did not exist before.
    pub previous_contents: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl UndoEntry {
    pub fn new(tool_name: impl Into<String>, path: impl Into<PathBuf>, previous_contents: Option<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            path: path.into(),
            previous_contents,
            timestamp: Utc::now(),
        }
    }
}

pub trait UndoPolicy: Send + Sync {
    fn record(&self, entry: UndoEntry);
}

/// Discards every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUndo;

impl UndoPolicy for NoUndo {
    fn record(&self, _entry: UndoEntry) {}
}

/// In-memory stack of undo entries, most recent last.
#[derive(Debug, Default)]
pub struct UndoLog {
    entries: Mutex<Vec<UndoEntry>>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the most recent entry.
    pub fn pop(&self) -> Option<UndoEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).pop()
    }

    pub fn entries(&self) -> Vec<UndoEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl UndoPolicy for UndoLog {
    fn record(&self, entry: UndoEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_last_in_first_out() {
        let log = UndoLog::new();
        log.record(UndoEntry::new("write_file", "a.txt", None));
        log.record(UndoEntry::new("write_file", "b.txt", Some("old".into())));
        assert_eq!(log.len(), 2);
        let last = log.pop().unwrap();
        assert_eq!(last.path, PathBuf::from("b.txt"));
        assert_eq!(last.previous_contents.as_deref(), Some("old"));
        assert_eq!(log.len(), 1);
    }
}
