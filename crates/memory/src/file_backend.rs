//! File-based session store: one pretty-printed JSON file per session.
//!
//! Storage location: `~/.sweloop/sessions/<id>.json` by default.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write never leaves a half-written session behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use sweloop_core::error::SessionError;
use sweloop_core::session::{Session, SessionStore, SessionSummary};
use tracing::{debug, warn};

pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, SessionError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionError::Storage(format!("Invalid session id: {id:?}")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    fn read_session(path: &Path, id: &str) -> Result<Session, SessionError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SessionError::NotFound(id.to_string()),
            _ => SessionError::Storage(format!("Failed to read {}: {e}", path.display())),
        })?;
        serde_json::from_str(&content).map_err(|e| SessionError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, id: &str) -> Result<Session, SessionError> {
        let path = self.path_for(id)?;
        let session = Self::read_session(&path, id)?;
        debug!(session_id = %id, messages = session.messages.len(), "Session loaded");
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let path = self.path_for(&session.id)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| SessionError::Storage(format!("Failed to create session directory: {e}")))?;

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize session: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| SessionError::Storage(format!("Failed to replace session file: {e}")))?;
        debug!(session_id = %session.id, path = %path.display(), "Session saved");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, SessionError> {
        let path = self.path_for(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::Storage(format!("Failed to delete session: {e}"))),
        }
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::Storage(format!("Failed to list sessions: {e}"))),
        };

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match Self::read_session(&path, id) {
                Ok(session) => out.push(SessionSummary::from(&session)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session"),
            }
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }
}
