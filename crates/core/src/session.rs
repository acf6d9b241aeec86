//! Sessions: the persisted unit of conversation state.
//!
//! A session owns its message list, its playbook and a free-form metadata
//! bag. The episodic summary cache lives in that bag under
//! [`SUMMARY_CACHE_KEY`] so it survives restarts. A turn borrows the session
//! mutably, which is what keeps memory and playbook single-writer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::message::Message;
use crate::playbook::Playbook;

/// Metadata key holding the serialized [`ConversationSummaryCache`].
pub const SUMMARY_CACHE_KEY: &str = "conversation_summary";

/// The cached episodic summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummaryCache {
    pub summary: String,

    /// Message count when the summary was produced
    pub total_message_count_at_creation: usize,

    /// Index (in the system-filtered list) up to which messages are covered
    pub last_summarized_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default)]
    pub playbook: Playbook,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: None,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            playbook: Playbook::new(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn append_message(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn current_messages(&self) -> &[Message] {
        &self.messages
    }

    /// Swap the whole message list, as compaction does.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.updated_at = Utc::now();
        self.messages = messages;
    }

    pub fn playbook(&self) -> &Playbook {
        &self.playbook
    }

    pub fn update_playbook(&mut self, playbook: Playbook) {
        self.updated_at = Utc::now();
        self.playbook = playbook;
    }

    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// The persisted summary cache; a malformed entry counts as absent.
    pub fn summary_cache(&self) -> Option<ConversationSummaryCache> {
        self.metadata
            .get(SUMMARY_CACHE_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_summary_cache(&mut self, cache: Option<&ConversationSummaryCache>) {
        match cache.and_then(|c| serde_json::to_value(c).ok()) {
            Some(value) => {
                self.metadata.insert(SUMMARY_CACHE_KEY.to_string(), value);
            }
            None => {
                self.metadata.remove(SUMMARY_CACHE_KEY);
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            updated_at: session.updated_at,
            message_count: session.messages.len(),
        }
    }
}

/// Where sessions are persisted between turns.
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, id: &str) -> Result<Session, SessionError>;

    async fn save(&self, session: &Session) -> Result<(), SessionError>;

    async fn delete(&self, id: &str) -> Result<bool, SessionError>;

    /// Most recently updated first.
    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError>;
}
