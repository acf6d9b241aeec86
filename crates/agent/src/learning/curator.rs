//! Curator: turns a reflection into playbook operations.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sweloop_core::error::LearningError;
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::playbook::{DeltaBatch, Playbook};
use sweloop_core::provider::Provider;

use super::complete_json;
use super::reflector::Reflection;

pub struct CurationInput<'a> {
    pub reflection: &'a Reflection,
    pub playbook: &'a Playbook,
    pub question_context: &'a str,
    /// e.g. "Query #3"
    pub progress: &'a str,
}

#[async_trait]
pub trait Curator: Send + Sync {
    async fn curate(&self, input: CurationInput<'_>, monitor: &TaskMonitor) -> Result<DeltaBatch, LearningError>;
}

pub struct LlmCurator {
    provider: Arc<dyn Provider>,
    model: String,
    max_retries: u32,
}

impl LlmCurator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_retries: max_retries.max(1),
        }
    }
}

impl fmt::Debug for LlmCurator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCurator")
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

pub fn build_curation_prompt(input: &CurationInput<'_>) -> String {
    let stats = serde_json::to_string(&input.playbook.stats()).unwrap_or_default();
    let reflection = serde_json::to_string_pretty(&input.reflection.raw).unwrap_or_default();
    format!(
        "You maintain a playbook of strategies for a coding agent.\n\n\
         Progress: {progress}\n\
         Playbook stats: {stats}\n\n\
         Latest reflection:\n{reflection}\n\n\
         Current playbook:\n{playbook}\n\n\
         Question context:\n{question}\n\n\
         Decide which playbook changes the reflection justifies. Prefer editing or tagging \
         an existing bullet over adding a near-duplicate. Return no operations when nothing \
         new was learned.\n\n\
         Answer with a single JSON object and nothing else:\n\
         {{\n  \"reasoning\": \"why these changes\",\n  \"operations\": [\n    \
         {{\"type\": \"ADD\", \"section\": \"file_operations\", \"content\": \"...\"}},\n    \
         {{\"type\": \"EDIT\", \"bullet_id\": \"...\", \"content\": \"...\"}},\n    \
         {{\"type\": \"TAG\", \"bullet_id\": \"...\", \"tag\": \"helpful|harmful|neutral\"}},\n    \
         {{\"type\": \"REMOVE\", \"bullet_id\": \"...\"}}\n  ]\n}}",
        progress = input.progress,
        playbook = input.playbook.as_prompt(),
        question = input.question_context,
    )
}

#[async_trait]
impl Curator for LlmCurator {
    async fn curate(&self, input: CurationInput<'_>, monitor: &TaskMonitor) -> Result<DeltaBatch, LearningError> {
        let prompt = build_curation_prompt(&input);
        complete_json(
            self.provider.as_ref(),
            &self.model,
            &prompt,
            self.max_retries,
            monitor,
            LearningError::Curator,
            |value| serde_json::from_value::<DeltaBatch>(value).map_err(|e| e.to_string()),
        )
        .await
    }
}
