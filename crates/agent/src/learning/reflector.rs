//! Reflector: turns one executed step into a lesson and bullet votes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sweloop_core::error::LearningError;
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::playbook::Playbook;
use sweloop_core::provider::Provider;
use sweloop_core::text::truncate_chars;

use super::{AgentResponse, complete_json};

const MAX_RESPONSE_CHARS: usize = 1000;

/// One vote the reflector cast on an existing bullet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletVote {
    pub id: String,
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reflection {
    pub reasoning: String,
    pub error_identification: String,
    pub root_cause_analysis: String,
    pub correct_approach: String,
    pub key_insight: String,
    pub bullet_tags: Vec<BulletVote>,
    /// The parsed model output, passed on to the curator verbatim.
    #[serde(skip)]
    pub raw: Value,
}

impl Reflection {
    /// Read a reflection out of a JSON object. Votes without an id or a
    /// tag are dropped.
    pub fn from_value(value: Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let bullet_tags = value
            .get("bullet_tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let id = item.get("id")?.as_str()?;
                        let tag = item.get("tag")?.as_str()?;
                        Some(BulletVote {
                            id: id.to_string(),
                            tag: tag.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            reasoning: text("reasoning"),
            error_identification: text("error_identification"),
            root_cause_analysis: text("root_cause_analysis"),
            correct_approach: text("correct_approach"),
            key_insight: text("key_insight"),
            bullet_tags,
            raw: value,
        }
    }
}

/// Everything the reflector looks at for one step.
pub struct ReflectionInput<'a> {
    pub question: &'a str,
    pub response: &'a AgentResponse,
    pub feedback: &'a str,
    pub playbook: &'a Playbook,
}

#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(&self, input: ReflectionInput<'_>, monitor: &TaskMonitor) -> Result<Reflection, LearningError>;
}

/// Reflector backed by a model call that must answer in JSON.
pub struct LlmReflector {
    provider: Arc<dyn Provider>,
    model: String,
    max_retries: u32,
}

impl LlmReflector {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_retries: max_retries.max(1),
        }
    }
}

impl fmt::Debug for LlmReflector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmReflector")
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

pub fn build_reflection_prompt(input: &ReflectionInput<'_>) -> String {
    let response = truncate_chars(&input.response.content, MAX_RESPONSE_CHARS);
    let tools = if input.response.tool_names.is_empty() {
        "No tools used".to_string()
    } else {
        format!("Used tools: {}", input.response.tool_names.join(", "))
    };
    format!(
        "You review one step taken by a coding agent and extract a reusable lesson.\n\n\
         Question:\n{question}\n\n\
         Agent response:\n{response}\n\n\
         Tool usage:\n{tools}\n\n\
         Execution feedback:\n{feedback}\n\n\
         Current playbook:\n{playbook}\n\n\
         Answer with a single JSON object and nothing else:\n\
         {{\n  \"reasoning\": \"how the step went\",\n  \"error_identification\": \"what went wrong, if anything\",\n  \
         \"root_cause_analysis\": \"why it went wrong\",\n  \"correct_approach\": \"what should be done instead\",\n  \
         \"key_insight\": \"one reusable strategy\",\n  \
         \"bullet_tags\": [{{\"id\": \"existing bullet id\", \"tag\": \"helpful|harmful|neutral\"}}]\n}}",
        question = input.question,
        feedback = input.feedback,
        playbook = input.playbook.as_prompt(),
    )
}

#[async_trait]
impl Reflector for LlmReflector {
    async fn reflect(&self, input: ReflectionInput<'_>, monitor: &TaskMonitor) -> Result<Reflection, LearningError> {
        let prompt = build_reflection_prompt(&input);
        complete_json(
            self.provider.as_ref(),
            &self.model,
            &prompt,
            self.max_retries,
            monitor,
            LearningError::Reflector,
            |value| Ok(Reflection::from_value(value)),
        )
        .await
    }
}
