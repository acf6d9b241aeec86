//! Playbook learning.
//!
//! After every tool batch the reflector looks at what happened and votes on
//! the strategies that were in play; the curator then turns the reflection
//! into a delta batch that is applied to the session's playbook. Learning
//! is best effort: a failure is logged and the turn carries on.

pub mod curator;
pub mod feedback;
pub mod reflector;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use sweloop_core::debug_log::DebugLogger;
use sweloop_core::error::{Error, LearningError};
use sweloop_core::event::{AgentEvent, EventBus};
use sweloop_core::message::{Message, ToolCallRecord};
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::playbook::{BulletTag, DeltaBatch, Playbook};
use sweloop_core::provider::{Provider, ProviderRequest};
use sweloop_core::session::Session;
use sweloop_core::text::truncate_chars;
use tracing::{debug, info, warn};

pub use curator::{Curator, CurationInput, LlmCurator};
pub use feedback::{StepOutcome, format_tool_feedback};
pub use reflector::{BulletVote, LlmReflector, Reflection, ReflectionInput, Reflector};

const JSON_RETRY_SUFFIX: &str = "\n\nYour previous answer could not be parsed. Reply with one valid JSON \
object only, without markdown fences or commentary.";

/// The assistant output the learning loop reflects on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResponse {
    pub content: String,
    pub tool_names: Vec<String>,
}

/// One executed step.
pub struct LearningStep<'a> {
    pub query: &'a str,
    pub response: Option<&'a AgentResponse>,
    pub records: &'a [ToolCallRecord],
}

/// What one successful learning pass changed.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningReport {
    pub outcome: StepOutcome,
    pub tags_applied: usize,
    pub operations: usize,
    pub bullets_before: usize,
    pub bullets_after: usize,
}

pub struct LearningLoop {
    reflector: Arc<dyn Reflector>,
    curator: Arc<dyn Curator>,
    executions: AtomicU64,
}

impl LearningLoop {
    pub fn new(reflector: Arc<dyn Reflector>, curator: Arc<dyn Curator>) -> Self {
        Self {
            reflector,
            curator,
            executions: AtomicU64::new(0),
        }
    }

    /// Reflector and curator both backed by `provider`.
    pub fn with_provider(provider: Arc<dyn Provider>, model: &str, max_retries: u32) -> Self {
        Self::new(
            Arc::new(LlmReflector::new(provider.clone(), model, max_retries)),
            Arc::new(LlmCurator::new(provider, model, max_retries)),
        )
    }

    /// Learn from `step` and store the result in `session`.
    ///
    /// Never fails: errors are logged and the playbook keeps whatever was
    /// applied before the failure.
    pub async fn record(
        &self,
        session: &mut Session,
        step: LearningStep<'_>,
        monitor: &TaskMonitor,
        debug_log: &DebugLogger,
        events: &EventBus,
    ) -> Option<LearningReport> {
        let mut playbook = session.playbook().clone();
        let result = self.learn(&mut playbook, &step, monitor, debug_log).await;
        session.update_playbook(playbook);
        match result {
            Ok(Some(report)) => {
                events.publish(AgentEvent::PlaybookUpdated {
                    bullets: report.bullets_after,
                    operations: report.operations,
                });
                Some(report)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Playbook learning failed");
                debug_log.log("learning_error", "learning", json!({ "error": e.to_string() }));
                None
            }
        }
    }

    /// Reflect on `step`, apply the bullet votes, then curate and apply the
    /// delta batch. Votes on unknown bullets are skipped; the delta batch
    /// is applied whole or not at all.
    pub async fn learn(
        &self,
        playbook: &mut Playbook,
        step: &LearningStep<'_>,
        monitor: &TaskMonitor,
        debug_log: &DebugLogger,
    ) -> Result<Option<LearningReport>, Error> {
        let Some(response) = step.response else {
            return Ok(None);
        };
        if step.records.is_empty() {
            return Ok(None);
        }

        let outcome = StepOutcome::from_records(step.records);
        let feedback = format_tool_feedback(step.records, outcome);
        let reflection = self
            .reflector
            .reflect(
                ReflectionInput {
                    question: step.query,
                    response,
                    feedback: &feedback,
                    playbook,
                },
                monitor,
            )
            .await?;

        let bullets_before = playbook.len();
        let mut tags_applied = 0;
        for vote in &reflection.bullet_tags {
            let Ok(tag) = vote.tag.parse::<BulletTag>() else {
                debug!(bullet = %vote.id, tag = %vote.tag, "Ignoring unknown tag");
                continue;
            };
            match playbook.tag_bullet(&vote.id, tag) {
                Ok(()) => tags_applied += 1,
                Err(e) => debug!(error = %e, "Ignoring vote"),
            }
        }

        let query_number = self.executions.fetch_add(1, Ordering::Relaxed) + 1;
        let progress = format!("Query #{query_number}");
        let delta: DeltaBatch = self
            .curator
            .curate(
                CurationInput {
                    reflection: &reflection,
                    playbook,
                    question_context: step.query,
                    progress: &progress,
                },
                monitor,
            )
            .await?;
        playbook.apply_delta(&delta)?;

        let report = LearningReport {
            outcome,
            tags_applied,
            operations: delta.operations.len(),
            bullets_before,
            bullets_after: playbook.len(),
        };
        info!(
            outcome = outcome.as_str(),
            tags = tags_applied,
            operations = report.operations,
            bullets = report.bullets_after,
            "Playbook updated"
        );
        debug_log.log(
            "playbook_evolution",
            "learning",
            json!({
                "query": truncate_chars(step.query, 200),
                "outcome": outcome.as_str(),
                "bullets_before": bullets_before,
                "bullets_after": report.bullets_after,
                "tags_applied": tags_applied,
                "operations": delta.operations,
                "key_insight": reflection.key_insight,
                "curator_reasoning": truncate_chars(&delta.reasoning, 200),
            }),
        );
        Ok(Some(report))
    }
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model answer that must be a JSON object.
pub fn parse_json_object(text: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(strip_json_fences(text)).map_err(|e| e.to_string())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err("expected a JSON object".to_string())
    }
}

/// Ask `model` for a JSON object, retrying with a corrective suffix while
/// the answer does not parse. Provider failures are not retried.
pub(crate) async fn complete_json<T, F>(
    provider: &dyn Provider,
    model: &str,
    prompt: &str,
    max_retries: u32,
    monitor: &TaskMonitor,
    provider_error: fn(String) -> LearningError,
    parse: F,
) -> Result<T, LearningError>
where
    F: Fn(Value) -> Result<T, String> + Send,
{
    let mut current = prompt.to_string();
    let mut last_reason = String::new();
    for attempt in 1..=max_retries {
        let request = ProviderRequest {
            temperature: 0.2,
            ..ProviderRequest::plain(model, vec![Message::user(current.as_str())])
        };
        let response = provider
            .complete(request, monitor)
            .await
            .map_err(|e| provider_error(e.to_string()))?;
        match parse_json_object(&response.content).and_then(&parse) {
            Ok(value) => return Ok(value),
            Err(reason) => {
                debug!(attempt, reason = %reason, "Unparseable learning output");
                last_reason = reason;
                current = format!("{prompt}{JSON_RETRY_SUFFIX}");
            }
        }
    }
    Err(LearningError::Unparseable {
        attempts: max_retries,
        reason: last_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sweloop_core::playbook::DeltaOperation;
    use std::sync::Mutex;

    use crate::test_helpers::{SequentialMockProvider, make_text_response};

    struct FixedReflector(Value);

    #[async_trait]
    impl Reflector for FixedReflector {
        async fn reflect(&self, _: ReflectionInput<'_>, _: &TaskMonitor) -> Result<Reflection, LearningError> {
            Ok(Reflection::from_value(self.0.clone()))
        }
    }

    struct FailingReflector;

    #[async_trait]
    impl Reflector for FailingReflector {
        async fn reflect(&self, _: ReflectionInput<'_>, _: &TaskMonitor) -> Result<Reflection, LearningError> {
            Err(LearningError::Reflector("model unavailable".into()))
        }
    }

    #[derive(Default)]
    struct RecordingCurator {
        batch: DeltaBatch,
        progress: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Curator for RecordingCurator {
        async fn curate(&self, input: CurationInput<'_>, _: &TaskMonitor) -> Result<DeltaBatch, LearningError> {
            self.progress.lock().unwrap().push(input.progress.to_string());
            Ok(self.batch.clone())
        }
    }

    fn records() -> Vec<ToolCallRecord> {
        vec![ToolCallRecord::new("c1", "read_file", json!({"path": "a.rs"}))]
    }

    fn response() -> AgentResponse {
        AgentResponse {
            content: "reading a.rs".into(),
            tool_names: vec!["read_file".into()],
        }
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_json_fences("  {} "), "{}");
        assert!(parse_json_object("[1, 2]").is_err());
        assert!(parse_json_object("not json").is_err());
    }

    #[tokio::test]
    async fn votes_and_delta_reach_the_playbook() {
        let mut playbook = Playbook::new();
        let existing = playbook.add_bullet("file_operations", "list before reading").unwrap();
        let reflector = FixedReflector(json!({
            "key_insight": "read the test first",
            "bullet_tags": [{"id": existing.as_str(), "tag": "helpful"}, {"id": "ghost-9", "tag": "harmful"}, {"id": existing.as_str(), "tag": "bogus"}]
        }));
        let curator = Arc::new(RecordingCurator {
            batch: DeltaBatch {
                reasoning: "new lesson".into(),
                operations: vec![DeltaOperation::Add {
                    section: "testing".into(),
                    content: "read the failing test first".into(),
                }],
            },
            ..Default::default()
        });
        let learning = LearningLoop::new(Arc::new(reflector), curator.clone());
        let records = records();
        let resp = response();
        let step = LearningStep {
            query: "fix the test",
            response: Some(&resp),
            records: &records,
        };

        let report = learning
            .learn(&mut playbook, &step, &TaskMonitor::new("t"), &DebugLogger::disabled())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.tags_applied, 1);
        assert_eq!(report.bullets_before, 1);
        assert_eq!(report.bullets_after, 2);
        assert_eq!(playbook.get(&existing).unwrap().helpful_count, 1);

        learning
            .learn(&mut playbook, &step, &TaskMonitor::new("t"), &DebugLogger::disabled())
            .await
            .unwrap();
        assert_eq!(*curator.progress.lock().unwrap(), vec!["Query #1", "Query #2"]);
    }

    #[tokio::test]
    async fn nothing_to_learn_without_records() {
        let learning = LearningLoop::new(Arc::new(FailingReflector), Arc::new(RecordingCurator::default()));
        let resp = response();
        let step = LearningStep {
            query: "q",
            response: Some(&resp),
            records: &[],
        };
        let mut playbook = Playbook::new();
        let out = learning
            .learn(&mut playbook, &step, &TaskMonitor::new("t"), &DebugLogger::disabled())
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn record_swallows_reflector_failure() {
        let learning = LearningLoop::new(Arc::new(FailingReflector), Arc::new(RecordingCurator::default()));
        let mut session = Session::new();
        let records = records();
        let resp = response();
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let out = learning
            .record(
                &mut session,
                LearningStep {
                    query: "q",
                    response: Some(&resp),
                    records: &records,
                },
                &TaskMonitor::new("t"),
                &DebugLogger::disabled(),
                &events,
            )
            .await;
        assert!(out.is_none());
        assert!(session.playbook().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unparseable_output_gives_up_after_retries() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("I think it went fine"),
            make_text_response("still no json"),
        ]));
        let result = complete_json(
            provider.as_ref(),
            "mock",
            "reflect",
            2,
            &TaskMonitor::new("t"),
            LearningError::Reflector,
            Ok,
        )
        .await;
        assert!(matches!(result, Err(LearningError::Unparseable { attempts: 2, .. })));
        let requests = provider.requests();
        assert_eq!(requests[0].messages[0].content, "reflect");
        assert!(requests[1].messages[0].content.ends_with(JSON_RETRY_SUFFIX));
    }
}
