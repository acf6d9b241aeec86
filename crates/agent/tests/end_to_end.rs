//! End-to-end tests for the sweloop execution loop.
//!
//! These run whole turns against a real workspace on disk, with the built-in
//! tools, a scripted model and a file-backed session store.

use std::sync::{Arc, Mutex};

use serde_json::json;
use sweloop_agent::{AgentLoop, LoopSettings, SubAgentTool};
use sweloop_config::AppConfig;
use sweloop_core::approval::AutonomyLevel;
use sweloop_core::error::ProviderError;
use sweloop_core::event::AgentEvent;
use sweloop_core::message::{MessageToolCall, Role};
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use sweloop_core::session::{Session, SessionStore};
use sweloop_core::undo::UndoLog;
use sweloop_memory::FileSessionStore;
use sweloop_tools::default_registry;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted responses in sequence and records every request.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest, _monitor: &TaskMonitor) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::InvalidResponse("script exhausted".into()));
        }
        Ok(responses.remove(0))
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 100,
        completion_tokens: 20,
        total_tokens: 120,
    })
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.into(),
        usage: usage(),
        model: "mock-model".into(),
        ..ProviderResponse::default()
    }
}

fn tool_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        tool_calls: calls,
        usage: usage(),
        model: "mock-model".into(),
        ..ProviderResponse::default()
    }
}

fn call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall::new(id, name, args.to_string())
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
    std::fs::write(
        dir.path().join("src/main.rs"),
        "fn main() {\n    println!(\"hello\");\n}\n",
    )
    .unwrap();
    dir
}

fn settings() -> LoopSettings {
    let mut settings = LoopSettings::default();
    settings.model = "mock-model".into();
    settings.auxiliary_model = "mock-model".into();
    settings.learning.enabled = false;
    settings
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_then_read_then_answer() {
    let dir = workspace();
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![call("c1", "list_files", json!({"path": "."}))]),
        tool_response(vec![call("c2", "read_file", json!({"path": "src/main.rs"}))]),
        text_response("main.rs prints hello."),
    ]));
    let agent = AgentLoop::new(
        provider.clone(),
        Arc::new(default_registry(dir.path())),
        Arc::new(settings()),
    );
    let mut session = Session::new();

    let outcome = agent.run_turn(&mut session, "What does this project do?").await;
    assert_eq!(outcome.summary, "main.rs prints hello.");
    assert_eq!(outcome.iterations, 3);
    assert!(!outcome.interrupted);
    assert_eq!(provider.calls(), 3);

    let tool_messages: Vec<_> = session.messages.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(tool_messages.len(), 2);
    assert!(tool_messages.iter().all(|m| !m.is_tool_error()));
    assert!(tool_messages[1].content.contains("println!"));

    let final_answers = session
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
        .count();
    assert_eq!(final_answers, 1);
    assert_eq!(session.messages.last().unwrap().content, "main.rs prints hello.");
}

#[tokio::test]
async fn mixed_batch_runs_in_order_then_answers() {
    let dir = workspace();
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![
            call("c1", "list_files", json!({"path": "."})),
            call("c2", "read_file", json!({"path": "src/main.rs"})),
        ]),
        text_response("Listed and read."),
    ]));
    let agent = AgentLoop::new(
        provider.clone(),
        Arc::new(default_registry(dir.path())),
        Arc::new(settings()),
    );
    let mut session = Session::new();

    let outcome = agent.run_turn(&mut session, "Look around").await;
    assert_eq!(outcome.iterations, 2);
    assert_eq!(provider.calls(), 2);

    let tool_ids: Vec<_> = session
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.tool_call_id.clone().unwrap_or_default())
        .collect();
    assert_eq!(tool_ids, ["c1", "c2"]);

    let tools: Vec<_> = session.messages.iter().filter(|m| m.role == Role::Tool).collect();
    assert!(tools[0].content.contains("main.rs"));
    assert!(tools[1].content.contains("println!"));

    let final_answers: Vec<_> = session
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
        .collect();
    assert_eq!(final_answers.len(), 1);
    assert_eq!(session.messages.last().unwrap().content, "Listed and read.");
    assert_eq!(session.messages.last().unwrap().role, Role::Assistant);
}

#[tokio::test]
async fn write_is_recorded_for_undo() {
    let dir = workspace();
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![call(
            "w1",
            "write_file",
            json!({"path": "src/lib.rs", "content": "pub fn answer() -> u32 { 42 }\n"}),
        )]),
        text_response("Added src/lib.rs."),
    ]));
    let undo = Arc::new(UndoLog::new());
    let agent = AgentLoop::new(provider, Arc::new(default_registry(dir.path())), Arc::new(settings()))
        .with_undo(undo.clone());
    let mut session = Session::new();

    agent.run_turn(&mut session, "Add a lib.rs").await;
    assert!(dir.path().join("src/lib.rs").exists());
    assert_eq!(undo.len(), 1);

    sweloop_tools::undo_last(&undo).unwrap();
    assert!(!dir.path().join("src/lib.rs").exists());
}

#[tokio::test]
async fn parallel_subagents_keep_model_order() {
    let dir = workspace();
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![
            call("s1", "spawn_subagent", json!({"description": "manifest", "prompt": "Read Cargo.toml"})),
            call("s2", "spawn_subagent", json!({"description": "entry", "prompt": "Read src/main.rs"})),
        ]),
        // Children run concurrently; both only need one answer each.
        text_response("child answer"),
        text_response("child answer"),
        text_response("Both files inspected."),
    ]));
    let settings = settings();
    let mut registry = default_registry(dir.path());
    SubAgentTool::register(&mut registry, provider.clone(), &settings);
    let agent = AgentLoop::new(provider.clone(), Arc::new(registry), Arc::new(settings));
    let mut rx = agent.events().subscribe();
    let mut session = Session::new();

    let outcome = agent.run_turn(&mut session, "Inspect the project").await;
    assert_eq!(outcome.summary, "Both files inspected.");

    let step = session
        .messages
        .iter()
        .find(|m| !m.tool_calls.is_empty())
        .unwrap();
    let roots: Vec<_> = step.tool_calls.roots().map(|r| r.id.as_str()).collect();
    assert_eq!(roots, vec!["s1", "s2"]);
    let tool_ids: Vec<_> = session
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.tool_call_id.clone().unwrap())
        .collect();
    assert_eq!(tool_ids, vec!["s1", "s2"]);

    let mut parallel = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event.as_ref(), AgentEvent::ParallelBatchStarted { .. }) {
            parallel = true;
        }
    }
    assert!(parallel);
}

#[tokio::test]
async fn configured_agent_saves_the_session() {
    let dir = workspace();
    let sessions = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.model = "mock-model".into();
    config.workspace = Some(dir.path().to_path_buf());
    config.sessions.dir = Some(sessions.path().to_path_buf());
    config.sessions.auto_save = true;
    config.learning.enabled = false;
    config.autonomy.level = AutonomyLevel::Full;

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![call("c1", "read_file", json!({"path": "Cargo.toml"}))]),
        text_response("It is a crate named demo."),
    ]));
    let agent = AgentLoop::from_config(provider, &config);
    assert!(agent.registry().contains("spawn_subagent"));

    let mut session = Session::new();
    agent.run_turn(&mut session, "What is this crate called?").await;

    let store = FileSessionStore::new(sessions.path());
    let reloaded = store.load(&session.id).await.unwrap();
    assert_eq!(reloaded.messages.len(), session.messages.len());
    assert_eq!(reloaded.messages.last().unwrap().content, "It is a crate named demo.");
}

#[tokio::test]
async fn tool_schemas_are_sent_with_requests() {
    let dir = workspace();
    let provider = Arc::new(ScriptedProvider::new(vec![text_response("ok")]));
    let agent = AgentLoop::new(provider.clone(), Arc::new(default_registry(dir.path())), Arc::new(settings()));
    let mut session = Session::new();
    agent.run_turn(&mut session, "hi").await;

    let names: Vec<String> = provider.requests()[0].tools.iter().map(|t| t.name.clone()).collect();
    for expected in ["read_file", "list_files", "search_code", "write_file", "task_complete"] {
        assert!(names.iter().any(|n| n == expected), "missing {expected} in {names:?}");
    }

    let read_only = agent.registry().read_only_names();
    for expected in ["read_file", "list_files", "search_code"] {
        assert!(read_only.iter().any(|n| n == expected), "{expected} should be read-only");
    }
    assert!(!read_only.iter().any(|n| n == "write_file"));
}
