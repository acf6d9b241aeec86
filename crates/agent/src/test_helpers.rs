//! Shared test helpers for loop, dispatcher and learning tests.

use std::sync::Mutex;

use sweloop_core::error::ProviderError;
use sweloop_core::message::MessageToolCall;
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// One scripted reply.
pub enum Scripted {
    Respond(ProviderResponse),
    Fail(ProviderError),
    /// Block until the monitor is interrupted, then report it.
    WaitForInterrupt,
}

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
    call_count: Mutex<usize>,
    always_fail: bool,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Scripted::Respond).collect())
    }

    pub fn scripted(script: Vec<Scripted>) -> Self {
        Self {
            responses: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
            call_count: Mutex::new(0),
            always_fail: false,
        }
    }

    /// Every call fails with a network error.
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::scripted(vec![])
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest, monitor: &TaskMonitor) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            if self.always_fail {
                return Err(ProviderError::Network("connection refused".into()));
            }
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("SequentialMockProvider: no more responses (call #{})", *count);
            }
            responses.remove(0)
        };

        match next {
            Scripted::Respond(response) => Ok(response),
            Scripted::Fail(error) => Err(error),
            Scripted::WaitForInterrupt => {
                monitor.interrupted().await;
                Err(ProviderError::Interrupted)
            }
        }
    }
}

fn mock_usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.to_string(),
        usage: mock_usage(),
        model: "mock-model".into(),
        ..ProviderResponse::default()
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        content: thought.to_string(),
        tool_calls,
        usage: mock_usage(),
        model: "mock-model".into(),
        ..ProviderResponse::default()
    }
}

/// Helper to create a tool call with id `call_<name>`.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    make_tool_call_with_id(&format!("call_{name}"), name, args)
}

pub fn make_tool_call_with_id(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall::new(id, name, serde_json::to_string(&args).unwrap())
}
