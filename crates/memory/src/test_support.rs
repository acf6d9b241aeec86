//! Scripted provider for memory tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sweloop_core::error::ProviderError;
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::provider::{Provider, ProviderRequest, ProviderResponse};

/// Returns queued text responses in order and records every prompt.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Content of the last message of every request, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest, _monitor: &TaskMonitor) -> Result<ProviderResponse, ProviderError> {
        let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);
        if self.fail {
            return Err(ProviderError::Network("connection refused".into()));
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .map(ProviderResponse::text)
            .ok_or_else(|| ProviderError::InvalidResponse("no more scripted responses".into()))
    }
}
