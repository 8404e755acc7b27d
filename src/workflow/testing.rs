//! Scripted model for agent unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::WorkflowConfig;
use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::workflow::agent::ModelCaller;

/// Replays canned replies in order; records every request it sees.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn failing() -> Arc<Self> {
        Self::new(vec![Err(LlmError::AuthFailed {
            provider: "scripted".into(),
        })])
    }

    /// Concatenated user prompt of the n-th request.
    pub fn user_prompt(&self, n: usize) -> String {
        let requests = self.requests.lock().unwrap();
        requests[n]
            .messages
            .iter()
            .filter(|m| m.role == crate::llm::Role::User)
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(CompletionResponse {
                content,
                input_tokens: 12,
                output_tokens: 8,
                finish_reason: FinishReason::Stop,
                response_id: None,
            }),
            Some(Err(e)) => Err(e),
            None => Err(LlmError::InvalidResponse {
                provider: "scripted".into(),
                reason: "script exhausted".into(),
            }),
        }
    }
}

/// Caller with no retries, for deterministic reply consumption.
pub fn caller(llm: Arc<ScriptedLlm>) -> ModelCaller {
    let config = WorkflowConfig::default();
    let mut retry = config.retry_policy();
    retry.retries = 0;
    ModelCaller::new(llm, config.writer, retry)
}
