//! Base agent trait and per-call result types.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ModelSettings;
use crate::error::LlmError;
use crate::llm::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, RetryPolicy, TokenUsage,
    complete_with_retry,
};
use crate::workflow::state::{AgentName, DraftRequest, DraftState, StateUpdate};

/// What one agent call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub update: StateUpdate,
    pub usage: TokenUsage,
}

impl StepOutput {
    /// Output of a step that made no model call.
    pub fn local(update: StateUpdate) -> Self {
        Self {
            update,
            usage: TokenUsage::default(),
        }
    }
}

/// Tagged result of an agent call. Agents never fail outright: a model or
/// parse failure yields `Degraded` with a usable fallback output.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Ok(T),
    Degraded { output: T, cause: String },
}

impl<T> StepOutcome<T> {
    pub fn degraded(output: T, cause: impl Into<String>) -> Self {
        Self::Degraded {
            output,
            cause: cause.into(),
        }
    }

    /// Split into the usable output and the degradation cause, if any.
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            Self::Ok(output) => (output, None),
            Self::Degraded { output, cause } => (output, Some(cause)),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// A single transformation step over the draft state.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Which step this is; also the trace label.
    fn name(&self) -> AgentName;

    /// Read the current state and produce an update.
    async fn run(&self, state: &DraftState, request: &DraftRequest) -> StepOutcome<StepOutput>;
}

/// A model handle plus the sampling and retry settings of one agent.
#[derive(Clone)]
pub struct ModelCaller {
    llm: Arc<dyn LlmProvider>,
    settings: ModelSettings,
    retry: RetryPolicy,
}

impl ModelCaller {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: ModelSettings, retry: RetryPolicy) -> Self {
        Self {
            llm,
            settings,
            retry,
        }
    }

    /// One system + user prompt round trip, bounded by the retry policy.
    pub async fn call(
        &self,
        agent: AgentName,
        system: String,
        user: String,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(agent = %agent, prompt = %user, "Calling model");
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let response = complete_with_retry(self.llm.as_ref(), request, &self.retry).await?;
        debug!(
            agent = %agent,
            model = self.llm.model_name(),
            reply = %response.content,
            "Model replied"
        );
        Ok(response)
    }
}
