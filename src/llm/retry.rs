//! Timeout and retry wrapper around a single model call.

use std::time::Duration;

use tracing::warn;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// How long to wait for a model call and how often to retry it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Extra attempts after the first, for transient errors only.
    pub retries: u32,
    /// Base delay between attempts; doubles each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Call the model, bounding each attempt by `policy.timeout` and retrying
/// transient failures.
pub async fn complete_with_retry(
    llm: &dyn LlmProvider,
    request: CompletionRequest,
    policy: &RetryPolicy,
) -> Result<CompletionResponse, LlmError> {
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, llm.complete(request.clone())).await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(policy.timeout)),
        };

        match result {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt < policy.retries => {
                let delay = match &e {
                    LlmError::RateLimited {
                        retry_after: Some(after),
                        ..
                    } => *after,
                    _ => backoff_delay(policy, attempt),
                };
                warn!(
                    model = llm.model_name(),
                    attempt = attempt + 1,
                    error = %e,
                    "Model call failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exponential backoff, saturating instead of overflowing.
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy.backoff.saturating_mul(2u32.saturating_pow(attempt))
}
