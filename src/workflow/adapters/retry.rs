//! Exponential-backoff wrapper around any [`ModelClient`].

use async_trait::async_trait;
use tracing::warn;

use crate::workflow::domain::{ChatMessage, ModelResponse, RetryPolicy, ToolSchema};
use crate::workflow::ports::{ModelClient, ModelResult};

/// Retries transient failures of the wrapped client.
#[derive(Debug, Clone)]
pub struct RetryingModelClient<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M> RetryingModelClient<M>
where
    M: ModelClient,
{
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<M> ModelClient for RetryingModelClient<M>
where
    M: ModelClient,
{
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> ModelResult<ModelResponse> {
        let mut retry = 0_u32;
        loop {
            match self.inner.generate(messages, tools).await {
                Err(err)
                    if err.is_transient()
                        && retry.saturating_add(1) < self.policy.max_attempts =>
                {
                    let delay = self.policy.delay(retry);
                    warn!(
                        attempt = retry.saturating_add(1),
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "model call failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry = retry.saturating_add(1);
                }
                result => return result,
            }
        }
    }
}
