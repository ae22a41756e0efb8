//! Language-model port.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::workflow::domain::{ChatMessage, ModelResponse, ToolSchema};

/// Result type for model calls.
pub type ModelResult<T> = Result<T, ModelError>;

/// A chat-completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generates the next assistant turn for `messages`, optionally offering
    /// `tools`.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> ModelResult<ModelResponse>;
}

#[async_trait]
impl<T> ModelClient for Arc<T>
where
    T: ModelClient + ?Sized,
{
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> ModelResult<ModelResponse> {
        (**self).generate(messages, tools).await
    }
}

/// Errors returned by model backends.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// A failure worth retrying: timeouts, rate limits, dropped connections.
    #[error("transient model failure: {0}")]
    Transient(String),
    /// A failure retrying will not fix.
    #[error("model request rejected: {0}")]
    Rejected(String),
    /// Backend-specific failure.
    #[error("model backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }

    /// Whether a retry may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
