//! Interactive approval port.

use std::sync::Arc;

use thiserror::Error;

use crate::task::domain::TaskId;
use crate::workflow::domain::{Decision, Gate, StageSnapshot};

/// Asks a human for a decision at a gate. Blocks until one is given.
#[cfg_attr(test, mockall::automock)]
pub trait ApprovalPrompt: Send + Sync {
    /// Presents `snapshot` and returns the decision for `gate`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the prompt cannot be shown or answered.
    fn decide(
        &self,
        task_id: TaskId,
        gate: Gate,
        snapshot: &StageSnapshot,
    ) -> Result<Decision, PromptError>;
}

/// Errors raised while prompting.
#[derive(Debug, Clone, Error)]
pub enum PromptError {
    /// The input stream ended before a decision was given.
    #[error("approval input closed before a decision was made")]
    Closed,
    /// Reading or writing the prompt failed.
    #[error("approval prompt I/O failed: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
