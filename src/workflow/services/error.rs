//! Engine and stage errors.

use thiserror::Error;

use crate::sandbox::services::SandboxError;
use crate::task::domain::{TaskDomainError, TaskId, WorkflowState};
use crate::task::ports::TaskStoreError;
use crate::workflow::domain::Gate;
use crate::workflow::ports::{ModelError, PromptError};

/// Failure inside a stage. Caught at the stage boundary and recorded on the
/// task; never returned to engine callers.
#[derive(Debug, Error)]
pub enum StageError {
    /// The model call failed after retries.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// A prompt template failed to render.
    #[error("prompt template `{name}` failed: {reason}")]
    Template {
        /// Template name.
        name: &'static str,
        /// Renderer message.
        reason: String,
    },
    /// The sandbox could not operate.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    /// A stage output could not be serialized.
    #[error("failed to encode stage output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors returned by [`WorkflowEngine`] operations.
///
/// [`WorkflowEngine`]: super::WorkflowEngine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The store failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    /// A domain rule refused the operation, such as an invalid transition or
    /// a blank request.
    #[error(transparent)]
    Transition(#[from] TaskDomainError),
    /// The task does not exist.
    #[error("task {0} not found")]
    NotFound(TaskId),
    /// A decision arrived for a gate the task is not waiting at.
    #[error("task {task_id} is not awaiting {gate} approval (state: {state})")]
    NotAwaiting {
        /// Task.
        task_id: TaskId,
        /// Gate the decision targeted.
        gate: Gate,
        /// Actual state.
        state: WorkflowState,
    },
    /// The decision kind does not apply at this gate.
    #[error("`{decision}` is not a valid decision at the {gate} gate")]
    UnsupportedDecision {
        /// Gate.
        gate: Gate,
        /// Decision kind.
        decision: &'static str,
    },
    /// A checkpoint payload could not be encoded.
    #[error("failed to encode checkpoint: {0}")]
    Checkpoint(#[from] serde_json::Error),
    /// The approval prompt failed.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// A pooled worker panicked or was cancelled.
    #[error("workflow worker for task {task_id} stopped: {reason}")]
    Worker {
        /// Task.
        task_id: TaskId,
        /// Join error text.
        reason: String,
    },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
