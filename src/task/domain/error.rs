//! Error types for task domain validation and parsing.

use super::{WorkflowEvent, WorkflowState};
use thiserror::Error;

/// Errors returned while constructing or transitioning domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task request is empty after trimming.
    #[error("task request must not be empty")]
    EmptyRequest,

    /// The event is not permitted from the current workflow state.
    #[error("invalid workflow transition: {event} is not allowed from {from}")]
    InvalidTransition {
        /// Current workflow state.
        from: WorkflowState,
        /// Rejected event.
        event: WorkflowEvent,
    },
}

/// Error returned while parsing workflow states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown workflow state: {0}")]
pub struct ParseWorkflowStateError(pub String);

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
