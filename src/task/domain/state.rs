//! Workflow state machine and the coarse task status derived from it.

use super::{ParseTaskStatusError, ParseWorkflowStateError, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse task status, always derived from [`WorkflowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has been created but the workflow has not started.
    Pending,
    /// Task is somewhere inside the workflow.
    InProgress,
    /// Task finished successfully.
    Completed,
    /// Task stopped on an unrecoverable error.
    Failed,
    /// Task was rejected at an approval gate.
    Cancelled,
}

impl TaskStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained workflow state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Created, not started.
    Pending,
    /// The lead model is producing a plan.
    Planning,
    /// A plan exists and waits for a decision.
    PlanAwaitingApproval,
    /// The plan was approved; implementation has not started.
    PlanApproved,
    /// The plan was rejected.
    PlanRejected,
    /// The member model is implementing the plan.
    Implementing,
    /// The lead model is reviewing the implementation.
    Reviewing,
    /// Verification commands are running.
    Verifying,
    /// Implementation outputs wait for a decision.
    ImplementationAwaitingApproval,
    /// Implementation was approved and waits to be finalized.
    ImplementationApproved,
    /// Implementation was rejected.
    ImplementationRejected,
    /// Workflow finished successfully.
    Completed,
    /// Workflow stopped on an error.
    Failed,
}

impl WorkflowState {
    /// Every workflow state, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Pending,
        Self::Planning,
        Self::PlanAwaitingApproval,
        Self::PlanApproved,
        Self::PlanRejected,
        Self::Implementing,
        Self::Reviewing,
        Self::Verifying,
        Self::ImplementationAwaitingApproval,
        Self::ImplementationApproved,
        Self::ImplementationRejected,
        Self::Completed,
        Self::Failed,
    ];

    /// States a task may be resumed from.
    pub const IN_FLIGHT: [Self; 8] = [
        Self::Planning,
        Self::PlanAwaitingApproval,
        Self::PlanApproved,
        Self::Implementing,
        Self::Reviewing,
        Self::Verifying,
        Self::ImplementationAwaitingApproval,
        Self::ImplementationApproved,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Planning => "planning",
            Self::PlanAwaitingApproval => "plan_awaiting_approval",
            Self::PlanApproved => "plan_approved",
            Self::PlanRejected => "plan_rejected",
            Self::Implementing => "implementing",
            Self::Reviewing => "reviewing",
            Self::Verifying => "verifying",
            Self::ImplementationAwaitingApproval => "implementation_awaiting_approval",
            Self::ImplementationApproved => "implementation_approved",
            Self::ImplementationRejected => "implementation_rejected",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns the status every row in this state carries.
    #[must_use]
    pub const fn status(self) -> TaskStatus {
        match self {
            Self::Pending => TaskStatus::Pending,
            Self::Completed => TaskStatus::Completed,
            Self::Failed => TaskStatus::Failed,
            Self::PlanRejected | Self::ImplementationRejected => TaskStatus::Cancelled,
            Self::Planning
            | Self::PlanAwaitingApproval
            | Self::PlanApproved
            | Self::Implementing
            | Self::Reviewing
            | Self::Verifying
            | Self::ImplementationAwaitingApproval
            | Self::ImplementationApproved => TaskStatus::InProgress,
        }
    }

    /// Returns `true` when no further workflow event except `Restart` applies.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::PlanRejected | Self::ImplementationRejected | Self::Completed | Self::Failed
        )
    }

    /// Returns `true` for states listed by the resumable query.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self.status(), TaskStatus::InProgress)
    }

    /// Applies `event` and returns the next state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] when the pair is not in
    /// the transition table.
    pub const fn apply(self, event: WorkflowEvent) -> Result<Self, TaskDomainError> {
        use WorkflowEvent as E;

        let next = match (self, event) {
            (_, E::Restart) => Some(Self::Pending),
            (from, E::Fail) if !from.is_terminal() => Some(Self::Failed),
            (Self::Pending, E::Start) => Some(Self::Planning),
            (Self::Planning, E::PlanProduced) => Some(Self::PlanAwaitingApproval),
            (Self::PlanAwaitingApproval, E::PlanApproved) => Some(Self::PlanApproved),
            (Self::PlanAwaitingApproval, E::PlanRejected) => Some(Self::PlanRejected),
            (Self::PlanAwaitingApproval, E::PlanChangesRequested) => Some(Self::Planning),
            (Self::PlanApproved, E::BeginImplementation) => Some(Self::Implementing),
            (Self::Implementing, E::ImplementationProduced) => Some(Self::Reviewing),
            (Self::Reviewing, E::ReviewProduced) => Some(Self::Verifying),
            (Self::Verifying, E::VerificationProduced) => {
                Some(Self::ImplementationAwaitingApproval)
            }
            (Self::ImplementationAwaitingApproval, E::ImplementationApproved) => {
                Some(Self::ImplementationApproved)
            }
            (Self::ImplementationAwaitingApproval, E::ImplementationRejected) => {
                Some(Self::ImplementationRejected)
            }
            (
                Self::ImplementationAwaitingApproval,
                E::ImplementationChangesRequested | E::RetryImplementation,
            ) => Some(Self::Implementing),
            (Self::ImplementationApproved, E::Finalize) => Some(Self::Completed),
            _ => None,
        };

        match next {
            Some(state) => Ok(state),
            None => Err(TaskDomainError::InvalidTransition { from: self, event }),
        }
    }
}

impl TryFrom<&str> for WorkflowState {
    type Error = ParseWorkflowStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| ParseWorkflowStateError(value.to_owned()))
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive [`WorkflowState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Begin planning.
    Start,
    /// A plan was produced.
    PlanProduced,
    /// The plan was approved.
    PlanApproved,
    /// The plan was rejected.
    PlanRejected,
    /// Plan changes were requested.
    PlanChangesRequested,
    /// Implementation begins from an approved plan.
    BeginImplementation,
    /// Implementation finished.
    ImplementationProduced,
    /// Review finished.
    ReviewProduced,
    /// Verification finished.
    VerificationProduced,
    /// Implementation was approved.
    ImplementationApproved,
    /// Implementation was rejected.
    ImplementationRejected,
    /// Implementation changes were requested.
    ImplementationChangesRequested,
    /// Implementation is retried against the approved plan.
    RetryImplementation,
    /// The approved implementation is finalized.
    Finalize,
    /// A stage failed.
    Fail,
    /// The task is reset to pending.
    Restart,
}

impl WorkflowEvent {
    /// Returns the snake-case event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PlanProduced => "plan_produced",
            Self::PlanApproved => "plan_approved",
            Self::PlanRejected => "plan_rejected",
            Self::PlanChangesRequested => "plan_changes_requested",
            Self::BeginImplementation => "begin_implementation",
            Self::ImplementationProduced => "implementation_produced",
            Self::ReviewProduced => "review_produced",
            Self::VerificationProduced => "verification_produced",
            Self::ImplementationApproved => "implementation_approved",
            Self::ImplementationRejected => "implementation_rejected",
            Self::ImplementationChangesRequested => "implementation_changes_requested",
            Self::RetryImplementation => "retry_implementation",
            Self::Finalize => "finalize",
            Self::Fail => "fail",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
