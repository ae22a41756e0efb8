//! What an engine call hands back to its caller.

use serde::{Deserialize, Serialize};

use super::{Gate, ImplementationReport, Review, VerificationReport};
use crate::task::domain::{Task, TaskId};

/// Stage outputs known at the time an outcome is produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    /// Plan text.
    pub plan: Option<String>,
    /// Implementation report.
    pub implementation: Option<ImplementationReport>,
    /// Review.
    pub review: Option<Review>,
    /// Verification report.
    pub verification: Option<VerificationReport>,
}

impl StageSnapshot {
    /// Rebuilds the snapshot from a task's stored stage outputs.
    ///
    /// Outputs that no longer decode are left empty.
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            plan: task.plan().map(str::to_owned),
            implementation: task
                .implementation_result()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            review: task.review().and_then(|raw| serde_json::from_str(raw).ok()),
            verification: task
                .verification_result()
                .and_then(|raw| serde_json::from_str(raw).ok()),
        }
    }
}

/// Coarse result category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Suspended at a gate.
    AwaitingUserApproval,
    /// Finished and approved.
    Completed,
    /// Rejected at a gate.
    Aborted,
    /// A stage failed.
    Failed,
    /// Nothing to do; the task had already completed.
    AlreadyCompleted,
}

/// Where the workflow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStage {
    /// A plan awaits approval.
    PlanCreated,
    /// An implementation awaits approval.
    ImplementationComplete,
    /// The implementation was approved.
    Approved,
    /// The plan was rejected.
    PlanRejected,
    /// The implementation was rejected.
    ImplementationRejected,
    /// A stage failed.
    Failed,
}

/// Result of driving a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    /// Suspended at `gate` until a decision arrives.
    #[serde(rename = "awaiting_user_approval")]
    AwaitingApproval {
        /// Task.
        task_id: TaskId,
        /// Pending gate.
        gate: Gate,
        /// Outputs so far.
        snapshot: StageSnapshot,
    },
    /// Approved and finalized.
    Completed {
        /// Task.
        task_id: TaskId,
        /// Final outputs.
        snapshot: StageSnapshot,
    },
    /// Rejected at `gate`.
    Aborted {
        /// Task.
        task_id: TaskId,
        /// Gate that rejected.
        gate: Gate,
        /// Rejection reason.
        reason: String,
        /// Outputs so far.
        snapshot: StageSnapshot,
    },
    /// A stage failed.
    Failed {
        /// Task.
        task_id: TaskId,
        /// Error details.
        error: String,
        /// Outputs so far.
        snapshot: StageSnapshot,
    },
    /// The task had already completed.
    AlreadyCompleted {
        /// Task.
        task_id: TaskId,
        /// Final outputs.
        snapshot: StageSnapshot,
    },
}

impl WorkflowOutcome {
    /// Task the outcome belongs to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::AwaitingApproval { task_id, .. }
            | Self::Completed { task_id, .. }
            | Self::Aborted { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::AlreadyCompleted { task_id, .. } => *task_id,
        }
    }

    /// Coarse status.
    #[must_use]
    pub const fn status(&self) -> OutcomeStatus {
        match self {
            Self::AwaitingApproval { .. } => OutcomeStatus::AwaitingUserApproval,
            Self::Completed { .. } => OutcomeStatus::Completed,
            Self::Aborted { .. } => OutcomeStatus::Aborted,
            Self::Failed { .. } => OutcomeStatus::Failed,
            Self::AlreadyCompleted { .. } => OutcomeStatus::AlreadyCompleted,
        }
    }

    /// Stage reached.
    #[must_use]
    pub const fn stage(&self) -> OutcomeStage {
        match self {
            Self::AwaitingApproval {
                gate: Gate::Plan, ..
            } => OutcomeStage::PlanCreated,
            Self::AwaitingApproval {
                gate: Gate::Implementation,
                ..
            } => OutcomeStage::ImplementationComplete,
            Self::Completed { .. } | Self::AlreadyCompleted { .. } => OutcomeStage::Approved,
            Self::Aborted {
                gate: Gate::Plan, ..
            } => OutcomeStage::PlanRejected,
            Self::Aborted {
                gate: Gate::Implementation,
                ..
            } => OutcomeStage::ImplementationRejected,
            Self::Failed { .. } => OutcomeStage::Failed,
        }
    }

    /// Stage outputs carried by the outcome.
    #[must_use]
    pub const fn snapshot(&self) -> &StageSnapshot {
        match self {
            Self::AwaitingApproval { snapshot, .. }
            | Self::Completed { snapshot, .. }
            | Self::Aborted { snapshot, .. }
            | Self::Failed { snapshot, .. }
            | Self::AlreadyCompleted { snapshot, .. } => snapshot,
        }
    }
}
