//! Typed checkpoint payloads.
//!
//! Each variant is one stage transition. The variant name doubles as the
//! checkpoint name and the payload is stored as JSON. Every variant also
//! knows which task columns it denormalizes, so the checkpoint row and the
//! task row are written from a single value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ImplementationReport, Review, VerificationReport};
use crate::task::domain::{GateRecord, NewCheckpoint, TaskUpdate, WorkflowState};

/// Payload of one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "checkpoint", rename_all = "snake_case")]
pub enum CheckpointData {
    /// The workflow began.
    WorkflowStart {
        /// Original request.
        request: String,
    },
    /// A plan was produced.
    AfterPlanning {
        /// Plan text.
        plan: String,
    },
    /// Plan changes were requested.
    PlanChangesRequested {
        /// Requested changes.
        feedback: String,
    },
    /// The plan was approved.
    PlanApproved {
        /// Approver.
        by: String,
        /// Approval time.
        at: DateTime<Utc>,
    },
    /// The plan was rejected.
    PlanRejected {
        /// Rejection reason.
        reason: String,
    },
    /// Implementation began.
    StartImplementation {
        /// Plan being implemented.
        plan: String,
    },
    /// Implementation finished.
    AfterImplementation {
        /// Implementation report.
        report: ImplementationReport,
    },
    /// Review finished.
    AfterReview {
        /// Review output.
        review: Review,
    },
    /// Verification finished.
    AfterVerification {
        /// Verification report.
        report: VerificationReport,
    },
    /// Implementation changes were requested.
    ImplementationChangesRequested {
        /// Requested changes.
        feedback: String,
    },
    /// Implementation is being retried.
    RetryImplementation {
        /// Optional guidance.
        feedback: Option<String>,
        /// Retry number, starting at one.
        attempt: u32,
    },
    /// The implementation was approved.
    ImplementationApproved {
        /// Approver.
        by: String,
        /// Approval time.
        at: DateTime<Utc>,
    },
    /// The implementation was rejected.
    ImplementationRejected {
        /// Rejection reason.
        reason: String,
    },
    /// The workflow completed.
    Completed,
    /// A stage failed.
    Failed {
        /// Stage that failed.
        stage: String,
        /// Error text.
        error: String,
    },
    /// The task was reset to pending and its earlier outputs discarded.
    Restarted {
        /// State the task was in, when it could be read.
        from: Option<WorkflowState>,
    },
}

impl CheckpointData {
    /// Returns the checkpoint name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::WorkflowStart { .. } => "workflow_start",
            Self::AfterPlanning { .. } => "after_planning",
            Self::PlanChangesRequested { .. } => "plan_changes_requested",
            Self::PlanApproved { .. } => "plan_approved",
            Self::PlanRejected { .. } => "plan_rejected",
            Self::StartImplementation { .. } => "start_implementation",
            Self::AfterImplementation { .. } => "after_implementation",
            Self::AfterReview { .. } => "after_review",
            Self::AfterVerification { .. } => "after_verification",
            Self::ImplementationChangesRequested { .. } => "implementation_changes_requested",
            Self::RetryImplementation { .. } => "retry_implementation",
            Self::ImplementationApproved { .. } => "implementation_approved",
            Self::ImplementationRejected { .. } => "implementation_rejected",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::Restarted { .. } => "restarted",
        }
    }

    /// Decodes a stored payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `raw` is not a valid payload.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Task columns this checkpoint denormalizes.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when a stage output cannot be serialized.
    pub fn task_update(&self) -> Result<TaskUpdate, serde_json::Error> {
        let mut update = TaskUpdate::default();
        match self {
            Self::WorkflowStart { .. } => update.error_details = Some(None),
            Self::AfterPlanning { plan } => {
                update.plan = Some(plan.clone());
                update.plan_gate = Some(GateRecord::Undecided);
            }
            Self::PlanApproved { by, at } => {
                update.plan_gate = Some(GateRecord::Approved {
                    at: *at,
                    by: by.clone(),
                });
            }
            Self::PlanRejected { reason } => {
                update.plan_gate = Some(GateRecord::Rejected {
                    reason: reason.clone(),
                });
            }
            Self::AfterImplementation { report } => {
                update.implementation_result = Some(serde_json::to_string(report)?);
                update.implementation_gate = Some(GateRecord::Undecided);
            }
            Self::AfterReview { review } => update.review = Some(serde_json::to_string(review)?),
            Self::AfterVerification { report } => {
                update.verification_result = Some(serde_json::to_string(report)?);
            }
            Self::RetryImplementation { .. } => update.increment_retry = true,
            Self::ImplementationApproved { by, at } => {
                update.implementation_gate = Some(GateRecord::Approved {
                    at: *at,
                    by: by.clone(),
                });
            }
            Self::ImplementationRejected { reason } => {
                update.implementation_gate = Some(GateRecord::Rejected {
                    reason: reason.clone(),
                });
            }
            Self::Failed { error, .. } => update.error_details = Some(Some(error.clone())),
            Self::Restarted { .. } => {
                update.clear_outputs = true;
                update.error_details = Some(None);
                update.plan_gate = Some(GateRecord::Undecided);
                update.implementation_gate = Some(GateRecord::Undecided);
            }
            Self::PlanChangesRequested { .. }
            | Self::StartImplementation { .. }
            | Self::ImplementationChangesRequested { .. }
            | Self::Completed => {}
        }
        Ok(update)
    }

    /// Builds the store record that appends this checkpoint and moves the
    /// task to `next`.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the payload cannot be serialized.
    pub fn record(&self, next: WorkflowState) -> Result<NewCheckpoint, serde_json::Error> {
        let mut update = self.task_update()?;
        update.workflow_state = Some(next);
        Ok(NewCheckpoint {
            name: self.name().to_owned(),
            data: serde_json::to_string(self)?,
            update,
        })
    }
}
