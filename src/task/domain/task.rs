//! Task aggregate root and the value types the store accepts and returns.

use super::{TaskDomainError, TaskId, TaskStatus, WorkflowState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decision recorded for one approval gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateRecord {
    /// No decision has been recorded.
    #[default]
    Undecided,
    /// The gate was approved.
    Approved {
        /// Approval timestamp.
        at: DateTime<Utc>,
        /// Identity of the approver.
        by: String,
    },
    /// The gate was rejected.
    Rejected {
        /// Reason supplied by the rejecting party.
        reason: String,
    },
}

impl GateRecord {
    /// Rebuilds a gate record from its three nullable storage columns.
    ///
    /// An approval timestamp wins over a rejection reason, so a row can never
    /// decode to both.
    #[must_use]
    pub fn from_columns(
        approved_at: Option<DateTime<Utc>>,
        approved_by: Option<String>,
        rejection_reason: Option<String>,
    ) -> Self {
        match (approved_at, rejection_reason) {
            (Some(at), _) => Self::Approved {
                at,
                by: approved_by.unwrap_or_default(),
            },
            (None, Some(reason)) => Self::Rejected { reason },
            (None, None) => Self::Undecided,
        }
    }

    /// Returns the approval timestamp, if approved.
    #[must_use]
    pub const fn approved_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Approved { at, .. } => Some(*at),
            Self::Undecided | Self::Rejected { .. } => None,
        }
    }

    /// Returns the approver identity, if approved.
    #[must_use]
    pub fn approved_by(&self) -> Option<&str> {
        match self {
            Self::Approved { by, .. } => Some(by.as_str()),
            Self::Undecided | Self::Rejected { .. } => None,
        }
    }

    /// Returns the rejection reason, if rejected.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            Self::Rejected { reason } => Some(reason.as_str()),
            Self::Undecided | Self::Approved { .. } => None,
        }
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    request: String,
    workflow_state: WorkflowState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    plan: Option<String>,
    implementation_result: Option<String>,
    review: Option<String>,
    verification_result: Option<String>,
    plan_gate: GateRecord,
    implementation_gate: GateRecord,
    error_details: Option<String>,
    retry_count: u32,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted free-text request.
    pub request: String,
    /// Persisted workflow state.
    pub workflow_state: WorkflowState,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Persisted plan text.
    pub plan: Option<String>,
    /// Persisted serialized implementation report.
    pub implementation_result: Option<String>,
    /// Persisted serialized review.
    pub review: Option<String>,
    /// Persisted serialized verification report.
    pub verification_result: Option<String>,
    /// Persisted plan gate decision.
    pub plan_gate: GateRecord,
    /// Persisted implementation gate decision.
    pub implementation_gate: GateRecord,
    /// Persisted failure description.
    pub error_details: Option<String>,
    /// Persisted retry counter.
    pub retry_count: u32,
}

impl Task {
    /// Builds a freshly created task as the in-memory store does.
    #[must_use]
    pub fn created(id: TaskId, new_task: NewTask, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            request: new_task.request,
            workflow_state: new_task.initial_state,
            created_at: timestamp,
            updated_at: timestamp,
            plan: None,
            implementation_result: None,
            review: None,
            verification_result: None,
            plan_gate: GateRecord::Undecided,
            implementation_gate: GateRecord::Undecided,
            error_details: None,
            retry_count: 0,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            request: data.request,
            workflow_state: data.workflow_state,
            created_at: data.created_at,
            updated_at: data.updated_at,
            plan: data.plan,
            implementation_result: data.implementation_result,
            review: data.review,
            verification_result: data.verification_result,
            plan_gate: data.plan_gate,
            implementation_gate: data.implementation_gate,
            error_details: data.error_details,
            retry_count: data.retry_count,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the free-text request.
    #[must_use]
    pub fn request(&self) -> &str {
        &self.request
    }

    /// Returns the coarse status derived from the workflow state.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.workflow_state.status()
    }

    /// Returns the workflow state.
    #[must_use]
    pub const fn workflow_state(&self) -> WorkflowState {
        self.workflow_state
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the plan text, if produced.
    #[must_use]
    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    /// Returns the serialized implementation report, if produced.
    #[must_use]
    pub fn implementation_result(&self) -> Option<&str> {
        self.implementation_result.as_deref()
    }

    /// Returns the serialized review, if produced.
    #[must_use]
    pub fn review(&self) -> Option<&str> {
        self.review.as_deref()
    }

    /// Returns the serialized verification report, if produced.
    #[must_use]
    pub fn verification_result(&self) -> Option<&str> {
        self.verification_result.as_deref()
    }

    /// Returns the plan gate decision.
    #[must_use]
    pub const fn plan_gate(&self) -> &GateRecord {
        &self.plan_gate
    }

    /// Returns the implementation gate decision.
    #[must_use]
    pub const fn implementation_gate(&self) -> &GateRecord {
        &self.implementation_gate
    }

    /// Returns the failure description, if any.
    #[must_use]
    pub fn error_details(&self) -> Option<&str> {
        self.error_details.as_deref()
    }

    /// Returns how many times implementation was explicitly retried.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Applies a partial update and stamps `updated_at`.
    pub fn apply_update(&mut self, update: &TaskUpdate, timestamp: DateTime<Utc>) {
        if let Some(state) = update.workflow_state {
            self.workflow_state = state;
        }
        if update.clear_outputs {
            self.plan = None;
            self.implementation_result = None;
            self.review = None;
            self.verification_result = None;
        }
        if let Some(plan) = &update.plan {
            self.plan = Some(plan.clone());
        }
        if let Some(result) = &update.implementation_result {
            self.implementation_result = Some(result.clone());
        }
        if let Some(review) = &update.review {
            self.review = Some(review.clone());
        }
        if let Some(result) = &update.verification_result {
            self.verification_result = Some(result.clone());
        }
        if let Some(gate) = &update.plan_gate {
            self.plan_gate = gate.clone();
        }
        if let Some(gate) = &update.implementation_gate {
            self.implementation_gate = gate.clone();
        }
        if let Some(details) = &update.error_details {
            self.error_details.clone_from(details);
        }
        if update.increment_retry {
            self.retry_count = self.retry_count.saturating_add(1);
        }
        self.updated_at = timestamp;
    }
}

/// Request to create a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    request: String,
    initial_state: WorkflowState,
}

impl NewTask {
    /// Creates a pending task request.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyRequest`] when the request is blank.
    pub fn new(request: impl Into<String>) -> Result<Self, TaskDomainError> {
        let text: String = request.into();
        if text.trim().is_empty() {
            return Err(TaskDomainError::EmptyRequest);
        }
        Ok(Self {
            request: text,
            initial_state: WorkflowState::Pending,
        })
    }

    /// Overrides the initial workflow state.
    #[must_use]
    pub const fn with_initial_state(mut self, state: WorkflowState) -> Self {
        self.initial_state = state;
        self
    }

    /// Returns the request text.
    #[must_use]
    pub fn request(&self) -> &str {
        &self.request
    }

    /// Returns the initial workflow state.
    #[must_use]
    pub const fn initial_state(&self) -> WorkflowState {
        self.initial_state
    }
}

/// Partial task update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    /// New workflow state; the status column follows it.
    pub workflow_state: Option<WorkflowState>,
    /// New plan text.
    pub plan: Option<String>,
    /// New serialized implementation report.
    pub implementation_result: Option<String>,
    /// New serialized review.
    pub review: Option<String>,
    /// New serialized verification report.
    pub verification_result: Option<String>,
    /// New plan gate decision.
    pub plan_gate: Option<GateRecord>,
    /// New implementation gate decision.
    pub implementation_gate: Option<GateRecord>,
    /// New failure description; `Some(None)` clears it.
    pub error_details: Option<Option<String>>,
    /// Increment the retry counter by one.
    pub increment_retry: bool,
    /// Discard the plan and every stage output before applying the fields
    /// above.
    pub clear_outputs: bool,
}

impl TaskUpdate {
    /// Update that only moves the workflow state.
    #[must_use]
    pub fn transition(state: WorkflowState) -> Self {
        Self {
            workflow_state: Some(state),
            ..Self::default()
        }
    }
}

/// Query parameters for [`crate::task::ports::TaskStore::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only tasks with this status.
    pub status: Option<TaskStatus>,
    /// Only tasks in this workflow state.
    pub workflow_state: Option<WorkflowState>,
    /// At most this many tasks.
    pub limit: Option<u32>,
}

impl TaskFilter {
    /// Filter matching every task.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            status: None,
            workflow_state: None,
            limit: None,
        }
    }

    /// Restricts to one status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to one workflow state.
    #[must_use]
    pub const fn with_workflow_state(mut self, state: WorkflowState) -> Self {
        self.workflow_state = Some(state);
        self
    }

    /// Caps the number of returned tasks.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` when `task` passes the status and state predicates.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|status| task.status() == status)
            && self
                .workflow_state
                .is_none_or(|state| task.workflow_state() == state)
    }
}

/// Task counts grouped by status and by workflow state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatistics {
    /// Total number of tasks.
    pub total: u64,
    /// Count per status; absent keys mean zero.
    pub by_status: BTreeMap<TaskStatus, u64>,
    /// Count per workflow state; absent keys mean zero.
    pub by_workflow_state: BTreeMap<WorkflowState, u64>,
}

impl StoreStatistics {
    /// Adds one task in `state` to the counters.
    pub fn record(&mut self, state: WorkflowState) {
        self.total = self.total.saturating_add(1);
        let by_status = self.by_status.entry(state.status()).or_default();
        *by_status = by_status.saturating_add(1);
        let by_state = self.by_workflow_state.entry(state).or_default();
        *by_state = by_state.saturating_add(1);
    }
}
