//! Workflow engine.
//!
//! All drivers share one step function that performs exactly one
//! transition: it computes a stage output, persists it together with the
//! next state as one checkpoint, and only then reports how to continue.
//! A crash between two calls therefore loses at most the stage in flight,
//! which [`WorkflowEngine::resume`] re-runs.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::{debug, error, info, warn};

use super::stages::Stages;
use super::{EngineError, EngineResult, StageError};
use crate::task::domain::{NewCheckpoint, NewTask, Task, TaskId, WorkflowEvent, WorkflowState};
use crate::task::ports::{TaskStore, TaskStoreError};
use crate::workflow::domain::{
    CheckpointData, Decision, Gate, ImplementationReport, StageSnapshot, WorkflowOutcome,
};
use crate::workflow::ports::ApprovalPrompt;

/// What the driver does after one transition.
enum Step {
    /// Advance again.
    Continue,
    /// Waiting at a gate.
    Suspended(Gate),
    /// Nothing left to do.
    Finished(WorkflowOutcome),
}

/// Drives tasks through planning, implementation, review and verification
/// with two approval gates.
pub struct WorkflowEngine<S, C = DefaultClock>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    stages: Stages,
    clock: Arc<C>,
}

impl<S, C> WorkflowEngine<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    /// Creates an engine over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, stages: Stages, clock: Arc<C>) -> Self {
        Self {
            store,
            stages,
            clock,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a pending task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Transition`] for a blank request and
    /// [`EngineError::Store`] when the task cannot be stored.
    pub async fn submit(&self, request: &str) -> EngineResult<TaskId> {
        let id = self.store.create(NewTask::new(request)?).await?;
        info!(task_id = %id, "task submitted");
        Ok(id)
    }

    /// Runs a task until it reaches a gate or a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] on storage failures or a missing task. Stage
    /// failures are reported as [`WorkflowOutcome::Failed`].
    pub async fn start(&self, id: TaskId) -> EngineResult<WorkflowOutcome> {
        self.drive(id, None).await
    }

    /// Runs a task to a terminal state, asking `prompt` at every gate.
    ///
    /// # Errors
    ///
    /// As [`Self::start`], plus [`EngineError::Prompt`] when the prompt
    /// fails.
    pub async fn run_interactive(
        &self,
        id: TaskId,
        prompt: &dyn ApprovalPrompt,
    ) -> EngineResult<WorkflowOutcome> {
        self.drive(id, Some(prompt)).await
    }

    /// Approves the pending plan on behalf of `approved_by` and continues.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAwaiting`] unless the plan awaits approval.
    pub async fn continue_after_plan_approval(
        &self,
        id: TaskId,
        approved_by: &str,
    ) -> EngineResult<WorkflowOutcome> {
        self.decide(id, Gate::Plan, Decision::approve(approved_by))
            .await
    }

    /// Applies a decision at the plan gate and continues.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAwaiting`] unless the plan awaits approval
    /// and [`EngineError::UnsupportedDecision`] for [`Decision::Retry`].
    pub async fn decide_plan(
        &self,
        id: TaskId,
        decision: Decision,
    ) -> EngineResult<WorkflowOutcome> {
        self.decide(id, Gate::Plan, decision).await
    }

    /// Applies a decision at the implementation gate and continues.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAwaiting`] unless the implementation awaits
    /// approval.
    pub async fn decide_implementation(
        &self,
        id: TaskId,
        decision: Decision,
    ) -> EngineResult<WorkflowOutcome> {
        self.decide(id, Gate::Implementation, decision).await
    }

    /// Re-runs implementation against the approved plan and increments the
    /// retry counter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAwaiting`] unless the implementation awaits
    /// approval.
    pub async fn retry_implementation(
        &self,
        id: TaskId,
        feedback: Option<String>,
    ) -> EngineResult<WorkflowOutcome> {
        self.decide(id, Gate::Implementation, Decision::Retry { feedback })
            .await
    }

    /// Continues an interrupted task from its stored state.
    ///
    /// Gates are re-emitted from stored outputs without model calls, terminal
    /// tasks report their result, and an interrupted stage is re-run. A
    /// pending task, an unreadable record or an unreadable checkpoint
    /// restarts the task from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown task and
    /// [`EngineError::Store`] on storage failures.
    pub async fn resume(&self, id: TaskId) -> EngineResult<WorkflowOutcome> {
        let task = match self.store.get(id).await {
            Ok(Some(task)) => task,
            Ok(None) => return Err(EngineError::NotFound(id)),
            Err(TaskStoreError::CorruptRecord { reason, .. }) => {
                warn!(task_id = %id, %reason, "task record unreadable; restarting");
                self.reset(id, None).await?;
                return self.drive(id, None).await;
            }
            Err(err) => return Err(err.into()),
        };
        let state = task.workflow_state();
        info!(task_id = %id, %state, "resuming task");
        if state == WorkflowState::Pending {
            warn!(task_id = %id, "task never started; restarting");
            self.reset(id, Some(state)).await?;
        } else if state.is_in_flight() {
            match self.store.latest_checkpoint(id).await? {
                None => {
                    warn!(task_id = %id, %state, "no checkpoint found; restarting");
                    self.reset(id, Some(state)).await?;
                }
                Some(stored) => {
                    if let Err(err) = CheckpointData::decode(&stored.data) {
                        warn!(
                            task_id = %id,
                            checkpoint = %stored.name,
                            error = %err,
                            "checkpoint unreadable; restarting"
                        );
                        self.reset(id, Some(state)).await?;
                    }
                }
            }
        }
        self.drive(id, None).await
    }

    /// Resets a task to pending and runs it from the beginning.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown task and
    /// [`EngineError::Store`] on storage failures.
    pub async fn restart(&self, id: TaskId) -> EngineResult<WorkflowOutcome> {
        let from = match self.store.get(id).await {
            Ok(Some(task)) => Some(task.workflow_state()),
            Ok(None) => return Err(EngineError::NotFound(id)),
            Err(TaskStoreError::CorruptRecord { .. }) => None,
            Err(err) => return Err(err.into()),
        };
        info!(task_id = %id, from = ?from, "restarting task");
        self.reset(id, from).await?;
        self.drive(id, None).await
    }

    /// Tasks that [`Self::resume`] can pick up, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on storage failures.
    pub async fn resumable(&self) -> EngineResult<Vec<Task>> {
        Ok(self.store.resumable().await?)
    }

    async fn decide(
        &self,
        id: TaskId,
        gate: Gate,
        decision: Decision,
    ) -> EngineResult<WorkflowOutcome> {
        let task = self.load(id).await?;
        self.record_decision(&task, gate, decision).await?;
        self.drive(id, None).await
    }

    async fn drive(
        &self,
        id: TaskId,
        prompt: Option<&dyn ApprovalPrompt>,
    ) -> EngineResult<WorkflowOutcome> {
        loop {
            let task = self.load(id).await?;
            match self.advance(&task).await? {
                Step::Continue => {}
                Step::Finished(outcome) => return Ok(outcome),
                Step::Suspended(gate) => {
                    let snapshot = StageSnapshot::from_task(&task);
                    let Some(approver) = prompt else {
                        info!(task_id = %id, %gate, "awaiting approval");
                        return Ok(WorkflowOutcome::AwaitingApproval {
                            task_id: id,
                            gate,
                            snapshot,
                        });
                    };
                    let decision = approver.decide(id, gate, &snapshot)?;
                    self.record_decision(&task, gate, decision).await?;
                }
            }
        }
    }

    async fn advance(&self, task: &Task) -> EngineResult<Step> {
        let state = task.workflow_state();
        debug!(task_id = %task.id(), %state, "advancing");
        match state {
            WorkflowState::Pending => {
                let start = CheckpointData::WorkflowStart {
                    request: task.request().to_owned(),
                };
                self.checkpoint(task, &start, WorkflowEvent::Start).await?;
                Ok(Step::Continue)
            }
            WorkflowState::Planning => self.run_planning(task).await,
            WorkflowState::PlanAwaitingApproval => Ok(Step::Suspended(Gate::Plan)),
            WorkflowState::PlanApproved => {
                let Some(plan) = task.plan() else {
                    return self.restart_inconsistent(task, "approved plan missing").await;
                };
                let begin = CheckpointData::StartImplementation {
                    plan: plan.to_owned(),
                };
                self.checkpoint(task, &begin, WorkflowEvent::BeginImplementation)
                    .await?;
                Ok(Step::Continue)
            }
            WorkflowState::Implementing => self.run_implementation(task).await,
            WorkflowState::Reviewing => self.run_review(task).await,
            WorkflowState::Verifying => self.run_verification(task).await,
            WorkflowState::ImplementationAwaitingApproval => {
                Ok(Step::Suspended(Gate::Implementation))
            }
            WorkflowState::ImplementationApproved => {
                self.checkpoint(task, &CheckpointData::Completed, WorkflowEvent::Finalize)
                    .await?;
                let done = self.load(task.id()).await?;
                info!(task_id = %task.id(), "workflow completed");
                Ok(Step::Finished(WorkflowOutcome::Completed {
                    task_id: task.id(),
                    snapshot: StageSnapshot::from_task(&done),
                }))
            }
            WorkflowState::Completed => Ok(Step::Finished(WorkflowOutcome::AlreadyCompleted {
                task_id: task.id(),
                snapshot: StageSnapshot::from_task(task),
            })),
            WorkflowState::Failed => Ok(Step::Finished(WorkflowOutcome::Failed {
                task_id: task.id(),
                error: task.error_details().unwrap_or("unknown error").to_owned(),
                snapshot: StageSnapshot::from_task(task),
            })),
            WorkflowState::PlanRejected => Ok(Step::Finished(aborted(task, Gate::Plan))),
            WorkflowState::ImplementationRejected => {
                Ok(Step::Finished(aborted(task, Gate::Implementation)))
            }
        }
    }

    async fn run_planning(&self, task: &Task) -> EngineResult<Step> {
        let feedback = match self.latest(task.id()).await? {
            Some(CheckpointData::PlanChangesRequested { feedback }) => Some(feedback),
            _ => None,
        };
        let revision = task.plan().zip(feedback.as_deref());
        match self.stages.plan(task.request(), revision).await {
            Ok(plan) => {
                self.checkpoint(
                    task,
                    &CheckpointData::AfterPlanning { plan },
                    WorkflowEvent::PlanProduced,
                )
                .await?;
                Ok(Step::Continue)
            }
            Err(err) => self.fail(task, "planning", &err).await,
        }
    }

    async fn run_implementation(&self, task: &Task) -> EngineResult<Step> {
        let Some(plan) = task.plan() else {
            return self.restart_inconsistent(task, "plan missing").await;
        };
        let feedback = match self.latest(task.id()).await? {
            Some(CheckpointData::ImplementationChangesRequested { feedback }) => Some(feedback),
            Some(CheckpointData::RetryImplementation { feedback, .. }) => feedback,
            _ => None,
        };
        match self.stages.implement(plan, feedback.as_deref()).await {
            Ok(report) => {
                self.checkpoint(
                    task,
                    &CheckpointData::AfterImplementation { report },
                    WorkflowEvent::ImplementationProduced,
                )
                .await?;
                Ok(Step::Continue)
            }
            Err(err) => self.fail(task, "implementation", &err).await,
        }
    }

    async fn run_review(&self, task: &Task) -> EngineResult<Step> {
        let report = task
            .implementation_result()
            .and_then(|raw| serde_json::from_str::<ImplementationReport>(raw).ok());
        let (Some(plan), Some(report)) = (task.plan(), report) else {
            return self
                .restart_inconsistent(task, "plan or implementation report unreadable")
                .await;
        };
        match self.stages.review(plan, &report).await {
            Ok(review) => {
                self.checkpoint(
                    task,
                    &CheckpointData::AfterReview { review },
                    WorkflowEvent::ReviewProduced,
                )
                .await?;
                Ok(Step::Continue)
            }
            Err(err) => self.fail(task, "review", &err).await,
        }
    }

    async fn run_verification(&self, task: &Task) -> EngineResult<Step> {
        match self.stages.verify().await {
            Ok(report) => {
                self.checkpoint(
                    task,
                    &CheckpointData::AfterVerification { report },
                    WorkflowEvent::VerificationProduced,
                )
                .await?;
                Ok(Step::Continue)
            }
            Err(err) => self.fail(task, "verification", &err).await,
        }
    }

    async fn record_decision(
        &self,
        task: &Task,
        gate: Gate,
        decision: Decision,
    ) -> EngineResult<()> {
        let awaiting = match gate {
            Gate::Plan => WorkflowState::PlanAwaitingApproval,
            Gate::Implementation => WorkflowState::ImplementationAwaitingApproval,
        };
        if task.workflow_state() != awaiting {
            return Err(EngineError::NotAwaiting {
                task_id: task.id(),
                gate,
                state: task.workflow_state(),
            });
        }
        let at = self.clock.utc();
        let (data, event) = match (gate, decision) {
            (Gate::Plan, Decision::Approve { by }) => (
                CheckpointData::PlanApproved { by, at },
                WorkflowEvent::PlanApproved,
            ),
            (Gate::Plan, Decision::Reject { reason }) => (
                CheckpointData::PlanRejected { reason },
                WorkflowEvent::PlanRejected,
            ),
            (Gate::Plan, Decision::RequestChanges { feedback }) => (
                CheckpointData::PlanChangesRequested { feedback },
                WorkflowEvent::PlanChangesRequested,
            ),
            (Gate::Plan, retry @ Decision::Retry { .. }) => {
                return Err(EngineError::UnsupportedDecision {
                    gate,
                    decision: retry.kind(),
                });
            }
            (Gate::Implementation, Decision::Approve { by }) => (
                CheckpointData::ImplementationApproved { by, at },
                WorkflowEvent::ImplementationApproved,
            ),
            (Gate::Implementation, Decision::Reject { reason }) => (
                CheckpointData::ImplementationRejected { reason },
                WorkflowEvent::ImplementationRejected,
            ),
            (Gate::Implementation, Decision::RequestChanges { feedback }) => (
                CheckpointData::ImplementationChangesRequested { feedback },
                WorkflowEvent::ImplementationChangesRequested,
            ),
            (Gate::Implementation, Decision::Retry { feedback }) => (
                CheckpointData::RetryImplementation {
                    feedback,
                    attempt: task.retry_count().saturating_add(1),
                },
                WorkflowEvent::RetryImplementation,
            ),
        };
        info!(task_id = %task.id(), %gate, checkpoint = data.name(), "decision recorded");
        self.checkpoint(task, &data, event).await?;
        Ok(())
    }

    async fn fail(&self, task: &Task, stage: &str, err: &StageError) -> EngineResult<Step> {
        error!(task_id = %task.id(), stage, error = %err, "stage failed");
        let failed = CheckpointData::Failed {
            stage: stage.to_owned(),
            error: err.to_string(),
        };
        self.checkpoint(task, &failed, WorkflowEvent::Fail).await?;
        let current = self.load(task.id()).await?;
        Ok(Step::Finished(WorkflowOutcome::Failed {
            task_id: task.id(),
            error: err.to_string(),
            snapshot: StageSnapshot::from_task(&current),
        }))
    }

    async fn restart_inconsistent(&self, task: &Task, reason: &str) -> EngineResult<Step> {
        warn!(task_id = %task.id(), state = %task.workflow_state(), reason, "inconsistent task; restarting");
        self.reset(task.id(), Some(task.workflow_state())).await?;
        Ok(Step::Continue)
    }

    async fn reset(&self, id: TaskId, from: Option<WorkflowState>) -> EngineResult<()> {
        let restarted = CheckpointData::Restarted { from };
        let record = restarted.record(WorkflowState::Pending)?;
        self.save(id, &restarted, record).await
    }

    async fn checkpoint(
        &self,
        task: &Task,
        data: &CheckpointData,
        event: WorkflowEvent,
    ) -> EngineResult<WorkflowState> {
        let next = task.workflow_state().apply(event)?;
        let record = data.record(next)?;
        self.save(task.id(), data, record).await?;
        Ok(next)
    }

    async fn save(
        &self,
        id: TaskId,
        data: &CheckpointData,
        record: NewCheckpoint,
    ) -> EngineResult<()> {
        let state = record.update.workflow_state;
        self.store.save_checkpoint(id, record).await?;
        debug!(task_id = %id, checkpoint = data.name(), state = ?state, "checkpoint saved");
        Ok(())
    }

    async fn latest(&self, id: TaskId) -> EngineResult<Option<CheckpointData>> {
        let stored = self.store.latest_checkpoint(id).await?;
        Ok(stored.and_then(|checkpoint| CheckpointData::decode(&checkpoint.data).ok()))
    }

    async fn load(&self, id: TaskId) -> EngineResult<Task> {
        self.store.get(id).await?.ok_or(EngineError::NotFound(id))
    }
}

fn aborted(task: &Task, gate: Gate) -> WorkflowOutcome {
    let record = match gate {
        Gate::Plan => task.plan_gate(),
        Gate::Implementation => task.implementation_gate(),
    };
    WorkflowOutcome::Aborted {
        task_id: task.id(),
        gate,
        reason: record.rejection_reason().unwrap_or("rejected").to_owned(),
        snapshot: StageSnapshot::from_task(task),
    }
}
