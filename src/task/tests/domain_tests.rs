//! Unit tests for workflow state transitions and task value types.

use crate::task::domain::{
    GateRecord, NewTask, Task, TaskDomainError, TaskFilter, TaskId, TaskStatus, TaskUpdate,
    WorkflowEvent, WorkflowState,
};
use chrono::{TimeZone, Utc};
use eyre::ensure;
use rstest::rstest;

#[rstest]
#[case(WorkflowState::Pending, WorkflowEvent::Start, WorkflowState::Planning)]
#[case(
    WorkflowState::Planning,
    WorkflowEvent::PlanProduced,
    WorkflowState::PlanAwaitingApproval
)]
#[case(
    WorkflowState::PlanAwaitingApproval,
    WorkflowEvent::PlanApproved,
    WorkflowState::PlanApproved
)]
#[case(
    WorkflowState::PlanAwaitingApproval,
    WorkflowEvent::PlanRejected,
    WorkflowState::PlanRejected
)]
#[case(
    WorkflowState::PlanAwaitingApproval,
    WorkflowEvent::PlanChangesRequested,
    WorkflowState::Planning
)]
#[case(
    WorkflowState::PlanApproved,
    WorkflowEvent::BeginImplementation,
    WorkflowState::Implementing
)]
#[case(
    WorkflowState::Implementing,
    WorkflowEvent::ImplementationProduced,
    WorkflowState::Reviewing
)]
#[case(
    WorkflowState::Reviewing,
    WorkflowEvent::ReviewProduced,
    WorkflowState::Verifying
)]
#[case(
    WorkflowState::Verifying,
    WorkflowEvent::VerificationProduced,
    WorkflowState::ImplementationAwaitingApproval
)]
#[case(
    WorkflowState::ImplementationAwaitingApproval,
    WorkflowEvent::ImplementationApproved,
    WorkflowState::ImplementationApproved
)]
#[case(
    WorkflowState::ImplementationAwaitingApproval,
    WorkflowEvent::ImplementationRejected,
    WorkflowState::ImplementationRejected
)]
#[case(
    WorkflowState::ImplementationAwaitingApproval,
    WorkflowEvent::ImplementationChangesRequested,
    WorkflowState::Implementing
)]
#[case(
    WorkflowState::ImplementationAwaitingApproval,
    WorkflowEvent::RetryImplementation,
    WorkflowState::Implementing
)]
#[case(
    WorkflowState::ImplementationApproved,
    WorkflowEvent::Finalize,
    WorkflowState::Completed
)]
#[case(WorkflowState::Reviewing, WorkflowEvent::Fail, WorkflowState::Failed)]
#[case(WorkflowState::Completed, WorkflowEvent::Restart, WorkflowState::Pending)]
#[case(WorkflowState::Failed, WorkflowEvent::Restart, WorkflowState::Pending)]
fn listed_transitions_are_accepted(
    #[case] from: WorkflowState,
    #[case] event: WorkflowEvent,
    #[case] expected: WorkflowState,
) {
    assert_eq!(from.apply(event), Ok(expected));
}

#[rstest]
#[case(WorkflowState::Pending, WorkflowEvent::PlanApproved)]
#[case(WorkflowState::Planning, WorkflowEvent::BeginImplementation)]
#[case(WorkflowState::PlanApproved, WorkflowEvent::Finalize)]
#[case(WorkflowState::Implementing, WorkflowEvent::ImplementationApproved)]
#[case(WorkflowState::Completed, WorkflowEvent::Fail)]
#[case(WorkflowState::PlanRejected, WorkflowEvent::Start)]
#[case(WorkflowState::ImplementationApproved, WorkflowEvent::RetryImplementation)]
fn unlisted_transitions_are_rejected(#[case] from: WorkflowState, #[case] event: WorkflowEvent) {
    assert_eq!(
        from.apply(event),
        Err(TaskDomainError::InvalidTransition { from, event })
    );
}

#[rstest]
fn terminal_states_accept_only_restart() -> eyre::Result<()> {
    let events = [
        WorkflowEvent::Start,
        WorkflowEvent::PlanProduced,
        WorkflowEvent::PlanApproved,
        WorkflowEvent::BeginImplementation,
        WorkflowEvent::Finalize,
        WorkflowEvent::Fail,
    ];
    for state in WorkflowState::ALL.into_iter().filter(|s| s.is_terminal()) {
        for event in events {
            ensure!(state.apply(event).is_err(), "{state} accepted {event}");
        }
        ensure!(state.apply(WorkflowEvent::Restart) == Ok(WorkflowState::Pending));
    }
    Ok(())
}

#[rstest]
#[case(WorkflowState::Pending, TaskStatus::Pending)]
#[case(WorkflowState::Planning, TaskStatus::InProgress)]
#[case(WorkflowState::ImplementationApproved, TaskStatus::InProgress)]
#[case(WorkflowState::Completed, TaskStatus::Completed)]
#[case(WorkflowState::Failed, TaskStatus::Failed)]
#[case(WorkflowState::PlanRejected, TaskStatus::Cancelled)]
#[case(WorkflowState::ImplementationRejected, TaskStatus::Cancelled)]
fn status_is_derived_from_workflow_state(
    #[case] state: WorkflowState,
    #[case] expected: TaskStatus,
) {
    assert_eq!(state.status(), expected);
}

#[rstest]
fn in_flight_set_matches_in_progress_status() {
    let derived: Vec<WorkflowState> = WorkflowState::ALL
        .into_iter()
        .filter(|state| state.is_in_flight())
        .collect();
    assert_eq!(derived, WorkflowState::IN_FLIGHT.to_vec());
}

#[rstest]
#[case("implementation_awaiting_approval", WorkflowState::ImplementationAwaitingApproval)]
#[case("  PLANNING ", WorkflowState::Planning)]
fn workflow_state_parses_storage_strings(#[case] raw: &str, #[case] expected: WorkflowState) {
    assert_eq!(WorkflowState::try_from(raw), Ok(expected));
}

#[rstest]
fn workflow_state_round_trips_through_storage_form() -> eyre::Result<()> {
    for state in WorkflowState::ALL {
        ensure!(WorkflowState::try_from(state.as_str()) == Ok(state));
    }
    ensure!(WorkflowState::try_from("half_done").is_err());
    Ok(())
}

#[rstest]
#[case("")]
#[case("   \n")]
fn blank_requests_are_rejected(#[case] request: &str) {
    assert_eq!(NewTask::new(request), Err(TaskDomainError::EmptyRequest));
}

#[rstest]
fn gate_columns_never_decode_to_both_outcomes() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single();
    let gate = GateRecord::from_columns(at, Some("alice".to_owned()), Some("nope".to_owned()));
    assert!(matches!(gate, GateRecord::Approved { ref by, .. } if by == "alice"));
    assert_eq!(gate.rejection_reason(), None);

    let rejected = GateRecord::from_columns(None, None, Some("too risky".to_owned()));
    assert_eq!(rejected.rejection_reason(), Some("too risky"));
    assert_eq!(
        GateRecord::from_columns(None, Some("bob".to_owned()), None),
        GateRecord::Undecided
    );
}

#[rstest]
fn apply_update_touches_only_supplied_fields() -> eyre::Result<()> {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
    let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single().unwrap_or_default();
    let mut task = Task::created(TaskId::new(7), NewTask::new("build it")?, created);

    task.apply_update(
        &TaskUpdate {
            plan: Some("step one".to_owned()),
            error_details: Some(Some("boom".to_owned())),
            increment_retry: true,
            ..TaskUpdate::transition(WorkflowState::Planning)
        },
        later,
    );

    ensure!(task.plan() == Some("step one"));
    ensure!(task.status() == TaskStatus::InProgress);
    ensure!(task.error_details() == Some("boom"));
    ensure!(task.retry_count() == 1);
    ensure!(task.created_at() == created && task.updated_at() == later);

    task.apply_update(
        &TaskUpdate {
            error_details: Some(None),
            ..TaskUpdate::default()
        },
        later,
    );
    ensure!(task.error_details().is_none());
    ensure!(task.plan() == Some("step one"));

    task.apply_update(
        &TaskUpdate {
            clear_outputs: true,
            ..TaskUpdate::default()
        },
        later,
    );
    ensure!(task.plan().is_none());
    ensure!(task.retry_count() == 1);
    Ok(())
}

#[rstest]
fn filter_matches_status_and_state() -> eyre::Result<()> {
    let task = Task::created(TaskId::new(1), NewTask::new("x")?, Utc::now());
    ensure!(TaskFilter::all().matches(&task));
    ensure!(TaskFilter::all().with_status(TaskStatus::Pending).matches(&task));
    ensure!(
        !TaskFilter::all()
            .with_workflow_state(WorkflowState::Planning)
            .matches(&task)
    );
    Ok(())
}
