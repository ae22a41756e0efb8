//! Then steps for workflow resume BDD scenarios.

use rstest_bdd_macros::then;
use stagehand::task::domain::WorkflowState;
use stagehand::task::ports::TaskStore;
use stagehand::workflow::domain::WorkflowOutcome;

use super::world::{ResumeWorld, run_async};
use crate::test_helpers::ScriptedModel;

fn outcome(world: &ResumeWorld) -> Result<&WorkflowOutcome, eyre::Report> {
    world
        .last_outcome
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing workflow outcome"))
}

fn restart_calls(world: &ResumeWorld) -> Result<(usize, usize), eyre::Report> {
    let models = world
        .restart
        .as_ref()
        .ok_or_else(|| eyre::eyre!("scenario never restarted"))?;
    Ok((models.lead.calls(), models.member.calls()))
}

#[then(r#"the task is awaiting approval at the "{gate}" gate"#)]
fn awaiting_at_gate(world: &ResumeWorld, gate: String) -> Result<(), eyre::Report> {
    let outcome = outcome(world)?;
    let WorkflowOutcome::AwaitingApproval { gate: actual, .. } = outcome else {
        return Err(eyre::eyre!("expected a suspended outcome, got {outcome:?}"));
    };
    if actual.as_str() != gate {
        return Err(eyre::eyre!("expected the {gate} gate, found {actual}"));
    }
    Ok(())
}

#[then("no model was called after the restart")]
fn no_model_calls(world: &ResumeWorld) -> Result<(), eyre::Report> {
    let calls = restart_calls(world)?;
    if calls != (0, 0) {
        return Err(eyre::eyre!("expected no model calls, got {calls:?}"));
    }
    Ok(())
}

#[then("the lead model was called {count:usize} time after the restart")]
fn lead_calls(world: &ResumeWorld, count: usize) -> Result<(), eyre::Report> {
    let (lead, _) = restart_calls(world)?;
    if lead != count {
        return Err(eyre::eyre!("expected {count} lead calls, got {lead}"));
    }
    Ok(())
}

#[then("the member model was called {count:usize} times after the restart")]
fn member_calls(world: &ResumeWorld, count: usize) -> Result<(), eyre::Report> {
    let (_, member) = restart_calls(world)?;
    if member != count {
        return Err(eyre::eyre!("expected {count} member calls, got {member}"));
    }
    Ok(())
}

#[then("the verification commands ran {count:usize} times in total")]
fn verification_runs(world: &ResumeWorld, count: usize) -> Result<(), eyre::Report> {
    let runs = world.executions();
    if runs != count {
        return Err(eyre::eyre!("expected {count} verification runs, got {runs}"));
    }
    Ok(())
}

#[then(r#"the task is in workflow state "{state}""#)]
fn task_in_state(world: &ResumeWorld, state: String) -> Result<(), eyre::Report> {
    let expected = WorkflowState::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("invalid workflow state in scenario: {err}"))?;
    let idle = ScriptedModel::texts([]);
    let engine = world.engine(&idle, &idle)?;
    let task = run_async(engine.store().get(world.task_id()?))?
        .ok_or_else(|| eyre::eyre!("scenario task missing from store"))?;
    if task.workflow_state() != expected {
        return Err(eyre::eyre!(
            "expected state {}, found {}",
            expected.as_str(),
            task.workflow_state().as_str()
        ));
    }
    Ok(())
}

#[then(r#"the outcome is aborted with reason "{reason}""#)]
fn aborted_with_reason(world: &ResumeWorld, reason: String) -> Result<(), eyre::Report> {
    let outcome = outcome(world)?;
    let WorkflowOutcome::Aborted { reason: actual, .. } = outcome else {
        return Err(eyre::eyre!("expected an aborted outcome, got {outcome:?}"));
    };
    if *actual != reason {
        return Err(eyre::eyre!("expected reason {reason:?}, found {actual:?}"));
    }
    Ok(())
}
