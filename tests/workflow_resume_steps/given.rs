//! Given steps for workflow resume BDD scenarios.

use eyre::WrapErr;
use rstest_bdd_macros::given;
use stagehand::task::domain::{TaskUpdate, WorkflowState};
use stagehand::task::ports::TaskStore;
use stagehand::workflow::domain::PROGRAMMATIC_APPROVER;

use super::world::{ResumeWorld, run_async};
use crate::test_helpers::ScriptedModel;

#[given("a task store on disk")]
fn task_store_on_disk(world: &mut ResumeWorld) -> Result<(), eyre::Report> {
    world.open_store()
}

#[given(r#"a task "{request}" planned up to the plan gate"#)]
fn task_planned(world: &mut ResumeWorld, request: String) -> Result<(), eyre::Report> {
    let lead = ScriptedModel::texts(["1. Add route\n2. Add test"]);
    let engine = world.engine(&lead, &ScriptedModel::texts([]))?;
    let id = run_async(engine.submit(&request)).wrap_err("submit scenario task")?;
    run_async(engine.start(id)).wrap_err("plan scenario task")?;
    world.task_id = Some(id);
    Ok(())
}

#[given(r#"a task "{request}" implemented up to the implementation gate"#)]
fn task_implemented(world: &mut ResumeWorld, request: String) -> Result<(), eyre::Report> {
    let lead = ScriptedModel::texts(["1. Add route", "APPROVE"]);
    let member = ScriptedModel::texts(["Route added"]);
    let engine = world.engine(&lead, &member)?;
    let id = run_async(engine.submit(&request)).wrap_err("submit scenario task")?;
    run_async(engine.start(id)).wrap_err("plan scenario task")?;
    run_async(engine.continue_after_plan_approval(id, PROGRAMMATIC_APPROVER))
        .wrap_err("implement scenario task")?;
    world.task_id = Some(id);
    Ok(())
}

#[given(r#"the task was interrupted while "{state}""#)]
fn task_interrupted(world: &mut ResumeWorld, state: String) -> Result<(), eyre::Report> {
    let target = WorkflowState::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("invalid workflow state in scenario: {err}"))?;
    let id = world.task_id()?;
    let lead = ScriptedModel::texts([]);
    let engine = world.engine(&lead, &lead)?;
    let updated = run_async(engine.store().update(id, TaskUpdate::transition(target)))
        .wrap_err("force scenario task state")?;
    if !updated {
        return Err(eyre::eyre!("scenario task {id} was not updated"));
    }
    Ok(())
}
