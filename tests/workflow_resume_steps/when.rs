//! When steps for workflow resume BDD scenarios.

use eyre::WrapErr;
use rstest_bdd_macros::when;
use stagehand::workflow::domain::Decision;

use super::world::{ResumeWorld, run_async};

#[when("the process restarts and resumes the task")]
fn restart_and_resume(world: &mut ResumeWorld) -> Result<(), eyre::Report> {
    let id = world.task_id()?;
    let engine = world.restarted_engine()?;
    let outcome = run_async(engine.resume(id)).wrap_err("resume scenario task")?;
    world.last_outcome = Some(outcome);
    Ok(())
}

#[when(r#"the process restarts and "{approver}" approves the implementation"#)]
fn restart_and_approve(world: &mut ResumeWorld, approver: String) -> Result<(), eyre::Report> {
    let id = world.task_id()?;
    let engine = world.restarted_engine()?;
    let outcome = run_async(engine.decide_implementation(id, Decision::approve(approver)))
        .wrap_err("approve scenario implementation")?;
    world.last_outcome = Some(outcome);
    Ok(())
}

#[when(r#"the process restarts and the plan is rejected because "{reason}""#)]
fn restart_and_reject(world: &mut ResumeWorld, reason: String) -> Result<(), eyre::Report> {
    let id = world.task_id()?;
    let engine = world.restarted_engine()?;
    let outcome = run_async(engine.decide_plan(id, Decision::reject(reason)))
        .wrap_err("reject scenario plan")?;
    world.last_outcome = Some(outcome);
    Ok(())
}
