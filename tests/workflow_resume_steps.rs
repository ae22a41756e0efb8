//! Behaviour tests for resuming interrupted workflow tasks.

mod test_helpers;

#[path = "workflow_resume_steps/mod.rs"]
mod workflow_resume_steps_defs;

use rstest_bdd_macros::scenario;
use workflow_resume_steps_defs::world::{ResumeWorld, world};

#[scenario(
    path = "tests/features/workflow_resume.feature",
    name = "A task waiting for plan approval resumes without replanning"
)]
#[tokio::test(flavor = "multi_thread")]
async fn resume_at_plan_gate(world: ResumeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/workflow_resume.feature",
    name = "A task interrupted during review re-runs only the review"
)]
#[tokio::test(flavor = "multi_thread")]
async fn resume_interrupted_review(world: ResumeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/workflow_resume.feature",
    name = "An approved implementation completes after a restart"
)]
#[tokio::test(flavor = "multi_thread")]
async fn approve_after_restart(world: ResumeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/workflow_resume.feature",
    name = "A rejected plan is not resumed"
)]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_plan_stays_rejected(world: ResumeWorld) {
    let _ = world;
}
