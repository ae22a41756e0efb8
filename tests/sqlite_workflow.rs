//! End-to-end workflow runs over a file-backed `SQLite` store.
//!
//! Each test drops its engine part way through a task and builds a fresh one
//! over the same database file, the way a restarted process would.

#![expect(
    clippy::expect_used,
    reason = "Test code uses expect for assertion clarity"
)]

mod test_helpers;

use std::sync::Arc;

use camino::Utf8PathBuf;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use stagehand::task::adapters::sqlite::SqliteTaskStore;
use stagehand::task::domain::{TaskStatus, WorkflowState};
use stagehand::task::ports::TaskStore;
use stagehand::workflow::domain::{
    Decision, Gate, OutcomeStage, OutcomeStatus, PROGRAMMATIC_APPROVER, WorkflowConfig,
    WorkflowOutcome,
};
use stagehand::workflow::services::{Stages, WorkflowEngine, WorkflowPool};
use tempfile::TempDir;
use test_helpers::{RecordingExecutor, ScriptedModel, sandbox, utf8_path};

const REQUEST: &str = "Add a /health endpoint";

struct Site {
    _dir: TempDir,
    database: Utf8PathBuf,
    workspace: Utf8PathBuf,
    executor: Arc<RecordingExecutor>,
}

impl Site {
    fn engine(
        &self,
        lead: &Arc<ScriptedModel>,
        member: &Arc<ScriptedModel>,
    ) -> Arc<WorkflowEngine<SqliteTaskStore>> {
        let store = SqliteTaskStore::open(&self.database).expect("database opens");
        let config = WorkflowConfig {
            verification_commands: vec![vec!["pytest".to_owned(), "-q".to_owned()]],
            ..WorkflowConfig::default()
        };
        let stages = Stages::new(
            lead.clone(),
            member.clone(),
            sandbox(Arc::clone(&self.executor), self.workspace.clone()),
            config,
        );
        Arc::new(WorkflowEngine::new(
            Arc::new(store),
            stages,
            Arc::new(DefaultClock),
        ))
    }
}

#[fixture]
fn site() -> Site {
    let dir = TempDir::new().expect("temporary directory");
    Site {
        database: utf8_path(&dir, "state/tasks.db"),
        workspace: utf8_path(&dir, "workspace"),
        _dir: dir,
        executor: Arc::new(RecordingExecutor::default()),
    }
}

#[rstest]
#[tokio::test]
async fn task_survives_restart_at_each_gate(site: Site) {
    let planner = ScriptedModel::texts(["1. Add route\n2. Add test"]);
    let idle = ScriptedModel::texts([]);
    let id = {
        let engine = site.engine(&planner, &idle);
        let id = engine.submit(REQUEST).await.expect("task created");
        let outcome = engine.start(id).await.expect("planning runs");
        assert_eq!(outcome.stage(), OutcomeStage::PlanCreated);
        id
    };

    let lead = ScriptedModel::texts(["Looks right. APPROVE"]);
    let member = ScriptedModel::texts(["Route added"]);
    let engine = site.engine(&lead, &member);
    let resumed = engine.resume(id).await.expect("resume at plan gate");
    assert_eq!(resumed.status(), OutcomeStatus::AwaitingUserApproval);
    assert_eq!(resumed.snapshot().plan.as_deref(), Some("1. Add route\n2. Add test"));
    assert_eq!(lead.calls() + member.calls(), 0);

    let outcome = engine
        .continue_after_plan_approval(id, PROGRAMMATIC_APPROVER)
        .await
        .expect("implementation runs");
    assert_eq!(outcome.stage(), OutcomeStage::ImplementationComplete);
    assert_eq!(site.executor.executed().len(), 1);
    drop(engine);

    let quiet = ScriptedModel::texts([]);
    let restarted = site.engine(&quiet, &quiet);
    let suspended = restarted.resume(id).await.expect("resume at implementation gate");
    let WorkflowOutcome::AwaitingApproval { gate, snapshot, .. } = &suspended else {
        panic!("expected a suspended outcome, got {suspended:?}");
    };
    assert_eq!(*gate, Gate::Implementation);
    assert!(snapshot.verification.as_ref().is_some_and(|report| report.passed));
    assert_eq!(quiet.calls(), 0);

    let finished = restarted
        .decide_implementation(id, Decision::approve("reviewer"))
        .await
        .expect("approval recorded");
    assert!(matches!(finished, WorkflowOutcome::Completed { .. }));

    let task = restarted
        .store()
        .get(id)
        .await
        .expect("store readable")
        .expect("task exists");
    assert_eq!(task.status(), TaskStatus::Completed);
    assert_eq!(task.workflow_state(), WorkflowState::Completed);
    let names: Vec<String> = restarted
        .store()
        .checkpoints(id)
        .await
        .expect("store readable")
        .into_iter()
        .map(|checkpoint| checkpoint.name)
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("workflow_start"));
    assert_eq!(names.last().map(String::as_str), Some("completed"));
    assert!(restarted.resumable().await.expect("store readable").is_empty());
}

#[rstest]
#[tokio::test]
async fn completed_task_is_not_rerun_after_restart(site: Site) {
    let lead = ScriptedModel::texts(["1. Add route", "APPROVE"]);
    let member = ScriptedModel::texts(["Route added"]);
    let id = {
        let engine = site.engine(&lead, &member);
        let id = engine.submit(REQUEST).await.expect("task created");
        engine.start(id).await.expect("planning runs");
        engine
            .continue_after_plan_approval(id, PROGRAMMATIC_APPROVER)
            .await
            .expect("implementation runs");
        engine
            .decide_implementation(id, Decision::approve(PROGRAMMATIC_APPROVER))
            .await
            .expect("approval recorded");
        id
    };

    let quiet = ScriptedModel::texts([]);
    let engine = site.engine(&quiet, &quiet);
    let outcome = engine.resume(id).await.expect("resume");

    assert_eq!(outcome.status(), OutcomeStatus::AlreadyCompleted);
    assert_eq!(quiet.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn pool_resumes_every_interrupted_task(site: Site) {
    let planner = ScriptedModel::texts(["plan a", "plan b", "plan c"]);
    let idle = ScriptedModel::texts([]);
    let mut ids = Vec::new();
    {
        let engine = site.engine(&planner, &idle);
        for index in 0..3 {
            ids.push(
                engine
                    .submit(&format!("{REQUEST} #{index}"))
                    .await
                    .expect("task created"),
            );
        }
        let pool = WorkflowPool::new(engine, 2);
        let started = pool.start_all(ids.clone()).await;
        assert!(started.iter().all(|(_, result)| result
            .as_ref()
            .is_ok_and(|outcome| outcome.stage() == OutcomeStage::PlanCreated)));
    }

    let quiet = ScriptedModel::texts([]);
    let pool = WorkflowPool::new(site.engine(&quiet, &quiet), 2);
    let resumed = pool.resume_all().await.expect("store readable");

    ids.sort();
    let resumed_ids: Vec<_> = resumed.iter().map(|(id, _)| *id).collect();
    assert_eq!(resumed_ids, ids);
    assert!(resumed.iter().all(|(_, result)| result
        .as_ref()
        .is_ok_and(|outcome| outcome.status() == OutcomeStatus::AwaitingUserApproval)));
    assert_eq!(quiet.calls(), 0);
    assert!(site.executor.executed().is_empty());
}

#[rstest]
#[tokio::test]
async fn backup_copies_the_database(site: Site) {
    let planner = ScriptedModel::texts(["plan"]);
    let engine = site.engine(&planner, &planner);
    let id = engine.submit(REQUEST).await.expect("task created");
    engine.start(id).await.expect("planning runs");

    let backup = engine.store().backup(None).await.expect("backup written");

    assert_eq!(backup.parent(), site.database.parent());
    assert_eq!(backup.extension(), Some("db"));
    let copy = SqliteTaskStore::open(&backup).expect("backup opens");
    let task = copy.get(id).await.expect("backup readable").expect("task copied");
    assert_eq!(task.workflow_state(), WorkflowState::PlanAwaitingApproval);
}
