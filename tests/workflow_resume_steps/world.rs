//! Shared world state for workflow resume BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use stagehand::task::adapters::sqlite::SqliteTaskStore;
use stagehand::task::domain::TaskId;
use stagehand::workflow::domain::{WorkflowConfig, WorkflowOutcome};
use stagehand::workflow::services::{Stages, WorkflowEngine};
use tempfile::TempDir;

use crate::test_helpers::{RecordingExecutor, ScriptedModel, sandbox, utf8_path};

/// Engine type used by the BDD world.
pub type TestEngine = WorkflowEngine<SqliteTaskStore, DefaultClock>;

/// Models handed to the engine built after the simulated restart.
pub struct RestartModels {
    pub lead: Arc<ScriptedModel>,
    pub member: Arc<ScriptedModel>,
}

/// Scenario world for workflow resume behaviour tests.
#[derive(Default)]
pub struct ResumeWorld {
    pub scratch: Option<TempDir>,
    pub executor: Arc<RecordingExecutor>,
    pub task_id: Option<TaskId>,
    pub restart: Option<RestartModels>,
    pub last_outcome: Option<WorkflowOutcome>,
}

impl ResumeWorld {
    /// Builds an engine over the scenario's database file.
    pub fn engine(
        &self,
        lead: &Arc<ScriptedModel>,
        member: &Arc<ScriptedModel>,
    ) -> Result<TestEngine, eyre::Report> {
        let scratch = self
            .scratch
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task store in scenario world"))?;
        let database = utf8_path(scratch, "tasks.db");
        let workspace = utf8_path(scratch, "workspace");
        let config = WorkflowConfig {
            verification_commands: vec![vec!["pytest".to_owned(), "-q".to_owned()]],
            ..WorkflowConfig::default()
        };
        let stages = Stages::new(
            lead.clone(),
            member.clone(),
            sandbox(Arc::clone(&self.executor), workspace),
            config,
        );
        Ok(WorkflowEngine::new(
            Arc::new(SqliteTaskStore::open(&database)?),
            stages,
            Arc::new(DefaultClock),
        ))
    }

    /// Builds a fresh engine with new models, as a restarted process would.
    pub fn restarted_engine(&mut self) -> Result<TestEngine, eyre::Report> {
        let models = RestartModels {
            lead: ScriptedModel::texts(["Looks right. APPROVE"]),
            member: ScriptedModel::texts(["Route added"]),
        };
        let engine = self.engine(&models.lead, &models.member)?;
        self.restart = Some(models);
        Ok(engine)
    }

    /// Identifier of the scenario task.
    pub fn task_id(&self) -> Result<TaskId, eyre::Report> {
        self.task_id
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))
    }

    /// Allocates a scratch directory for the database and workspace.
    pub fn open_store(&mut self) -> Result<(), eyre::Report> {
        self.scratch = Some(TempDir::new()?);
        Ok(())
    }

    /// Verification runs recorded by the executor.
    pub fn executions(&self) -> usize {
        self.executor.executed().len()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ResumeWorld {
    ResumeWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
