//! Wiring of a complete Stagehand instance from configuration.

use std::sync::Arc;

use mockable::DefaultClock;
use thiserror::Error;
use tracing::info;

use crate::config::StagehandConfig;
use crate::policy::{PolicyError, PolicyValidator};
use crate::sandbox::adapters::select_executor;
use crate::sandbox::services::SandboxService;
use crate::task::adapters::sqlite::SqliteTaskStore;
use crate::task::ports::{TaskStore, TaskStoreError};
use crate::workflow::adapters::RetryingModelClient;
use crate::workflow::ports::ModelClient;
use crate::workflow::services::{Stages, WorkflowEngine, WorkflowPool};

/// Errors raised while assembling an instance.
#[derive(Debug, Error)]
pub enum AppError {
    /// The task store could not be opened or backed up.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    /// The policy configuration is unusable.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A configured engine over the `SQLite` store, with its pool and sandbox.
pub struct Stagehand {
    engine: Arc<WorkflowEngine<SqliteTaskStore>>,
    pool: WorkflowPool<SqliteTaskStore, DefaultClock>,
    sandbox: Arc<SandboxService>,
}

impl Stagehand {
    /// Opens the store, selects an executor and builds the engine.
    ///
    /// Both model clients are wrapped with the configured retry policy.
    /// When `store.backup_on_start` is set a backup is written before
    /// anything else touches the store.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the store cannot be opened or backed up or
    /// the policy patterns do not compile.
    pub async fn build(
        config: &StagehandConfig,
        lead: Arc<dyn ModelClient>,
        member: Arc<dyn ModelClient>,
    ) -> Result<Self, AppError> {
        let store = Arc::new(SqliteTaskStore::open(&config.store.path)?);
        if config.store.backup_on_start {
            let backup = store.backup(config.store.backup_dir.as_deref()).await?;
            info!(path = %backup, "task store backed up");
        }

        let validator = Arc::new(PolicyValidator::new(config.policy.clone())?);
        let selection = select_executor(&config.sandbox).await;
        let sandbox = Arc::new(SandboxService::new(
            selection,
            validator,
            config.sandbox.clone(),
            config.workspace.clone(),
        ));

        let retry = config.workflow.model_retry;
        let stages = Stages::new(
            Arc::new(RetryingModelClient::new(lead, retry)),
            Arc::new(RetryingModelClient::new(member, retry)),
            Arc::clone(&sandbox),
            config.workflow.clone(),
        );
        let engine = Arc::new(WorkflowEngine::new(store, stages, Arc::new(DefaultClock)));
        let pool = WorkflowPool::new(Arc::clone(&engine), config.workflow.workers);
        info!(
            backend = %sandbox.backend(),
            store = %config.store.path,
            workers = pool.workers(),
            "stagehand ready"
        );
        Ok(Self {
            engine,
            pool,
            sandbox,
        })
    }

    /// The workflow engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<WorkflowEngine<SqliteTaskStore>> {
        &self.engine
    }

    /// The worker pool sharing [`Self::engine`].
    #[must_use]
    pub const fn pool(&self) -> &WorkflowPool<SqliteTaskStore, DefaultClock> {
        &self.pool
    }

    /// The sandbox used by implementation and verification.
    #[must_use]
    pub const fn sandbox(&self) -> &Arc<SandboxService> {
        &self.sandbox
    }

    /// Warning to show the user when executions are not isolated.
    #[must_use]
    pub fn isolation_warning(&self) -> Option<&str> {
        self.sandbox.warning()
    }
}
