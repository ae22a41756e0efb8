//! Bounded concurrent execution of many workflows.

use std::collections::HashMap;
use std::sync::Arc;

use mockable::Clock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::{EngineError, EngineResult, WorkflowEngine};
use crate::task::domain::TaskId;
use crate::task::ports::TaskStore;
use crate::workflow::domain::WorkflowOutcome;

/// Outcome of one task run by the pool.
pub type PoolResult = (TaskId, EngineResult<WorkflowOutcome>);

#[derive(Debug, Clone, Copy)]
enum Job {
    Start,
    Resume,
}

/// Runs workflows on a fixed number of concurrent workers.
///
/// Each task is driven by at most one worker at a time; distinct tasks share
/// only the store, whose single lock keeps their checkpoints consistent.
pub struct WorkflowPool<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    engine: Arc<WorkflowEngine<S, C>>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl<S, C> WorkflowPool<S, C>
where
    S: TaskStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a pool of `workers` workers; zero is treated as one.
    #[must_use]
    pub fn new(engine: Arc<WorkflowEngine<S, C>>, workers: usize) -> Self {
        let size = workers.max(1);
        Self {
            engine,
            permits: Arc::new(Semaphore::new(size)),
            workers: size,
        }
    }

    /// Number of concurrent workers.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Starts every task and waits for all of them to stop at a gate or a
    /// terminal state. Results are ordered by task id.
    pub async fn start_all(&self, ids: impl IntoIterator<Item = TaskId>) -> Vec<PoolResult> {
        self.run(ids, Job::Start).await
    }

    /// Resumes every resumable task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the resumable tasks cannot be
    /// listed. Per-task failures are reported in the results.
    pub async fn resume_all(&self) -> EngineResult<Vec<PoolResult>> {
        let ids: Vec<TaskId> = self
            .engine
            .resumable()
            .await?
            .iter()
            .map(|task| task.id())
            .collect();
        info!(count = ids.len(), "resuming interrupted tasks");
        Ok(self.run(ids, Job::Resume).await)
    }

    async fn run(&self, ids: impl IntoIterator<Item = TaskId>, job: Job) -> Vec<PoolResult> {
        let mut set = JoinSet::new();
        let mut owners = HashMap::new();
        for id in ids {
            let engine = Arc::clone(&self.engine);
            let permits = Arc::clone(&self.permits);
            let handle = set.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => match job {
                        Job::Start => engine.start(id).await,
                        Job::Resume => engine.resume(id).await,
                    },
                    Err(closed) => Err(EngineError::Worker {
                        task_id: id,
                        reason: closed.to_string(),
                    }),
                };
                (id, outcome)
            });
            owners.insert(handle.id(), id);
        }

        let mut results = Vec::with_capacity(owners.len());
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(join_error) => {
                    let Some(task_id) = owners.get(&join_error.id()).copied() else {
                        continue;
                    };
                    error!(task_id = %task_id, error = %join_error, "workflow worker aborted");
                    results.push((
                        task_id,
                        Err(EngineError::Worker {
                            task_id,
                            reason: join_error.to_string(),
                        }),
                    ));
                }
            }
        }
        results.sort_by_key(|(id, _)| *id);
        results
    }
}
