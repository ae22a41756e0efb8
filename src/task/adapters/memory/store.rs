//! Thread-safe in-memory implementation of [`TaskStore`].

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use mockable::{Clock, DefaultClock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::super::backup_file_name;
use crate::task::{
    domain::{
        NewCheckpoint, NewTask, StoreStatistics, StoredCheckpoint, Task, TaskFilter, TaskId,
        TaskUpdate, WorkflowState,
    },
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};

/// In-memory task store.
///
/// A single mutex guards all state, mirroring the serialization guarantees
/// of the `SQLite` store.
#[derive(Debug, Clone)]
pub struct InMemoryTaskStore<C = DefaultClock> {
    state: Arc<Mutex<InMemoryState>>,
    clock: C,
}

#[derive(Debug, Default, Serialize)]
struct InMemoryState {
    next_task_id: i64,
    next_checkpoint_id: i64,
    tasks: BTreeMap<TaskId, Task>,
    checkpoints: Vec<StoredCheckpoint>,
}

impl InMemoryTaskStore<DefaultClock> {
    /// Creates an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(DefaultClock)
    }
}

impl Default for InMemoryTaskStore<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryTaskStore<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty store stamping times from `clock`.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState::default())),
            clock,
        }
    }

    fn lock(&self) -> TaskStoreResult<MutexGuard<'_, InMemoryState>> {
        self.state
            .lock()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

fn newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| {
        right
            .created_at()
            .cmp(&left.created_at())
            .then_with(|| right.id().cmp(&left.id()))
    });
}

#[async_trait]
impl<C> TaskStore for InMemoryTaskStore<C>
where
    C: Clock + Send + Sync,
{
    async fn create(&self, task: NewTask) -> TaskStoreResult<TaskId> {
        let mut state = self.lock()?;
        state.next_task_id = state.next_task_id.saturating_add(1);
        let id = TaskId::new(state.next_task_id);
        state
            .tasks
            .insert(id, Task::created(id, task, self.clock.utc()));
        Ok(id)
    }

    async fn get(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        let state = self.lock()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn update(&self, id: TaskId, update: TaskUpdate) -> TaskStoreResult<bool> {
        let mut state = self.lock()?;
        let timestamp = self.clock.utc();
        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(false);
        };
        task.apply_update(&update, timestamp);
        Ok(true)
    }

    async fn list(&self, filter: TaskFilter) -> TaskStoreResult<Vec<Task>> {
        let state = self.lock()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        newest_first(&mut tasks);
        if let Some(limit) = filter.limit {
            tasks.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(tasks)
    }

    async fn save_checkpoint(&self, id: TaskId, checkpoint: NewCheckpoint) -> TaskStoreResult<()> {
        let mut state = self.lock()?;
        let timestamp = self.clock.utc();
        let NewCheckpoint { name, data, update } = checkpoint;

        let task = state
            .tasks
            .get_mut(&id)
            .ok_or(TaskStoreError::NotFound(id))?;
        task.apply_update(&update, timestamp);

        state.next_checkpoint_id = state.next_checkpoint_id.saturating_add(1);
        let checkpoint_id = state.next_checkpoint_id;
        state.checkpoints.push(StoredCheckpoint {
            id: checkpoint_id,
            task_id: id,
            name,
            data,
            created_at: timestamp,
        });
        Ok(())
    }

    async fn latest_checkpoint(&self, id: TaskId) -> TaskStoreResult<Option<StoredCheckpoint>> {
        let state = self.lock()?;
        Ok(state
            .checkpoints
            .iter()
            .filter(|checkpoint| checkpoint.task_id == id)
            .max_by_key(|checkpoint| checkpoint.id)
            .cloned())
    }

    async fn checkpoints(&self, id: TaskId) -> TaskStoreResult<Vec<StoredCheckpoint>> {
        let state = self.lock()?;
        Ok(state
            .checkpoints
            .iter()
            .filter(|checkpoint| checkpoint.task_id == id)
            .cloned()
            .collect())
    }

    async fn resumable(&self) -> TaskStoreResult<Vec<Task>> {
        let state = self.lock()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| WorkflowState::IN_FLIGHT.contains(&task.workflow_state()))
            .cloned()
            .collect();
        tasks.sort_by(|left, right| {
            right
                .updated_at()
                .cmp(&left.updated_at())
                .then_with(|| right.id().cmp(&left.id()))
        });
        Ok(tasks)
    }

    async fn backup(&self, destination: Option<&Utf8Path>) -> TaskStoreResult<Utf8PathBuf> {
        let state = self.lock()?;
        let directory = match destination {
            Some(dir) => dir.to_owned(),
            None => Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|path| {
                TaskStoreError::persistence(std::io::Error::other(format!(
                    "temporary directory is not UTF-8: {}",
                    path.display()
                )))
            })?,
        };
        std::fs::create_dir_all(&directory).map_err(TaskStoreError::persistence)?;
        let path = directory.join(backup_file_name(self.clock.utc(), "json"));
        let snapshot = serde_json::to_vec_pretty(&*state).map_err(TaskStoreError::persistence)?;
        std::fs::write(&path, snapshot).map_err(TaskStoreError::persistence)?;
        Ok(path)
    }

    async fn delete(&self, id: TaskId) -> TaskStoreResult<bool> {
        let mut state = self.lock()?;
        if state.tasks.remove(&id).is_none() {
            return Ok(false);
        }
        state.checkpoints.retain(|checkpoint| checkpoint.task_id != id);
        Ok(true)
    }

    async fn statistics(&self) -> TaskStoreResult<StoreStatistics> {
        let state = self.lock()?;
        let mut statistics = StoreStatistics::default();
        for task in state.tasks.values() {
            statistics.record(task.workflow_state());
        }
        Ok(statistics)
    }
}
