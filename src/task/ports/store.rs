//! Store port for tasks and their checkpoint history.

use crate::task::domain::{
    NewCheckpoint, NewTask, StoreStatistics, StoredCheckpoint, Task, TaskFilter, TaskId,
    TaskUpdate,
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Durable task and checkpoint persistence contract.
///
/// Implementations serialize every operation behind a single lock, so a
/// checkpoint append and the task update derived from it are observed
/// together or not at all.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Creates a task and returns its store-assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the write fails.
    async fn create(&self, task: NewTask) -> TaskStoreResult<TaskId>;

    /// Loads a task.
    ///
    /// Returns `None` when the task does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::CorruptRecord`] when the row cannot be
    /// decoded.
    async fn get(&self, id: TaskId) -> TaskStoreResult<Option<Task>>;

    /// Applies a partial update and stamps `updated_at`.
    ///
    /// Returns `false` when the task does not exist.
    async fn update(&self, id: TaskId, update: TaskUpdate) -> TaskStoreResult<bool>;

    /// Lists tasks, newest created first.
    async fn list(&self, filter: TaskFilter) -> TaskStoreResult<Vec<Task>>;

    /// Appends a checkpoint and applies its task update in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist, in
    /// which case nothing is written.
    async fn save_checkpoint(&self, id: TaskId, checkpoint: NewCheckpoint) -> TaskStoreResult<()>;

    /// Returns the most recently appended checkpoint of a task.
    async fn latest_checkpoint(&self, id: TaskId) -> TaskStoreResult<Option<StoredCheckpoint>>;

    /// Returns the full checkpoint history of a task, oldest first.
    async fn checkpoints(&self, id: TaskId) -> TaskStoreResult<Vec<StoredCheckpoint>>;

    /// Returns in-progress tasks in a resumable workflow state, most recently
    /// updated first.
    async fn resumable(&self) -> TaskStoreResult<Vec<Task>>;

    /// Writes a consistent point-in-time copy of the store and returns its
    /// path.
    ///
    /// When `destination` is `None` the copy is written next to the store.
    async fn backup(&self, destination: Option<&Utf8Path>) -> TaskStoreResult<Utf8PathBuf>;

    /// Deletes a task together with its checkpoints.
    ///
    /// Returns `false` when the task does not exist.
    async fn delete(&self, id: TaskId) -> TaskStoreResult<bool>;

    /// Counts tasks by status and by workflow state.
    async fn statistics(&self) -> TaskStoreResult<StoreStatistics>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A persisted row could not be decoded into a task.
    #[error("corrupt task record {task_id}: {reason}")]
    CorruptRecord {
        /// Identifier of the offending row.
        task_id: TaskId,
        /// Decoding failure.
        reason: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
