//! Domain model for task persistence.
//!
//! The task domain models the task aggregate, its workflow state machine and
//! the storage-neutral shapes of checkpoints, while keeping every
//! infrastructure concern outside of the domain boundary.

mod checkpoint;
mod error;
mod ids;
mod state;
mod task;

pub use checkpoint::{NewCheckpoint, StoredCheckpoint};
pub use error::{ParseTaskStatusError, ParseWorkflowStateError, TaskDomainError};
pub use ids::TaskId;
pub use state::{TaskStatus, WorkflowEvent, WorkflowState};
pub use task::{
    GateRecord, NewTask, PersistedTaskData, StoreStatistics, Task, TaskFilter, TaskUpdate,
};
