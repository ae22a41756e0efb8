//! Storage-neutral checkpoint shapes.
//!
//! The store treats checkpoint payloads as opaque JSON text. Typed decoding
//! belongs to the workflow layer so a corrupt payload surfaces there as a
//! resume inconsistency rather than a storage failure.

use super::{TaskId, TaskUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checkpoint to append, together with the task update it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckpoint {
    /// Checkpoint name, such as `after_planning`.
    pub name: String,
    /// Serialized checkpoint payload.
    pub data: String,
    /// Task fields written in the same transaction.
    pub update: TaskUpdate,
}

/// Checkpoint as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCheckpoint {
    /// Insertion id; orders checkpoints of one task.
    pub id: i64,
    /// Owning task.
    pub task_id: TaskId,
    /// Checkpoint name.
    pub name: String,
    /// Serialized checkpoint payload.
    pub data: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
