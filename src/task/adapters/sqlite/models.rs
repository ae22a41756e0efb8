//! Diesel row models for task persistence.

use super::schema::{checkpoints, tasks};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use diesel::prelude::*;

use crate::task::domain::{
    GateRecord, NewTask, PersistedTaskData, StoredCheckpoint, Task, TaskId, TaskUpdate,
    WorkflowState,
};
use crate::task::ports::{TaskStoreError, TaskStoreResult};

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TaskRow {
    pub id: i64,
    pub request: String,
    pub workflow_state: String,
    pub created_at: String,
    pub updated_at: String,
    pub plan: Option<String>,
    pub implementation_result: Option<String>,
    pub review: Option<String>,
    pub verification_result: Option<String>,
    pub plan_approved_at: Option<String>,
    pub plan_approved_by: Option<String>,
    pub plan_rejection_reason: Option<String>,
    pub implementation_approved_at: Option<String>,
    pub implementation_approved_by: Option<String>,
    pub implementation_rejection_reason: Option<String>,
    pub error_details: Option<String>,
    pub retry_count: i32,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    pub request: String,
    pub status: String,
    pub workflow_state: String,
    pub created_at: String,
    pub updated_at: String,
    pub retry_count: i32,
}

impl NewTaskRow {
    pub fn new(task: &NewTask, timestamp: DateTime<Utc>) -> Self {
        let stamp = encode_timestamp(timestamp);
        let state = task.initial_state();
        Self {
            request: task.request().to_owned(),
            status: state.status().as_str().to_owned(),
            workflow_state: state.as_str().to_owned(),
            created_at: stamp.clone(),
            updated_at: stamp,
            retry_count: 0,
        }
    }
}

/// Partial update for task records.
///
/// `None` skips a column; `Some(None)` writes `NULL`.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct TaskChangeset {
    pub status: Option<String>,
    pub workflow_state: Option<String>,
    pub updated_at: String,
    pub plan: Option<Option<String>>,
    pub implementation_result: Option<Option<String>>,
    pub review: Option<Option<String>>,
    pub verification_result: Option<Option<String>>,
    pub plan_approved_at: Option<Option<String>>,
    pub plan_approved_by: Option<Option<String>>,
    pub plan_rejection_reason: Option<Option<String>>,
    pub implementation_approved_at: Option<Option<String>>,
    pub implementation_approved_by: Option<Option<String>>,
    pub implementation_rejection_reason: Option<Option<String>>,
    pub error_details: Option<Option<String>>,
}

/// Column value for a stage output: the new text, `NULL` when outputs are
/// being cleared, or untouched.
fn output_column(value: Option<&String>, clear: bool) -> Option<Option<String>> {
    match value {
        Some(text) => Some(Some(text.clone())),
        None if clear => Some(None),
        None => None,
    }
}

/// Column triple written for one approval gate.
type GateColumns = (Option<String>, Option<String>, Option<String>);

fn gate_columns(gate: &GateRecord) -> GateColumns {
    (
        gate.approved_at().map(encode_timestamp),
        gate.approved_by().map(str::to_owned),
        gate.rejection_reason().map(str::to_owned),
    )
}

impl TaskChangeset {
    pub fn new(update: &TaskUpdate, timestamp: DateTime<Utc>) -> Self {
        let mut changeset = Self {
            status: update
                .workflow_state
                .map(|state| state.status().as_str().to_owned()),
            workflow_state: update.workflow_state.map(|state| state.as_str().to_owned()),
            updated_at: encode_timestamp(timestamp),
            plan: output_column(update.plan.as_ref(), update.clear_outputs),
            implementation_result: output_column(
                update.implementation_result.as_ref(),
                update.clear_outputs,
            ),
            review: output_column(update.review.as_ref(), update.clear_outputs),
            verification_result: output_column(
                update.verification_result.as_ref(),
                update.clear_outputs,
            ),
            error_details: update.error_details.clone(),
            ..Self::default()
        };
        if let Some(gate) = &update.plan_gate {
            let (at, by, reason) = gate_columns(gate);
            changeset.plan_approved_at = Some(at);
            changeset.plan_approved_by = Some(by);
            changeset.plan_rejection_reason = Some(reason);
        }
        if let Some(gate) = &update.implementation_gate {
            let (at, by, reason) = gate_columns(gate);
            changeset.implementation_approved_at = Some(at);
            changeset.implementation_approved_by = Some(by);
            changeset.implementation_rejection_reason = Some(reason);
        }
        changeset
    }
}

/// Query result row for checkpoints.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = checkpoints)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CheckpointRow {
    pub id: i64,
    pub task_id: i64,
    pub name: String,
    pub data: String,
    pub created_at: String,
}

impl From<CheckpointRow> for StoredCheckpoint {
    fn from(row: CheckpointRow) -> Self {
        Self {
            id: row.id,
            task_id: TaskId::new(row.task_id),
            name: row.name,
            data: row.data,
            created_at: decode_timestamp(&row.created_at),
        }
    }
}

/// Insert model for checkpoints.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = checkpoints)]
pub struct NewCheckpointRow {
    pub task_id: i64,
    pub name: String,
    pub data: String,
    pub created_at: String,
}

/// Name-only projection of `PRAGMA table_info`.
#[derive(Debug, Clone, QueryableByName)]
pub struct ColumnInfo {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub name: String,
}

pub fn encode_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decodes RFC 3339 or legacy `YYYY-MM-DD HH:MM:SS[.ffffff]` timestamps.
///
/// Empty or unparsable values decode to the Unix epoch.
pub fn decode_timestamp(raw: &str) -> DateTime<Utc> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.with_timezone(&Utc);
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn decode_gate(
    approved_at: Option<String>,
    approved_by: Option<String>,
    rejection_reason: Option<String>,
) -> GateRecord {
    GateRecord::from_columns(
        non_empty(approved_at).map(|raw| decode_timestamp(&raw)),
        non_empty(approved_by),
        non_empty(rejection_reason),
    )
}

pub fn row_to_task(row: TaskRow) -> TaskStoreResult<Task> {
    let task_id = TaskId::new(row.id);
    let workflow_state = WorkflowState::try_from(row.workflow_state.as_str()).map_err(|err| {
        TaskStoreError::CorruptRecord {
            task_id,
            reason: err.to_string(),
        }
    })?;

    let data = PersistedTaskData {
        id: task_id,
        request: row.request,
        workflow_state,
        created_at: decode_timestamp(&row.created_at),
        updated_at: decode_timestamp(&row.updated_at),
        plan: non_empty(row.plan),
        implementation_result: non_empty(row.implementation_result),
        review: non_empty(row.review),
        verification_result: non_empty(row.verification_result),
        plan_gate: decode_gate(
            row.plan_approved_at,
            row.plan_approved_by,
            row.plan_rejection_reason,
        ),
        implementation_gate: decode_gate(
            row.implementation_approved_at,
            row.implementation_approved_by,
            row.implementation_rejection_reason,
        ),
        error_details: non_empty(row.error_details),
        retry_count: u32::try_from(row.retry_count).unwrap_or_default(),
    };
    Ok(Task::from_persisted(data))
}
