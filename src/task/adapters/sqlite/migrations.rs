//! Additive schema management for the task database.
//!
//! A missing `tasks` table is created in full. An existing one only gains the
//! columns it lacks; nothing is dropped or rewritten, apart from backfilling
//! newly added columns from their legacy counterparts.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::collections::HashSet;
use tracing::info;

use super::models::ColumnInfo;

const CREATE_TASKS: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending',
    workflow_state TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL DEFAULT '',
    updated_at TEXT NOT NULL DEFAULT '',
    plan TEXT,
    implementation_result TEXT,
    review TEXT,
    verification_result TEXT,
    plan_approved_at TEXT,
    plan_approved_by TEXT,
    plan_rejection_reason TEXT,
    implementation_approved_at TEXT,
    implementation_approved_by TEXT,
    implementation_rejection_reason TEXT,
    error_details TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0
);
";

const CREATE_CHECKPOINTS: &str = "
CREATE TABLE IF NOT EXISTS checkpoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    name TEXT NOT NULL DEFAULT '',
    data TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT ''
);
";

const CREATE_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status, workflow_state);
CREATE INDEX IF NOT EXISTS idx_tasks_updated_at ON tasks(updated_at);
CREATE INDEX IF NOT EXISTS idx_checkpoints_task ON checkpoints(task_id, id);
";

/// Column definitions every `tasks` table must end up with.
const TASK_COLUMNS: &[(&str, &str)] = &[
    ("request", "TEXT NOT NULL DEFAULT ''"),
    ("status", "TEXT NOT NULL DEFAULT 'pending'"),
    ("workflow_state", "TEXT NOT NULL DEFAULT 'pending'"),
    ("created_at", "TEXT NOT NULL DEFAULT ''"),
    ("updated_at", "TEXT NOT NULL DEFAULT ''"),
    ("plan", "TEXT"),
    ("implementation_result", "TEXT"),
    ("review", "TEXT"),
    ("verification_result", "TEXT"),
    ("plan_approved_at", "TEXT"),
    ("plan_approved_by", "TEXT"),
    ("plan_rejection_reason", "TEXT"),
    ("implementation_approved_at", "TEXT"),
    ("implementation_approved_by", "TEXT"),
    ("implementation_rejection_reason", "TEXT"),
    ("error_details", "TEXT"),
    ("retry_count", "INTEGER NOT NULL DEFAULT 0"),
];

const CHECKPOINT_COLUMNS: &[(&str, &str)] = &[
    ("name", "TEXT NOT NULL DEFAULT ''"),
    ("data", "TEXT NOT NULL DEFAULT ''"),
    ("created_at", "TEXT NOT NULL DEFAULT ''"),
];

/// Backfills applied when `column` was just added and `legacy` exists.
const TASK_BACKFILLS: &[(&str, &str, &str)] = &[
    (
        "workflow_state",
        "status",
        "UPDATE tasks SET workflow_state = CASE status \
         WHEN 'completed' THEN 'completed' \
         WHEN 'failed' THEN 'failed' \
         WHEN 'cancelled' THEN 'plan_rejected' \
         ELSE 'pending' END",
    ),
    (
        "implementation_result",
        "implementation",
        "UPDATE tasks SET implementation_result = implementation",
    ),
];

const CHECKPOINT_BACKFILLS: &[(&str, &str, &str)] = &[
    (
        "name",
        "checkpoint_name",
        "UPDATE checkpoints SET name = checkpoint_name",
    ),
    (
        "data",
        "checkpoint_data",
        "UPDATE checkpoints SET data = checkpoint_data",
    ),
];

fn table_columns(
    connection: &mut SqliteConnection,
    table: &str,
) -> QueryResult<HashSet<String>> {
    let rows = diesel::sql_query(format!("PRAGMA table_info({table})"))
        .load::<ColumnInfo>(connection)?;
    Ok(rows.into_iter().map(|row| row.name).collect())
}

fn add_missing_columns(
    connection: &mut SqliteConnection,
    table: &str,
    columns: &[(&str, &str)],
    backfills: &[(&str, &str, &str)],
) -> QueryResult<()> {
    let existing = table_columns(connection, table)?;
    for (column, definition) in columns {
        if existing.contains(*column) {
            continue;
        }
        info!(table, column, "adding missing column");
        connection.batch_execute(&format!(
            "ALTER TABLE {table} ADD COLUMN {column} {definition}"
        ))?;
        for (target, legacy, statement) in backfills {
            if target == column && existing.contains(*legacy) {
                connection.batch_execute(statement)?;
            }
        }
    }
    Ok(())
}

/// Brings the schema up to date. Safe to run on every open.
pub fn migrate(connection: &mut SqliteConnection) -> QueryResult<()> {
    connection.immediate_transaction(|connection| {
        if table_columns(connection, "tasks")?.is_empty() {
            connection.batch_execute(CREATE_TASKS)?;
        } else {
            add_missing_columns(connection, "tasks", TASK_COLUMNS, TASK_BACKFILLS)?;
        }

        if table_columns(connection, "checkpoints")?.is_empty() {
            connection.batch_execute(CREATE_CHECKPOINTS)?;
        } else {
            add_missing_columns(
                connection,
                "checkpoints",
                CHECKPOINT_COLUMNS,
                CHECKPOINT_BACKFILLS,
            )?;
        }

        connection.batch_execute(CREATE_INDEXES)
    })
}
