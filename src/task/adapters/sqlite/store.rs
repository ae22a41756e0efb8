//! `SQLite` implementation of [`TaskStore`].

use super::{
    migrations::migrate,
    models::{
        CheckpointRow, NewCheckpointRow, NewTaskRow, TaskChangeset, TaskRow, encode_timestamp,
        row_to_task,
    },
    schema::{checkpoints, tasks},
};
use crate::task::{
    adapters::backup_file_name,
    domain::{
        NewCheckpoint, NewTask, StoreStatistics, StoredCheckpoint, Task, TaskFilter, TaskId,
        TaskStatus, TaskUpdate, WorkflowState,
    },
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use mockable::{Clock, DefaultClock};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

const IN_MEMORY: &str = ":memory:";

impl From<DieselError> for TaskStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// `SQLite`-backed task store.
///
/// One connection sits behind one mutex; every operation, backups included,
/// holds it for its whole duration.
#[derive(Clone)]
pub struct SqliteTaskStore<C = DefaultClock> {
    connection: Arc<Mutex<SqliteConnection>>,
    location: String,
    clock: C,
}

impl<C> std::fmt::Debug for SqliteTaskStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTaskStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteTaskStore<DefaultClock> {
    /// Opens (creating if needed) the database at `path` and brings its
    /// schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the file cannot be opened
    /// or migrated.
    pub fn open(path: impl AsRef<Utf8Path>) -> TaskStoreResult<Self> {
        Self::open_with_clock(path, DefaultClock)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the schema cannot be
    /// created.
    pub fn open_in_memory() -> TaskStoreResult<Self> {
        Self::open(IN_MEMORY)
    }
}

impl<C> SqliteTaskStore<C>
where
    C: Clock + Send + Sync,
{
    /// Opens the database at `path`, stamping times from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the file cannot be opened
    /// or migrated.
    pub fn open_with_clock(path: impl AsRef<Utf8Path>, clock: C) -> TaskStoreResult<Self> {
        let location = path.as_ref().as_str().to_owned();
        if location != IN_MEMORY
            && let Some(parent) = path.as_ref().parent()
            && !parent.as_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(TaskStoreError::persistence)?;
        }

        let mut connection = SqliteConnection::establish(&location).map_err(|err| {
            error!(path = %location, error = %err, "failed to open task database");
            TaskStoreError::persistence(err)
        })?;
        connection.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        migrate(&mut connection)?;
        debug!(path = %location, "task database ready");

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            location,
            clock,
        })
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection.lock().map_err(|err| {
                TaskStoreError::persistence(std::io::Error::other(err.to_string()))
            })?;
            f(&mut guard)
        })
        .await
        .map_err(TaskStoreError::persistence)?
    }

    fn backup_directory(&self, destination: Option<&Utf8Path>) -> TaskStoreResult<Utf8PathBuf> {
        if let Some(dir) = destination {
            return Ok(dir.to_owned());
        }
        let parent = (self.location != IN_MEMORY)
            .then(|| Utf8Path::new(&self.location).parent())
            .flatten()
            .filter(|parent| !parent.as_str().is_empty());
        match parent {
            Some(dir) => Ok(dir.to_owned()),
            None if self.location == IN_MEMORY => {
                Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|path| {
                    TaskStoreError::persistence(std::io::Error::other(format!(
                        "temporary directory is not UTF-8: {}",
                        path.display()
                    )))
                })
            }
            None => Ok(Utf8PathBuf::from(".")),
        }
    }
}

fn task_exists(connection: &mut SqliteConnection, id: TaskId) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(tasks::table.find(id.value()))).get_result(connection)
}

fn apply_update(
    connection: &mut SqliteConnection,
    id: TaskId,
    update: &TaskUpdate,
    timestamp: DateTime<Utc>,
) -> QueryResult<usize> {
    let changed = diesel::update(tasks::table.find(id.value()))
        .set(TaskChangeset::new(update, timestamp))
        .execute(connection)?;
    if changed > 0 && update.increment_retry {
        diesel::update(tasks::table.find(id.value()))
            .set(tasks::retry_count.eq(tasks::retry_count + 1))
            .execute(connection)?;
    }
    Ok(changed)
}

fn load_tasks(rows: Vec<TaskRow>) -> TaskStoreResult<Vec<Task>> {
    rows.into_iter().map(row_to_task).collect()
}

#[async_trait]
impl<C> TaskStore for SqliteTaskStore<C>
where
    C: Clock + Send + Sync,
{
    async fn create(&self, task: NewTask) -> TaskStoreResult<TaskId> {
        let row = NewTaskRow::new(&task, self.clock.utc());
        self.run_blocking(move |connection| {
            let id = diesel::insert_into(tasks::table)
                .values(&row)
                .returning(tasks::id)
                .get_result::<i64>(connection)?;
            Ok(TaskId::new(id))
        })
        .await
    }

    async fn get(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .find(id.value())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn update(&self, id: TaskId, update: TaskUpdate) -> TaskStoreResult<bool> {
        let timestamp = self.clock.utc();
        self.run_blocking(move |connection| {
            let changed = connection.immediate_transaction(|connection| {
                apply_update(connection, id, &update, timestamp)
            })?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list(&self, filter: TaskFilter) -> TaskStoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let mut query = tasks::table.select(TaskRow::as_select()).into_boxed();
            if let Some(status) = filter.status {
                query = query.filter(tasks::status.eq(status.as_str()));
            }
            if let Some(state) = filter.workflow_state {
                query = query.filter(tasks::workflow_state.eq(state.as_str()));
            }
            if let Some(limit) = filter.limit {
                query = query.limit(i64::from(limit));
            }
            let rows = query
                .order((tasks::created_at.desc(), tasks::id.desc()))
                .load::<TaskRow>(connection)?;
            load_tasks(rows)
        })
        .await
    }

    async fn save_checkpoint(&self, id: TaskId, checkpoint: NewCheckpoint) -> TaskStoreResult<()> {
        let timestamp = self.clock.utc();
        self.run_blocking(move |connection| {
            connection.immediate_transaction(|connection| {
                if !task_exists(connection, id)? {
                    return Err(TaskStoreError::NotFound(id));
                }
                apply_update(connection, id, &checkpoint.update, timestamp)?;
                diesel::insert_into(checkpoints::table)
                    .values(NewCheckpointRow {
                        task_id: id.value(),
                        name: checkpoint.name.clone(),
                        data: checkpoint.data.clone(),
                        created_at: encode_timestamp(timestamp),
                    })
                    .execute(connection)?;
                Ok(())
            })
        })
        .await
        .inspect_err(|err| {
            if !matches!(err, TaskStoreError::NotFound(_)) {
                error!(task_id = id.value(), error = %err, "checkpoint write failed");
            }
        })
    }

    async fn latest_checkpoint(&self, id: TaskId) -> TaskStoreResult<Option<StoredCheckpoint>> {
        self.run_blocking(move |connection| {
            let row = checkpoints::table
                .filter(checkpoints::task_id.eq(id.value()))
                .order(checkpoints::id.desc())
                .select(CheckpointRow::as_select())
                .first::<CheckpointRow>(connection)
                .optional()?;
            Ok(row.map(StoredCheckpoint::from))
        })
        .await
    }

    async fn checkpoints(&self, id: TaskId) -> TaskStoreResult<Vec<StoredCheckpoint>> {
        self.run_blocking(move |connection| {
            let rows = checkpoints::table
                .filter(checkpoints::task_id.eq(id.value()))
                .order(checkpoints::id.asc())
                .select(CheckpointRow::as_select())
                .load::<CheckpointRow>(connection)?;
            Ok(rows.into_iter().map(StoredCheckpoint::from).collect())
        })
        .await
    }

    async fn resumable(&self) -> TaskStoreResult<Vec<Task>> {
        let states: Vec<&'static str> = WorkflowState::IN_FLIGHT
            .iter()
            .map(|state| state.as_str())
            .collect();
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::status.eq(TaskStatus::InProgress.as_str()))
                .filter(tasks::workflow_state.eq_any(states))
                .order((tasks::updated_at.desc(), tasks::id.desc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?;
            load_tasks(rows)
        })
        .await
    }

    async fn backup(&self, destination: Option<&Utf8Path>) -> TaskStoreResult<Utf8PathBuf> {
        let directory = self.backup_directory(destination)?;
        let path = directory.join(backup_file_name(self.clock.utc(), "db"));
        let target = path.clone();
        self.run_blocking(move |connection| {
            std::fs::create_dir_all(&directory).map_err(TaskStoreError::persistence)?;
            diesel::sql_query("VACUUM INTO ?")
                .bind::<diesel::sql_types::Text, _>(target.as_str())
                .execute(connection)?;
            Ok(())
        })
        .await?;
        debug!(path = %path, "task database backed up");
        Ok(path)
    }

    async fn delete(&self, id: TaskId) -> TaskStoreResult<bool> {
        self.run_blocking(move |connection| {
            connection.immediate_transaction(|connection| {
                diesel::delete(checkpoints::table.filter(checkpoints::task_id.eq(id.value())))
                    .execute(connection)?;
                let removed = diesel::delete(tasks::table.find(id.value())).execute(connection)?;
                Ok(removed > 0)
            })
        })
        .await
    }

    async fn statistics(&self) -> TaskStoreResult<StoreStatistics> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .group_by(tasks::workflow_state)
                .select((tasks::workflow_state, diesel::dsl::count_star()))
                .load::<(String, i64)>(connection)?;
            let mut statistics = StoreStatistics::default();
            for (raw_state, count) in rows {
                let tally = u64::try_from(count).unwrap_or_default();
                statistics.total = statistics.total.saturating_add(tally);
                let Ok(state) = WorkflowState::try_from(raw_state.as_str()) else {
                    continue;
                };
                let by_status = statistics.by_status.entry(state.status()).or_default();
                *by_status = by_status.saturating_add(tally);
                let by_state = statistics.by_workflow_state.entry(state).or_default();
                *by_state = by_state.saturating_add(tally);
            }
            Ok(statistics)
        })
        .await
    }
}
