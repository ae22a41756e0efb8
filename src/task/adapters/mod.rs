//! Adapter implementations of the task store port.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};

/// Returns the file name of a backup taken at `timestamp`.
///
/// Microseconds are included so two backups in the same second do not
/// collide.
#[must_use]
pub fn backup_file_name(timestamp: DateTime<Utc>, extension: &str) -> String {
    format!(
        "tasks_backup_{}.{extension}",
        timestamp.format("%Y%m%d_%H%M%S_%6f")
    )
}
