//! `SQLite` adapter for task persistence.

mod migrations;
mod models;
mod schema;
mod store;

pub use store::SqliteTaskStore;
