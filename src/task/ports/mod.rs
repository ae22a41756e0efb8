//! Port contracts for task persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by the workflow
//! engine.

pub mod store;

pub use store::{TaskStore, TaskStoreError, TaskStoreResult};
