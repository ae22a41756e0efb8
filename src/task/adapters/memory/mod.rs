//! In-memory task store used by tests and embedders.

mod store;

pub use store::InMemoryTaskStore;
