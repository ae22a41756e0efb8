//! Workflow services: the engine, its stages and the worker pool.

mod engine;
mod error;
mod pool;
pub mod prompts;
mod stages;
mod tools;

pub use engine::WorkflowEngine;
pub use error::{EngineError, EngineResult, StageError};
pub use pool::{PoolResult, WorkflowPool};
pub use stages::Stages;
pub use tools::{WorkspaceTools, format_outcome, tool_schemas};
