//! Domain model for isolated execution.

mod config;
mod request;

pub use config::{SandboxConfig, SandboxMode};
pub use request::{
    BackendKind, ExecutionOutcome, ExecutionPayload, ExecutionRequest, ResourceLimits,
    absolute_workspace,
};
