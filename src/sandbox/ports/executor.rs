//! Executor port shared by the container and direct backends.

use async_trait::async_trait;

use crate::sandbox::domain::{BackendKind, ExecutionOutcome, ExecutionRequest};

/// Runs one request under resource, time and network limits.
///
/// `execute` returns only after the process has finished, been killed on
/// timeout, or failed to start, and after its isolation unit has been torn
/// down. It never errors: every failure is described by the outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IsolatedExecutor: Send + Sync {
    /// Identifies the backend.
    fn backend(&self) -> BackendKind;

    /// Runs `request` to completion or timeout.
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome;
}
