//! Backend selection.

use std::sync::Arc;

use tracing::{info, warn};

use super::{ContainerExecutor, DirectExecutor};
use crate::sandbox::domain::{BackendKind, SandboxConfig, SandboxMode};
use crate::sandbox::ports::IsolatedExecutor;

/// The chosen executor plus any warning the caller should surface.
pub struct ExecutorSelection {
    /// Executor to run requests with.
    pub executor: Arc<dyn IsolatedExecutor>,
    /// Set when the selection weakens isolation.
    pub warning: Option<String>,
}

impl ExecutorSelection {
    /// Backend of the selected executor.
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.executor.backend()
    }
}

/// Picks the container backend when configured and reachable, otherwise
/// the direct backend with a warning.
pub async fn select_executor(config: &SandboxConfig) -> ExecutorSelection {
    match config.mode {
        SandboxMode::Direct => {
            let warning = "sandbox running in direct mode: executions are NOT isolated from the host"
                .to_owned();
            warn!("{warning}");
            ExecutorSelection {
                executor: Arc::new(DirectExecutor::new(config)),
                warning: Some(warning),
            }
        }
        SandboxMode::Container => {
            if ContainerExecutor::probe(&config.runtime).await {
                info!(runtime = %config.runtime, image = %config.image, "using container sandbox");
                return ExecutorSelection {
                    executor: Arc::new(ContainerExecutor::new(config)),
                    warning: None,
                };
            }
            let warning = format!(
                "container runtime `{}` is unavailable; falling back to direct execution, \
                 which is NOT isolated from the host",
                config.runtime
            );
            warn!("{warning}");
            ExecutorSelection {
                executor: Arc::new(DirectExecutor::new(config)),
                warning: Some(warning),
            }
        }
    }
}
