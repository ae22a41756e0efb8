//! Policy-gated execution facade.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::policy::{PolicyValidator, Verdict};
use crate::sandbox::adapters::ExecutorSelection;
use crate::sandbox::domain::{
    BackendKind, ExecutionOutcome, ExecutionPayload, ExecutionRequest, SandboxConfig,
    absolute_workspace,
};
use crate::sandbox::ports::IsolatedExecutor;

/// Infrastructure failures that prevent the sandbox from operating at all.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The workspace directory could not be created or opened.
    #[error("workspace {path} is unusable: {source}")]
    Workspace {
        /// Workspace location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Runs commands and code through the validator and then the executor.
///
/// Rejected requests never reach the executor; they come back as an outcome
/// with `exit_code == -1` and the rejection reason in `error`.
#[derive(Clone)]
pub struct SandboxService {
    executor: Arc<dyn IsolatedExecutor>,
    validator: Arc<PolicyValidator>,
    config: SandboxConfig,
    workspace: Utf8PathBuf,
    warning: Option<String>,
}

impl SandboxService {
    /// Wraps a selected executor.
    ///
    /// A relative workspace is anchored at the current directory here, so
    /// the file tools and every backend see the same host directory.
    #[must_use]
    pub fn new(
        selection: ExecutorSelection,
        validator: Arc<PolicyValidator>,
        config: SandboxConfig,
        workspace: impl Into<Utf8PathBuf>,
    ) -> Self {
        let ExecutorSelection { executor, warning } = selection;
        let declared: Utf8PathBuf = workspace.into();
        let anchored = absolute_workspace(&declared).unwrap_or_else(|err| {
            warn!(workspace = %declared, error = %err, "workspace left relative");
            declared.clone()
        });
        Self {
            executor,
            validator,
            config,
            workspace: anchored,
            warning,
        }
    }

    /// Wraps an executor directly, with no selection warning.
    #[must_use]
    pub fn with_executor(
        executor: Arc<dyn IsolatedExecutor>,
        validator: Arc<PolicyValidator>,
        config: SandboxConfig,
        workspace: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self::new(
            ExecutorSelection {
                executor,
                warning: None,
            },
            validator,
            config,
            workspace,
        )
    }

    /// Backend in use.
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.executor.backend()
    }

    /// Warning produced when the backend was selected, if any.
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Host directory exposed to executions.
    #[must_use]
    pub fn workspace(&self) -> &Utf8Path {
        &self.workspace
    }

    /// Validator shared with callers that check paths themselves.
    #[must_use]
    pub fn validator(&self) -> &PolicyValidator {
        &self.validator
    }

    /// Creates the workspace if needed and opens it as a capability handle.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Workspace`] when the directory cannot be
    /// created or opened.
    pub fn ensure_workspace(&self) -> Result<Dir, SandboxError> {
        Dir::create_ambient_dir_all(&self.workspace, ambient_authority())
            .and_then(|()| Dir::open_ambient_dir(&self.workspace, ambient_authority()))
            .map_err(|source| SandboxError::Workspace {
                path: self.workspace.clone(),
                source,
            })
    }

    /// Runs an argv-style command.
    pub async fn run_command(
        &self,
        argv: Vec<String>,
        timeout: Option<Duration>,
    ) -> ExecutionOutcome {
        self.execute(&self.request(ExecutionPayload::Command(argv), timeout))
            .await
    }

    /// Runs source code with the configured interpreter.
    pub async fn run_code(&self, code: String, timeout: Option<Duration>) -> ExecutionOutcome {
        self.execute(&self.request(ExecutionPayload::Code(code), timeout))
            .await
    }

    /// Validates and runs a fully specified request.
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let verdict = self.check(request);
        if !verdict.is_accepted() {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "request refused".to_owned());
            warn!(backend = %self.backend(), %reason, "execution rejected by policy");
            return ExecutionOutcome::rejected(reason);
        }
        debug!(backend = %self.backend(), timeout_secs = request.timeout.as_secs(), "executing");
        let mut outcome = self.executor.execute(request).await;
        truncate_output(&mut outcome.stdout, self.config.output_limit_bytes);
        truncate_output(&mut outcome.stderr, self.config.output_limit_bytes);
        info!(
            backend = %self.backend(),
            exit_code = outcome.exit_code,
            timed_out = outcome.timed_out,
            "execution finished"
        );
        outcome
    }

    fn request(&self, payload: ExecutionPayload, timeout: Option<Duration>) -> ExecutionRequest {
        ExecutionRequest::new(payload, self.workspace.clone())
            .with_timeout(timeout.unwrap_or_else(|| self.config.default_timeout()))
            .with_limits(self.config.limits())
            .with_network(self.config.network_enabled)
    }

    fn check(&self, request: &ExecutionRequest) -> Verdict {
        self.validator
            .validate_limits(&request.limits, request.timeout)
            .and_then(|| self.validator.validate_network(request.network_enabled))
            .and_then(|| match &request.payload {
                ExecutionPayload::Command(argv) => self.validator.validate_command(argv),
                ExecutionPayload::Code(code) => {
                    self.validator.validate_code(code, request.network_enabled)
                }
            })
    }
}

/// Cuts `text` to at most `limit` bytes on a character boundary and appends
/// a marker noting how much was dropped.
pub fn truncate_output(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let cut = text
        .char_indices()
        .map(|(index, _)| index)
        .take_while(|index| *index <= limit)
        .last()
        .unwrap_or(0);
    let dropped = text.len().saturating_sub(cut);
    text.truncate(cut);
    text.push_str(&format!("\n[output truncated: {dropped} bytes omitted]"));
}
