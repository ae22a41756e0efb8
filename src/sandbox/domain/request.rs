//! Execution requests and the outcome contract shared by every backend.

use std::time::Duration;
use std::{fmt, io};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Which isolation backend produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A throwaway container driven through the container runtime CLI.
    Container,
    /// A host process in its own process group. Provides no isolation.
    Direct,
}

impl BackendKind {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExecutionPayload {
    /// An argv-style command; never passed through a shell.
    Command(Vec<String>),
    /// Source code handed to the configured interpreter.
    Code(String),
}

/// Memory and CPU ceilings for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory ceiling in MiB.
    pub memory_mb: u32,
    /// CPU quota in thousandths of a CPU; `1000` is one full core.
    pub cpu_millis: u32,
}

impl ResourceLimits {
    /// Creates limits from a memory ceiling and a CPU quota.
    #[must_use]
    pub const fn new(memory_mb: u32, cpu_millis: u32) -> Self {
        Self {
            memory_mb,
            cpu_millis,
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::new(512, 1000)
    }
}

/// A single isolated execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Command or code to run.
    pub payload: ExecutionPayload,
    /// Wall-clock budget.
    pub timeout: Duration,
    /// Resource ceilings.
    pub limits: ResourceLimits,
    /// Whether the execution may reach the network.
    pub network_enabled: bool,
    /// Host directory exposed as the working directory.
    pub workspace: Utf8PathBuf,
}

impl ExecutionRequest {
    /// Creates a request with default limits, a 300 second timeout and no
    /// network.
    #[must_use]
    pub fn new(payload: ExecutionPayload, workspace: impl Into<Utf8PathBuf>) -> Self {
        Self {
            payload,
            timeout: Duration::from_secs(300),
            limits: ResourceLimits::default(),
            network_enabled: false,
            workspace: workspace.into(),
        }
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the resource ceilings.
    #[must_use]
    pub const fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enables or disables network access.
    #[must_use]
    pub const fn with_network(mut self, enabled: bool) -> Self {
        self.network_enabled = enabled;
        self
    }
}

/// Result of an execution. Identical in shape for every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code; `-1` when the process never ran or was killed.
    pub exit_code: i32,
    /// Whether the timeout fired.
    pub timed_out: bool,
    /// Why the execution could not run or complete, if it could not.
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// Outcome for a request refused before execution.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        let message: String = reason.into();
        Self {
            stdout: String::new(),
            stderr: format!("Security validation failed: {message}"),
            exit_code: -1,
            timed_out: false,
            error: Some(message),
        }
    }

    /// Outcome for an execution the backend could not carry out.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        let message: String = error.into();
        Self {
            stdout: String::new(),
            stderr: message.clone(),
            exit_code: -1,
            timed_out: false,
            error: Some(message),
        }
    }

    /// Returns `true` for a clean zero exit within the timeout.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out && self.error.is_none()
    }
}

/// Anchors a relative workspace at the current directory.
///
/// Container runtimes read a mount source without a leading `/` as a named
/// volume, so every host path handed to an executor must be absolute.
///
/// # Errors
///
/// Returns an error when the current directory cannot be read or the
/// resolved path is not UTF-8.
pub fn absolute_workspace(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Utf8PathBuf::from_path_buf(std::path::absolute(path)?).map_err(|raw| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("workspace {} is not UTF-8", raw.display()),
        )
    })
}
