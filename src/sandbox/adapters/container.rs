//! Container executor driven through the runtime CLI (`docker` or a
//! compatible binary).
//!
//! Each request runs in a fresh, uniquely named container that is removed
//! afterwards whether it finished, failed or timed out. The workspace is
//! bind-mounted at `/workspace`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::process::{OutputReaders, outcome_from, reap, spawn_captured, wait_with_timeout};
use crate::sandbox::domain::{
    BackendKind, ExecutionOutcome, ExecutionPayload, ExecutionRequest, SandboxConfig,
    absolute_workspace,
};
use crate::sandbox::ports::IsolatedExecutor;

/// Mount point of the workspace inside the container.
pub const CONTAINER_WORKSPACE: &str = "/workspace";

const CPU_PERIOD_MICROS: u32 = 100_000;
/// Quota microseconds per thousandth of a CPU within one period.
const QUOTA_PER_MILLI: u32 = 100;
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings that shape every `run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image to run.
    pub image: String,
    /// Interpreter for code payloads.
    pub interpreter: String,
    /// Process ceiling.
    pub pids_limit: u32,
    /// `uid:gid` the container process runs as.
    pub user: String,
}

impl ContainerSpec {
    /// Derives the spec from configuration and the caller's identity.
    #[must_use]
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            image: config.image.clone(),
            interpreter: config.interpreter.clone(),
            pids_limit: config.pids_limit,
            user: caller_identity(),
        }
    }
}

#[cfg(unix)]
fn caller_identity() -> String {
    use nix::unistd::{Gid, Uid};

    let uid = Uid::current();
    if uid.is_root() {
        return format!("{id}:{id}", id = super::direct::NOBODY_ID);
    }
    format!("{}:{}", uid.as_raw(), Gid::current().as_raw())
}

#[cfg(not(unix))]
fn caller_identity() -> String {
    format!("{id}:{id}", id = super::direct::NOBODY_ID)
}

/// Builds the runtime arguments for one `run` invocation.
///
/// The resulting container has no network unless the request enables it,
/// no capabilities, no privilege escalation, a writable `/tmp` tmpfs and
/// the requested memory and CPU ceilings. A relative workspace is anchored
/// at the current directory before it becomes the bind-mount source.
///
/// # Errors
///
/// Returns an error when a relative workspace cannot be made absolute.
pub fn container_args(
    name: &str,
    spec: &ContainerSpec,
    request: &ExecutionRequest,
) -> std::io::Result<Vec<String>> {
    let source = absolute_workspace(&request.workspace)?;
    let memory = format!("{}m", request.limits.memory_mb);
    let quota = request.limits.cpu_millis.saturating_mul(QUOTA_PER_MILLI);
    let mut args: Vec<String> = vec![
        "run".to_owned(),
        "--rm".to_owned(),
        "--name".to_owned(),
        name.to_owned(),
    ];
    if !request.network_enabled {
        args.extend(["--network".to_owned(), "none".to_owned()]);
    }
    args.extend([
        "--memory".to_owned(),
        memory.clone(),
        "--memory-swap".to_owned(),
        memory,
        "--cpu-period".to_owned(),
        CPU_PERIOD_MICROS.to_string(),
        "--cpu-quota".to_owned(),
        quota.to_string(),
        "--pids-limit".to_owned(),
        spec.pids_limit.to_string(),
        "--user".to_owned(),
        spec.user.clone(),
        "--cap-drop".to_owned(),
        "ALL".to_owned(),
        "--security-opt".to_owned(),
        "no-new-privileges".to_owned(),
        "--tmpfs".to_owned(),
        "/tmp".to_owned(),
        "-v".to_owned(),
        format!("{source}:{CONTAINER_WORKSPACE}"),
        "-w".to_owned(),
        CONTAINER_WORKSPACE.to_owned(),
        spec.image.clone(),
    ]);
    match &request.payload {
        ExecutionPayload::Command(argv) => args.extend(argv.iter().cloned()),
        ExecutionPayload::Code(code) => {
            args.extend([spec.interpreter.clone(), "-c".to_owned(), code.clone()]);
        }
    }
    Ok(args)
}

/// Runs requests inside throwaway containers.
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    runtime: String,
    spec: ContainerSpec,
    grace: Duration,
    output_limit: usize,
}

impl ContainerExecutor {
    /// Creates an executor from sandbox settings.
    #[must_use]
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            runtime: config.runtime.clone(),
            spec: ContainerSpec::from_config(config),
            grace: config.grace(),
            output_limit: config.output_limit_bytes,
        }
    }

    /// Checks whether the runtime answers `version` within a few seconds.
    pub async fn probe(runtime: &str) -> bool {
        let mut command = Command::new(runtime);
        command.arg("version");
        let Ok(mut child) = spawn_captured(&mut command) else {
            debug!(runtime, "container runtime not found");
            return false;
        };
        match wait_with_timeout(&mut child, PROBE_TIMEOUT).await {
            Ok(Some(status)) => status.success(),
            Ok(None) => {
                reap(&mut child, PROBE_TIMEOUT).await;
                debug!(runtime, "container runtime probe timed out");
                false
            }
            Err(err) => {
                debug!(runtime, error = %err, "container runtime probe failed");
                false
            }
        }
    }

    async fn runtime_quietly(&self, args: &[&str]) {
        let mut command = Command::new(&self.runtime);
        command.args(args);
        let Ok(mut child) = spawn_captured(&mut command) else {
            return;
        };
        match wait_with_timeout(&mut child, self.grace).await {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => reap(&mut child, self.grace).await,
        }
    }

    async fn teardown(&self, name: &str, timed_out: bool) {
        if timed_out {
            self.runtime_quietly(&["kill", name]).await;
        }
        self.runtime_quietly(&["rm", "-f", name]).await;
        debug!(container = name, "container removed");
    }
}

#[async_trait]
impl IsolatedExecutor for ContainerExecutor {
    fn backend(&self) -> BackendKind {
        BackendKind::Container
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        if matches!(&request.payload, ExecutionPayload::Command(argv) if argv.is_empty()) {
            return ExecutionOutcome::failed("Empty command");
        }
        let name = format!("stagehand-{}", Uuid::new_v4());
        let args = match container_args(&name, &self.spec, request) {
            Ok(args) => args,
            Err(err) => {
                error!(workspace = %request.workspace, error = %err, "workspace cannot be mounted");
                return ExecutionOutcome::failed(format!(
                    "workspace {} cannot be mounted: {err}",
                    request.workspace
                ));
            }
        };
        info!(container = %name, image = %self.spec.image, "starting container execution");
        let mut command = Command::new(&self.runtime);
        command.args(&args);
        let mut child = match spawn_captured(&mut command) {
            Ok(child) => child,
            Err(err) => {
                error!(runtime = %self.runtime, error = %err, "failed to start container runtime");
                return ExecutionOutcome::failed(format!("failed to start container: {err}"));
            }
        };
        let readers = OutputReaders::attach(&mut child, self.output_limit);
        let status = match wait_with_timeout(&mut child, request.timeout).await {
            Ok(status) => status,
            Err(err) => {
                reap(&mut child, self.grace).await;
                self.teardown(&name, true).await;
                return ExecutionOutcome::failed(format!("failed to wait for container: {err}"));
            }
        };
        let timed_out = status.is_none();
        if timed_out {
            warn!(container = %name, timeout_secs = request.timeout.as_secs(), "container execution timed out");
            reap(&mut child, self.grace).await;
        }
        self.teardown(&name, timed_out).await;
        let (stdout, stderr) = readers.collect(self.grace).await;
        outcome_from(status, stdout, stderr, request.timeout)
    }
}
