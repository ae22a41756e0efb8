//! Host-process executor. Offers no isolation beyond a dedicated process
//! group and, when running as root, an unprivileged identity.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

use super::process::{OutputReaders, outcome_from, reap, spawn_captured, wait_with_timeout};
use crate::sandbox::domain::{
    BackendKind, ExecutionOutcome, ExecutionPayload, ExecutionRequest, SandboxConfig,
};
use crate::sandbox::ports::IsolatedExecutor;

/// Identity adopted by children when the host process runs as root.
pub const NOBODY_ID: u32 = 65_534;

/// Runs requests as plain host processes.
#[derive(Debug, Clone)]
pub struct DirectExecutor {
    interpreter: String,
    grace: Duration,
    output_limit: usize,
}

impl DirectExecutor {
    /// Creates an executor from sandbox settings.
    #[must_use]
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            grace: config.grace(),
            output_limit: config.output_limit_bytes,
        }
    }

    fn argv(&self, payload: &ExecutionPayload) -> Vec<String> {
        match payload {
            ExecutionPayload::Command(argv) => argv.clone(),
            ExecutionPayload::Code(code) => {
                vec![self.interpreter.clone(), "-c".to_owned(), code.clone()]
            }
        }
    }

    fn command(argv: &[String], request: &ExecutionRequest) -> Option<Command> {
        let (program, args) = argv.split_first()?;
        let mut command = Command::new(program);
        command.args(args).current_dir(&request.workspace);
        isolate(&mut command);
        Some(command)
    }
}

#[cfg(unix)]
fn isolate(command: &mut Command) {
    command.process_group(0);
    if nix::unistd::Uid::effective().is_root() {
        command.uid(NOBODY_ID).gid(NOBODY_ID);
    }
}

#[cfg(not(unix))]
const fn isolate(_command: &mut Command) {}

/// Group id of a freshly spawned child. The child leads its own group, so
/// this is its pid, read before `wait` reaps it and clears the id.
fn group_of(child: &Child) -> Option<i32> {
    child.id().and_then(|id| i32::try_from(id).ok())
}

#[cfg(unix)]
fn kill_group(group: Option<i32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(raw) = group else {
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!(pgid = raw, error = %err, "process group already gone");
    }
}

#[cfg(not(unix))]
const fn kill_group(_group: Option<i32>) {}

#[async_trait]
impl IsolatedExecutor for DirectExecutor {
    fn backend(&self) -> BackendKind {
        BackendKind::Direct
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let argv = self.argv(&request.payload);
        let Some(mut command) = Self::command(&argv, request) else {
            return ExecutionOutcome::failed("Empty command");
        };
        debug!(program = ?argv.first(), workspace = %request.workspace, "spawning direct execution");
        let mut child = match spawn_captured(&mut command) {
            Ok(child) => child,
            Err(err) => {
                error!(error = %err, "failed to spawn direct execution");
                return ExecutionOutcome::failed(format!("failed to start process: {err}"));
            }
        };
        let group = group_of(&child);
        let readers = OutputReaders::attach(&mut child, self.output_limit);
        let status = match wait_with_timeout(&mut child, request.timeout).await {
            Ok(status) => status,
            Err(err) => {
                kill_group(group);
                reap(&mut child, self.grace).await;
                return ExecutionOutcome::failed(format!("failed to wait for process: {err}"));
            }
        };
        // Descendants left in the group die with the call, however it ended.
        kill_group(group);
        if status.is_none() {
            warn!(timeout_secs = request.timeout.as_secs(), "direct execution timed out");
            reap(&mut child, self.grace).await;
        }
        let (stdout, stderr) = readers.collect(self.grace).await;
        outcome_from(status, stdout, stderr, request.timeout)
    }
}
