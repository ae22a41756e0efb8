//! Child process plumbing shared by both executors.
//!
//! Output is drained concurrently while the child runs so a chatty process
//! cannot deadlock on a full pipe. Bytes beyond the limit are read and
//! dropped.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::sandbox::domain::ExecutionOutcome;

const READ_CHUNK: usize = 8 * 1024;

/// Bytes kept from one stream plus the number discarded.
#[derive(Debug, Default)]
pub struct CapturedStream {
    /// Retained bytes, at most the configured limit.
    pub bytes: Vec<u8>,
    /// Bytes read and dropped past the limit.
    pub discarded: usize,
}

impl CapturedStream {
    fn into_text(self, label: &str) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.discarded > 0 {
            text.push_str(&format!(
                "\n[{label} truncated {} bytes]\n",
                self.discarded
            ));
        }
        text
    }
}

async fn read_limited<R>(mut reader: R, limit: usize) -> CapturedStream
where
    R: AsyncRead + Unpin,
{
    let mut captured = CapturedStream::default();
    let mut chunk = vec![0_u8; READ_CHUNK];
    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        let received = chunk.get(..read).unwrap_or_default();
        let room = limit.saturating_sub(captured.bytes.len());
        let kept = received.get(..room.min(read)).unwrap_or_default();
        captured.bytes.extend_from_slice(kept);
        captured.discarded = captured
            .discarded
            .saturating_add(read.saturating_sub(kept.len()));
    }
    captured
}

/// Readers attached to a spawned child's stdout and stderr.
pub struct OutputReaders {
    stdout: Option<JoinHandle<CapturedStream>>,
    stderr: Option<JoinHandle<CapturedStream>>,
}

impl OutputReaders {
    /// Takes the child's pipes and starts draining them.
    pub fn attach(child: &mut Child, limit: usize) -> Self {
        Self {
            stdout: child
                .stdout
                .take()
                .map(|pipe| tokio::spawn(read_limited(pipe, limit))),
            stderr: child
                .stderr
                .take()
                .map(|pipe| tokio::spawn(read_limited(pipe, limit))),
        }
    }

    /// Collects both streams, giving up after `grace` if a descendant still
    /// holds a pipe open.
    pub async fn collect(self, grace: Duration) -> (String, String) {
        let stdout = join_within(self.stdout, grace).await;
        let stderr = join_within(self.stderr, grace).await;
        if stdout.discarded > 0 || stderr.discarded > 0 {
            warn!(
                stdout_discarded = stdout.discarded,
                stderr_discarded = stderr.discarded,
                "execution output truncated"
            );
        }
        (stdout.into_text("stdout"), stderr.into_text("stderr"))
    }
}

async fn join_within(
    handle: Option<JoinHandle<CapturedStream>>,
    grace: Duration,
) -> CapturedStream {
    let Some(task) = handle else {
        return CapturedStream::default();
    };
    let abort = task.abort_handle();
    if let Ok(Ok(captured)) = tokio::time::timeout(grace, task).await {
        return captured;
    }
    abort.abort();
    debug!("output reader abandoned after grace period");
    CapturedStream::default()
}

/// Configures stdio for capture and spawns `command`.
pub fn spawn_captured(command: &mut Command) -> std::io::Result<Child> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Waits for `child`, returning `None` when `timeout` elapses first.
pub async fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status.map(Some),
        Err(_) => Ok(None),
    }
}

/// Reaps a child that has been signalled, bounded by `grace`.
pub async fn reap(child: &mut Child, grace: Duration) {
    if child.start_kill().is_err() {
        debug!("child already exited before kill");
    }
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        warn!("child did not exit within the grace period");
    }
}

/// Builds the outcome for a finished or timed-out process.
pub fn outcome_from(
    status: Option<ExitStatus>,
    stdout: String,
    stderr: String,
    timeout: Duration,
) -> ExecutionOutcome {
    match status {
        Some(exit) => ExecutionOutcome {
            stdout,
            stderr,
            exit_code: exit.code().unwrap_or(-1),
            timed_out: false,
            error: None,
        },
        None => ExecutionOutcome {
            stdout,
            stderr,
            exit_code: -1,
            timed_out: true,
            error: Some(format!(
                "execution timed out after {} seconds",
                timeout.as_secs()
            )),
        },
    }
}
