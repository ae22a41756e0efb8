//! Shared fakes for integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use camino::Utf8PathBuf;
use stagehand::policy::{PolicyConfig, PolicyValidator};
use stagehand::sandbox::domain::{
    BackendKind, ExecutionOutcome, ExecutionRequest, SandboxConfig,
};
use stagehand::sandbox::ports::IsolatedExecutor;
use stagehand::sandbox::services::SandboxService;
use stagehand::workflow::domain::{ChatMessage, ModelResponse, ToolSchema};
use stagehand::workflow::ports::{ModelClient, ModelError, ModelResult};

/// Model that replays canned replies in order and counts its calls.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelResult<ModelResponse>>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    /// Model answering each call with the next text.
    pub fn texts<'a>(replies: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|text| Ok(ModelResponse::text(text)))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        })
    }

    /// Calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSchema],
    ) -> ModelResult<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| Err(ModelError::Rejected("no scripted reply left".to_owned())))
    }
}

/// Executor that reports success without running anything.
#[derive(Default)]
pub struct RecordingExecutor {
    executed: Mutex<Vec<ExecutionRequest>>,
}

impl RecordingExecutor {
    /// Requests seen so far.
    pub fn executed(&self) -> Vec<ExecutionRequest> {
        self.executed
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IsolatedExecutor for RecordingExecutor {
    fn backend(&self) -> BackendKind {
        BackendKind::Container
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        if let Ok(mut requests) = self.executed.lock() {
            requests.push(request.clone());
        }
        ExecutionOutcome {
            stdout: "1 passed\n".to_owned(),
            ..ExecutionOutcome::default()
        }
    }
}

/// Sandbox over `executor` with default policy and settings.
pub fn sandbox(executor: Arc<RecordingExecutor>, workspace: Utf8PathBuf) -> Arc<SandboxService> {
    let validator = PolicyValidator::new(PolicyConfig::default())
        .unwrap_or_else(|err| panic!("built-in patterns compile: {err}"));
    Arc::new(SandboxService::with_executor(
        executor,
        Arc::new(validator),
        SandboxConfig::default(),
        workspace,
    ))
}

/// UTF-8 path of `name` inside `dir`.
pub fn utf8_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join(name))
        .unwrap_or_else(|path| panic!("temporary path is not UTF-8: {}", path.display()))
}
