//! Shared fakes for workflow tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde_json::json;
use tempfile::TempDir;

use crate::policy::{PolicyConfig, PolicyValidator};
use crate::sandbox::domain::{BackendKind, ExecutionOutcome, SandboxConfig};
use crate::sandbox::ports::MockIsolatedExecutor;
use crate::sandbox::services::SandboxService;
use crate::workflow::domain::{ChatMessage, ModelResponse, ToolCall, ToolSchema};
use crate::workflow::ports::{ModelClient, ModelError, ModelResult};

/// Model that replays a fixed list of replies and records the last user
/// message of every call.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelResult<ModelResponse>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = ModelResult<ModelResponse>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn texts<'a>(replies: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        Self::new(replies.into_iter().map(|text| Ok(ModelResponse::text(text))))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log lock").clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSchema],
    ) -> ModelResult<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(prompt) = messages.get(1) {
            self.prompts
                .lock()
                .expect("prompt log lock")
                .push(prompt.content.clone());
        }
        self.replies
            .lock()
            .expect("reply lock")
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Rejected("script exhausted".to_owned())))
    }
}

pub fn tool_call(name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: format!("call-{name}"),
        name: name.to_owned(),
        arguments,
    }
}

pub fn write_file_call(path: &str, content: &str) -> ModelResponse {
    ModelResponse::with_tool_calls(vec![tool_call(
        "write_file",
        json!({"path": path, "content": content}),
    )])
}

pub fn succeeding_executor() -> MockIsolatedExecutor {
    let mut executor = MockIsolatedExecutor::new();
    executor.expect_backend().return_const(BackendKind::Container);
    executor.expect_execute().returning(|_| ExecutionOutcome {
        stdout: "ok\n".to_owned(),
        ..ExecutionOutcome::default()
    });
    executor
}

pub fn validator() -> Arc<PolicyValidator> {
    Arc::new(PolicyValidator::new(PolicyConfig::default()).expect("built-in patterns compile"))
}

pub fn workspace_dir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temporary directory");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("workspace"))
        .expect("temporary path is UTF-8");
    (dir, path)
}

pub fn sandbox(executor: MockIsolatedExecutor, workspace: &Utf8PathBuf) -> Arc<SandboxService> {
    Arc::new(SandboxService::with_executor(
        Arc::new(executor),
        validator(),
        SandboxConfig::default(),
        workspace.clone(),
    ))
}
