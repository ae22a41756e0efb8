//! Policy gating and output handling in `SandboxService`.

use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use crate::policy::{PolicyConfig, PolicyValidator};
use crate::sandbox::domain::{
    BackendKind, ExecutionOutcome, ExecutionPayload, ExecutionRequest, SandboxConfig,
};
use crate::sandbox::ports::MockIsolatedExecutor;
use crate::sandbox::services::{SandboxService, truncate_output};

#[fixture]
fn validator() -> Arc<PolicyValidator> {
    Arc::new(PolicyValidator::new(PolicyConfig::default()).expect("built-in patterns compile"))
}

fn refusing_executor() -> MockIsolatedExecutor {
    let mut executor = MockIsolatedExecutor::new();
    executor.expect_backend().return_const(BackendKind::Direct);
    executor.expect_execute().never();
    executor
}

fn service(executor: MockIsolatedExecutor, validator: Arc<PolicyValidator>) -> SandboxService {
    SandboxService::with_executor(
        Arc::new(executor),
        validator,
        SandboxConfig {
            output_limit_bytes: 16,
            ..SandboxConfig::default()
        },
        "/tmp/stagehand-workspace",
    )
}

#[rstest]
#[case::denied(vec!["rm", "-rf", "/"], "Blacklisted command: rm")]
#[case::not_allowed(vec!["bash"], "Command not in whitelist: bash")]
#[case::injection(vec!["echo", "a && b"], "Potential command injection detected: a && b")]
#[tokio::test]
async fn rejected_commands_never_execute(
    validator: Arc<PolicyValidator>,
    #[case] parts: Vec<&str>,
    #[case] reason: &str,
) {
    let sandbox = service(refusing_executor(), validator);
    let argv = parts.into_iter().map(str::to_owned).collect();

    let outcome = sandbox.run_command(argv, None).await;

    assert_eq!(outcome.exit_code, -1);
    assert_eq!(outcome.error.as_deref(), Some(reason));
    assert!(outcome.stderr.starts_with("Security validation failed"));
}

#[rstest]
#[tokio::test]
async fn rejected_code_never_executes(validator: Arc<PolicyValidator>) {
    let sandbox = service(refusing_executor(), validator);

    let outcome = sandbox
        .run_code("import os\nos.system('id')".to_owned(), None)
        .await;

    assert_eq!(outcome.exit_code, -1);
    assert!(outcome.error.is_some());
}

#[rstest]
#[case::too_long(Duration::from_secs(3600))]
#[case::zero(Duration::ZERO)]
#[tokio::test]
async fn out_of_range_timeouts_are_rejected(
    validator: Arc<PolicyValidator>,
    #[case] timeout: Duration,
) {
    let sandbox = service(refusing_executor(), validator);

    let outcome = sandbox
        .run_command(vec!["ls".to_owned()], Some(timeout))
        .await;

    assert!(outcome.error.is_some_and(|error| error.contains("Timeout")));
}

#[rstest]
#[tokio::test]
async fn network_requests_need_policy_permission(validator: Arc<PolicyValidator>) {
    let sandbox = service(refusing_executor(), validator);
    let request = ExecutionRequest::new(
        ExecutionPayload::Command(vec!["ls".to_owned()]),
        "/tmp/stagehand-workspace",
    )
    .with_network(true);

    let outcome = sandbox.execute(&request).await;

    assert_eq!(
        outcome.error.as_deref(),
        Some("Network access not allowed by policy")
    );
}

#[rstest]
#[tokio::test]
async fn accepted_requests_run_with_configured_defaults(validator: Arc<PolicyValidator>) {
    let mut executor = MockIsolatedExecutor::new();
    executor.expect_backend().return_const(BackendKind::Container);
    executor
        .expect_execute()
        .withf(|request| {
            request.timeout == Duration::from_secs(300)
                && !request.network_enabled
                && request.workspace.as_str() == "/tmp/stagehand-workspace"
        })
        .times(1)
        .returning(|_| ExecutionOutcome {
            stdout: "x".repeat(40),
            ..ExecutionOutcome::default()
        });
    let sandbox = service(executor, validator);

    let outcome = sandbox.run_command(vec!["ls".to_owned()], None).await;

    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.stdout.starts_with(&"x".repeat(16)));
    assert!(outcome.stdout.contains("24 bytes omitted"));
    assert_eq!(sandbox.backend(), BackendKind::Container);
    assert!(sandbox.warning().is_none());
}

#[rstest]
#[case::short("hello", 10, "hello")]
#[case::exact("hello", 5, "hello")]
#[case::ascii("hello world", 5, "hello\n[output truncated: 6 bytes omitted]")]
#[case::multibyte("héllo", 2, "h\n[output truncated: 5 bytes omitted]")]
fn truncation_respects_char_boundaries(
    #[case] input: &str,
    #[case] limit: usize,
    #[case] expected: &str,
) {
    let mut text = input.to_owned();
    truncate_output(&mut text, limit);
    assert_eq!(text, expected);
}

#[rstest]
fn relative_workspace_is_anchored_once(validator: Arc<PolicyValidator>) {
    let sandbox = SandboxService::with_executor(
        Arc::new(refusing_executor()),
        validator,
        SandboxConfig::default(),
        "workspace",
    );

    assert!(sandbox.workspace().is_absolute());
    assert!(sandbox.workspace().ends_with("workspace"));
}
