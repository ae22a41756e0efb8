//! Argument building for the container backend.

use std::time::Duration;

use crate::sandbox::adapters::{ContainerExecutor, ContainerSpec, container_args};
use crate::config::StagehandConfig;
use crate::sandbox::domain::{
    ExecutionPayload, ExecutionRequest, ResourceLimits, SandboxConfig,
};
use crate::sandbox::ports::IsolatedExecutor;
use rstest::{fixture, rstest};

#[fixture]
fn spec() -> ContainerSpec {
    ContainerSpec {
        image: "python:3.11-slim".to_owned(),
        interpreter: "python3".to_owned(),
        pids_limit: 64,
        user: "1000:1000".to_owned(),
    }
}

fn command_request() -> ExecutionRequest {
    ExecutionRequest::new(
        ExecutionPayload::Command(vec!["ls".to_owned(), "-la".to_owned()]),
        "/srv/work",
    )
    .with_limits(ResourceLimits::new(256, 500))
}

fn args_for(spec: &ContainerSpec, request: &ExecutionRequest) -> Vec<String> {
    container_args("stagehand-test", spec, request).expect("workspace resolves")
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

#[rstest]
fn run_arguments_apply_every_restriction(spec: ContainerSpec) {
    let args = args_for(&spec, &command_request());

    assert_eq!(args.first().map(String::as_str), Some("run"));
    assert!(args.contains(&"--rm".to_owned()));
    assert_eq!(flag_value(&args, "--name"), Some("stagehand-test"));
    assert_eq!(flag_value(&args, "--network"), Some("none"));
    assert_eq!(flag_value(&args, "--memory"), Some("256m"));
    assert_eq!(flag_value(&args, "--memory-swap"), Some("256m"));
    assert_eq!(flag_value(&args, "--cpu-period"), Some("100000"));
    assert_eq!(flag_value(&args, "--cpu-quota"), Some("50000"));
    assert_eq!(flag_value(&args, "--pids-limit"), Some("64"));
    assert_eq!(flag_value(&args, "--user"), Some("1000:1000"));
    assert_eq!(flag_value(&args, "--cap-drop"), Some("ALL"));
    assert_eq!(flag_value(&args, "--security-opt"), Some("no-new-privileges"));
    assert_eq!(flag_value(&args, "-v"), Some("/srv/work:/workspace"));
    assert_eq!(flag_value(&args, "-w"), Some("/workspace"));
}

#[rstest]
fn workspace_is_the_only_bind_mount(spec: ContainerSpec) {
    let args = args_for(&spec, &command_request());
    let mounts = args.iter().filter(|arg| *arg == "-v" || *arg == "--volume").count();
    assert_eq!(mounts, 1);
}

#[rstest]
fn command_follows_the_image(spec: ContainerSpec) {
    let args = args_for(&spec, &command_request());
    let tail: Vec<&str> = args.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["python:3.11-slim", "ls", "-la"]);
}

#[rstest]
fn code_runs_through_the_interpreter(spec: ContainerSpec) {
    let request = ExecutionRequest::new(ExecutionPayload::Code("print(1)".to_owned()), "/srv/work");
    let args = args_for(&spec, &request);
    let tail: Vec<&str> = args.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["python3", "-c", "print(1)"]);
}

#[rstest]
fn network_flag_is_omitted_when_enabled(spec: ContainerSpec) {
    let request = command_request().with_network(true);
    let args = args_for(&spec, &request);
    assert!(flag_value(&args, "--network").is_none());
}

#[rstest]
fn relative_workspace_mounts_as_a_host_path(spec: ContainerSpec) {
    let config = StagehandConfig::default();
    assert!(config.workspace.is_relative());
    let request = ExecutionRequest::new(
        ExecutionPayload::Command(vec!["ls".to_owned()]),
        config.workspace.clone(),
    );

    let args = args_for(&spec, &request);

    let mount = flag_value(&args, "-v").expect("workspace mount present");
    let (source, target) = mount.rsplit_once(':').expect("source:target mount");
    assert!(source.starts_with('/'), "mount source {source} is not a host path");
    assert!(source.ends_with(config.workspace.as_str()));
    assert_eq!(target, "/workspace");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Docker daemon"]
async fn container_timeout_kills_and_removes_the_container() {
    let workspace = tempfile::tempdir().expect("create workspace");
    let path = camino::Utf8Path::from_path(workspace.path()).expect("utf-8 temp path");
    let executor = ContainerExecutor::new(&SandboxConfig::default());
    let request = ExecutionRequest::new(
        ExecutionPayload::Command(vec!["sleep".to_owned(), "30".to_owned()]),
        path,
    )
    .with_timeout(Duration::from_secs(2));

    let started = std::time::Instant::now();
    let outcome = executor.execute(&request).await;

    assert!(outcome.timed_out);
    assert_eq!(outcome.exit_code, -1);
    assert!(started.elapsed() < Duration::from_secs(15));
}
