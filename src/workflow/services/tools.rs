//! Tools offered to the implementation model.
//!
//! File tools operate through a capability handle on the workspace, so a
//! path can never resolve outside it even when the policy check misses a
//! trick. Execution tools go through the [`SandboxService`].

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::sandbox::domain::ExecutionOutcome;
use crate::sandbox::services::SandboxService;
use crate::workflow::domain::{ToolCall, ToolSchema};

#[derive(Debug, Deserialize)]
struct RunCommandArgs {
    argv: Vec<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RunCodeArgs {
    code: String,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListFilesArgs {
    path: Option<String>,
}

/// JSON schemas of every tool, in the order they are offered.
#[must_use]
pub fn tool_schemas() -> Vec<ToolSchema> {
    let timeout = json!({"type": "integer", "description": "Timeout in seconds"});
    vec![
        ToolSchema {
            name: "run_command".to_owned(),
            description: "Run a command (argv form, no shell) in the sandbox".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "argv": {"type": "array", "items": {"type": "string"}},
                    "timeout_secs": timeout,
                },
                "required": ["argv"],
            }),
        },
        ToolSchema {
            name: "run_code".to_owned(),
            description: "Run source code with the sandbox interpreter".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string"},
                    "timeout_secs": timeout,
                },
                "required": ["code"],
            }),
        },
        ToolSchema {
            name: "read_file".to_owned(),
            description: "Read a workspace file".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
        },
        ToolSchema {
            name: "write_file".to_owned(),
            description: "Create or overwrite a workspace file".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                },
                "required": ["path", "content"],
            }),
        },
        ToolSchema {
            name: "list_files".to_owned(),
            description: "List a workspace directory".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
            }),
        },
    ]
}

/// Executes tool calls against one workspace.
pub struct WorkspaceTools {
    sandbox: Arc<SandboxService>,
    workspace: Dir,
}

impl WorkspaceTools {
    /// Binds the tools to `workspace`, an open handle on the sandbox
    /// workspace directory.
    #[must_use]
    pub const fn new(sandbox: Arc<SandboxService>, workspace: Dir) -> Self {
        Self { sandbox, workspace }
    }

    /// Runs `call` and returns the text handed back to the model. Failures,
    /// including policy rejections, are reported in that text.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        debug!(tool = %call.name, "dispatching tool call");
        match call.name.as_str() {
            "run_command" => match parse::<RunCommandArgs>(call) {
                Ok(args) => {
                    let outcome = self
                        .sandbox
                        .run_command(args.argv, args.timeout_secs.map(Duration::from_secs))
                        .await;
                    format_outcome(&outcome)
                }
                Err(message) => message,
            },
            "run_code" => match parse::<RunCodeArgs>(call) {
                Ok(args) => {
                    let outcome = self
                        .sandbox
                        .run_code(args.code, args.timeout_secs.map(Duration::from_secs))
                        .await;
                    format_outcome(&outcome)
                }
                Err(message) => message,
            },
            "read_file" => parse::<ReadFileArgs>(call)
                .and_then(|args| self.read_file(&args.path))
                .unwrap_or_else(|message| message),
            "write_file" => parse::<WriteFileArgs>(call)
                .and_then(|args| self.write_file(&args.path, &args.content))
                .unwrap_or_else(|message| message),
            "list_files" => parse::<ListFilesArgs>(call)
                .and_then(|args| self.list_files(args.path.as_deref()))
                .unwrap_or_else(|message| message),
            other => format!("Error: Tool {other} not found"),
        }
    }

    fn checked<'a>(&self, path: &'a str) -> Result<&'a Utf8Path, String> {
        let verdict = self.sandbox.validator().validate_path(path);
        if verdict.is_accepted() {
            return Ok(Utf8Path::new(path));
        }
        Err(format!(
            "Error: {}",
            verdict.reason.unwrap_or_else(|| "path refused".to_owned())
        ))
    }

    fn read_file(&self, path: &str) -> Result<String, String> {
        let relative = self.checked(path)?;
        self.workspace
            .read_to_string(relative)
            .map_err(|err| format!("Error reading {path}: {err}"))
    }

    fn write_file(&self, path: &str, content: &str) -> Result<String, String> {
        let relative = self.checked(path)?;
        if let Some(parent) = relative.parent().filter(|parent| !parent.as_str().is_empty()) {
            self.workspace
                .create_dir_all(parent)
                .map_err(|err| format!("Error creating {parent}: {err}"))?;
        }
        self.workspace
            .write(relative, content)
            .map_err(|err| format!("Error writing {path}: {err}"))?;
        Ok(format!("Wrote {} bytes to {path}", content.len()))
    }

    fn list_files(&self, path: Option<&str>) -> Result<String, String> {
        let listing = match path {
            Some(relative) => self.workspace.read_dir(self.checked(relative)?),
            None => self.workspace.entries(),
        }
        .map_err(|err| format!("Error listing {}: {err}", path.unwrap_or(".")))?;
        let mut names: Vec<String> = listing
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().ok()?;
                let is_dir = entry.file_type().is_ok_and(|kind| kind.is_dir());
                Some(if is_dir { format!("{name}/") } else { name })
            })
            .collect();
        names.sort();
        if names.is_empty() {
            return Ok("(empty)".to_owned());
        }
        Ok(names.join("\n"))
    }
}

fn parse<T: DeserializeOwned>(call: &ToolCall) -> Result<T, String> {
    let arguments = match &call.arguments {
        Value::Null => json!({}),
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| json!({})),
        other => other.clone(),
    };
    serde_json::from_value(arguments)
        .map_err(|err| format!("Error: invalid arguments for {}: {err}", call.name))
}

/// Renders an execution outcome as tool-result text.
#[must_use]
pub fn format_outcome(outcome: &ExecutionOutcome) -> String {
    let mut text = format!("exit_code: {}\n", outcome.exit_code);
    if outcome.timed_out {
        text.push_str("timed_out: true\n");
    }
    if let Some(error) = &outcome.error {
        text.push_str(&format!("error: {error}\n"));
    }
    text.push_str(&format!(
        "stdout:\n{}\nstderr:\n{}",
        outcome.stdout, outcome.stderr
    ));
    text
}
