//! The four stage computations. Each is pure with respect to the store: it
//! returns an output and leaves persistence to the engine.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use super::prompts::{self, render};
use super::tools::{WorkspaceTools, tool_schemas};
use super::StageError;
use crate::sandbox::services::SandboxService;
use crate::workflow::domain::{
    ActionRecord, ChatMessage, ImplementationReport, Review, VerificationCheck,
    VerificationReport, WorkflowConfig,
};
use crate::workflow::ports::ModelClient;

/// Model clients, sandbox and settings shared by every stage.
#[derive(Clone)]
pub struct Stages {
    lead: Arc<dyn ModelClient>,
    member: Arc<dyn ModelClient>,
    sandbox: Arc<SandboxService>,
    config: WorkflowConfig,
}

impl Stages {
    /// Bundles the stage collaborators.
    #[must_use]
    pub const fn new(
        lead: Arc<dyn ModelClient>,
        member: Arc<dyn ModelClient>,
        sandbox: Arc<SandboxService>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            lead,
            member,
            sandbox,
            config,
        }
    }

    /// Settings in force.
    #[must_use]
    pub const fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Asks the lead model for a plan. `revision` carries the previous plan
    /// and the requested changes.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] when a prompt fails to render or the model
    /// call fails.
    pub async fn plan(
        &self,
        request: &str,
        revision: Option<(&str, &str)>,
    ) -> Result<String, StageError> {
        let prompt = match revision {
            Some((plan, feedback)) => render(
                "revision",
                prompts::REVISION,
                json!({"request": request, "plan": plan, "feedback": feedback}),
            )?,
            None => render("planning", prompts::PLANNING, json!({"request": request}))?,
        };
        info!(model = %self.config.lead_model, revision = revision.is_some(), "planning");
        let messages = [ChatMessage::system(prompts::LEAD_SYSTEM), ChatMessage::user(prompt)];
        let response = self.lead.generate(&messages, &[]).await?;
        Ok(response.content)
    }

    /// Runs the implementation tool loop.
    ///
    /// The loop ends when the model answers without tool calls or the
    /// iteration budget is spent. A model failure mid-loop ends the stage
    /// with an error.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] when the workspace is unusable or a model call
    /// fails.
    pub async fn implement(
        &self,
        plan: &str,
        feedback: Option<&str>,
    ) -> Result<ImplementationReport, StageError> {
        let workspace = self.sandbox.ensure_workspace()?;
        let tools = WorkspaceTools::new(Arc::clone(&self.sandbox), workspace);
        let schemas = tool_schemas();
        let prompt = render(
            "implementation",
            prompts::IMPLEMENTATION,
            json!({"plan": plan, "feedback": feedback}),
        )?;
        let mut messages = vec![
            ChatMessage::system(prompts::MEMBER_SYSTEM),
            ChatMessage::user(prompt),
        ];
        let mut actions = Vec::new();
        let sandbox_warning = self.sandbox.warning().map(str::to_owned);
        info!(
            model = %self.config.member_model,
            backend = %self.sandbox.backend(),
            max_iterations = self.config.max_iterations,
            "implementing"
        );

        for iteration in 1..=self.config.max_iterations {
            let response = self.member.generate(&messages, &schemas).await?;
            messages.push(ChatMessage::assistant(&response));
            if response.tool_calls.is_empty() {
                let summary = if response.content.trim().is_empty() {
                    "Task completed".to_owned()
                } else {
                    response.content
                };
                return Ok(ImplementationReport {
                    success: true,
                    summary,
                    iterations: iteration,
                    actions,
                    sandbox_warning,
                });
            }
            for call in &response.tool_calls {
                let result = tools.dispatch(call).await;
                debug!(iteration, tool = %call.name, "tool call finished");
                messages.push(ChatMessage::tool_result(call, result.clone()));
                actions.push(ActionRecord {
                    tool: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result,
                });
            }
        }

        warn!(max_iterations = self.config.max_iterations, "iteration budget exhausted");
        Ok(ImplementationReport {
            success: false,
            summary: "Max iterations reached without completion".to_owned(),
            iterations: self.config.max_iterations,
            actions,
            sandbox_warning,
        })
    }

    /// Asks the lead model to review `report` against `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] when a prompt fails to render or the model
    /// call fails.
    pub async fn review(
        &self,
        plan: &str,
        report: &ImplementationReport,
    ) -> Result<Review, StageError> {
        let implementation = serde_json::to_string_pretty(report)?;
        let prompt = render(
            "review",
            prompts::REVIEW,
            json!({"plan": plan, "implementation": implementation}),
        )?;
        info!(model = %self.config.lead_model, "reviewing");
        let messages = [ChatMessage::system(prompts::LEAD_SYSTEM), ChatMessage::user(prompt)];
        let response = self.lead.generate(&messages, &[]).await?;
        Ok(Review::from_text(response.content))
    }

    /// Runs every configured verification command in the sandbox. A failing
    /// command fails its check, not the stage.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Sandbox`] when the workspace is unusable.
    pub async fn verify(&self) -> Result<VerificationReport, StageError> {
        self.sandbox.ensure_workspace()?;
        let mut checks = Vec::with_capacity(self.config.verification_commands.len());
        for command in &self.config.verification_commands {
            let outcome = self.sandbox.run_command(command.clone(), None).await;
            let passed = outcome.succeeded();
            if !passed {
                warn!(command = ?command, exit_code = outcome.exit_code, "verification check failed");
            }
            checks.push(VerificationCheck {
                command: command.clone(),
                passed,
                exit_code: outcome.exit_code,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                error: outcome.error,
            });
        }
        let report = VerificationReport::from_checks(checks);
        info!(passed = report.passed, checks = report.checks.len(), "verification finished");
        Ok(report)
    }
}
