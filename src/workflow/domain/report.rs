//! Stage outputs persisted alongside the task.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool call made during implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Tool name.
    pub tool: String,
    /// Arguments as the model supplied them.
    pub arguments: Value,
    /// Text handed back to the model.
    pub result: String,
}

/// Result of the implementation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationReport {
    /// Whether the model finished within the iteration budget.
    pub success: bool,
    /// Final model message, or why the loop stopped.
    pub summary: String,
    /// Model round trips used.
    pub iterations: u32,
    /// Every tool call, in order.
    pub actions: Vec<ActionRecord>,
    /// Set when executions ran without container isolation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_warning: Option<String>,
}

/// Reviewer's recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    /// The reviewer recommends approval.
    Approve,
    /// The reviewer asks for changes.
    RequestChanges,
    /// The review named no decision.
    Unspecified,
}

impl ReviewVerdict {
    /// Extracts the verdict from free review text.
    ///
    /// The last decision keyword wins, so a closing "Decision: APPROVE"
    /// overrides an earlier mention of requested changes.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let upper = text.to_uppercase();
        let approve = upper.rfind("APPROVE");
        let changes = ["REQUEST_CHANGES", "REQUEST CHANGES", "CHANGES REQUESTED"]
            .iter()
            .filter_map(|marker| upper.rfind(marker))
            .max();
        match (approve, changes) {
            (Some(at), Some(other)) if at > other => Self::Approve,
            (_, Some(_)) => Self::RequestChanges,
            (Some(_), None) => Self::Approve,
            (None, None) => Self::Unspecified,
        }
    }
}

/// Result of the review stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Review text.
    pub text: String,
    /// Parsed recommendation.
    pub verdict: ReviewVerdict,
}

impl Review {
    /// Wraps review text and parses its verdict.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        let body: String = text.into();
        let verdict = ReviewVerdict::parse(&body);
        Self {
            text: body,
            verdict,
        }
    }
}

/// One verification command and how it went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCheck {
    /// Command that ran.
    pub command: Vec<String>,
    /// Whether it exited zero within its timeout.
    pub passed: bool,
    /// Exit code; `-1` when rejected, failed to start or timed out.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Rejection or execution error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the verification stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// `true` when every check passed, including when there were none.
    pub passed: bool,
    /// Checks in configured order.
    pub checks: Vec<VerificationCheck>,
}

impl VerificationReport {
    /// Builds a report, deriving `passed` from the checks.
    #[must_use]
    pub fn from_checks(checks: Vec<VerificationCheck>) -> Self {
        Self {
            passed: checks.iter().all(|check| check.passed),
            checks,
        }
    }
}
