//! Approval gates and the decisions callers make at them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Approver recorded for decisions taken through an [`ApprovalPrompt`].
///
/// [`ApprovalPrompt`]: crate::workflow::ports::ApprovalPrompt
pub const INTERACTIVE_APPROVER: &str = "user_interactive";

/// Default approver for decisions submitted through the engine API.
pub const PROGRAMMATIC_APPROVER: &str = "user_programmatic";

/// The two points where a human must decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// After planning.
    Plan,
    /// After implementation, review and verification.
    Implementation,
}

impl Gate {
    /// Returns the gate name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Implementation => "implementation",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision at an approval gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Proceed.
    Approve {
        /// Who approved.
        by: String,
    },
    /// Stop the task.
    Reject {
        /// Why.
        reason: String,
    },
    /// Redo the stage with feedback.
    RequestChanges {
        /// What to change.
        feedback: String,
    },
    /// Re-run implementation against the approved plan. Implementation gate
    /// only.
    Retry {
        /// Optional guidance for the new attempt.
        feedback: Option<String>,
    },
}

impl Decision {
    /// Approval by `by`.
    #[must_use]
    pub fn approve(by: impl Into<String>) -> Self {
        Self::Approve { by: by.into() }
    }

    /// Rejection for `reason`.
    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    /// A change request carrying `feedback`.
    #[must_use]
    pub fn request_changes(feedback: impl Into<String>) -> Self {
        Self::RequestChanges {
            feedback: feedback.into(),
        }
    }

    /// Returns the decision kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::RequestChanges { .. } => "request_changes",
            Self::Retry { .. } => "retry",
        }
    }
}
