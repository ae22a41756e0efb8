//! Domain model for the approval-gated workflow.

mod checkpoint;
mod config;
mod decision;
mod model;
mod outcome;
mod report;

pub use checkpoint::CheckpointData;
pub use config::{RetryPolicy, WorkflowConfig};
pub use decision::{Decision, Gate, INTERACTIVE_APPROVER, PROGRAMMATIC_APPROVER};
pub use model::{ChatMessage, ModelResponse, Role, TokenUsage, ToolCall, ToolSchema};
pub use outcome::{OutcomeStage, OutcomeStatus, StageSnapshot, WorkflowOutcome};
pub use report::{
    ActionRecord, ImplementationReport, Review, ReviewVerdict, VerificationCheck,
    VerificationReport,
};
