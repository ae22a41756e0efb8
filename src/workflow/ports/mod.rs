//! Port definitions for the workflow engine's collaborators.

pub mod approval;
pub mod model;

pub use approval::{ApprovalPrompt, PromptError};
pub use model::{ModelClient, ModelError, ModelResult};

#[cfg(test)]
pub use approval::MockApprovalPrompt;
#[cfg(test)]
pub use model::MockModelClient;
