//! Planning, implementation, review and verification of tasks with two
//! human approval gates.
//!
//! The [`services::WorkflowEngine`] moves a task through its states one
//! checkpoint at a time. Stage outputs come from a lead model (planning and
//! review) and a member model (implementation, through sandboxed tools).
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Console prompt and retrying model client in [`adapters`]
//! - Engine, stages and worker pool in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
