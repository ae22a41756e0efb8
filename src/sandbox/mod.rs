//! Isolated execution of model-directed commands and code.
//!
//! Requests pass through [`services::SandboxService`], which applies the
//! [`crate::policy`] checks before handing them to an
//! [`ports::IsolatedExecutor`]. Two executors exist: a container backend,
//! which is the isolation boundary, and a direct fallback that provides none.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Executor implementations and selection in [`adapters`]
//! - Policy-gated facade in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
