//! Stagehand: approval-gated, resumable automation tasks.
//!
//! A task moves through planning, implementation, review and verification.
//! A human approves the plan and the finished implementation. Model-directed
//! commands and code run through a policy check and then an isolated
//! executor, and every stage transition is checkpointed so a task interrupted
//! by a crash resumes where it stopped.
//!
//! # Architecture
//!
//! Each bounded context follows hexagonal architecture principles:
//!
//! - **Domain**: Pure types and state machines with no infrastructure
//!   dependencies
//! - **Ports**: Async trait interfaces for storage, models, execution and
//!   approvals
//! - **Adapters**: `SQLite` and in-memory stores, container and direct
//!   executors, a console prompt
//! - **Services**: The workflow engine and the policy-gated sandbox facade
//!
//! # Modules
//!
//! - [`policy`]: Pre-flight validation of commands, code, limits and paths
//! - [`sandbox`]: Isolated execution with container and direct backends
//! - [`task`]: Durable tasks and their checkpoint history
//! - [`workflow`]: The gated, resumable workflow engine
//! - [`config`]: TOML configuration
//! - [`telemetry`]: Tracing subscriber setup
//! - [`app`]: Assembly of a configured instance

pub mod app;
pub mod config;
pub mod policy;
pub mod sandbox;
pub mod task;
pub mod telemetry;
pub mod workflow;
