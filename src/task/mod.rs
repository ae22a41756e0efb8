//! Persistent task store for Stagehand.
//!
//! This module owns the durable record of tasks and their append-only
//! checkpoint history. Every other component reads and writes task state
//! exclusively through the [`ports::TaskStore`] contract. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
