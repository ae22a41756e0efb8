//! Step definitions for workflow resume scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
