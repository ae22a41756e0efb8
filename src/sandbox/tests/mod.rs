//! Unit tests for the sandbox context.

mod container_tests;
mod service_tests;
