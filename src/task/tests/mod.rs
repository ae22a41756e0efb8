//! Unit tests for the task store context.

mod domain_tests;
