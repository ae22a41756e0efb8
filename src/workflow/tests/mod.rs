//! Unit tests for the workflow context.

mod support;
