//! Application services for isolated execution.

mod service;

pub use service::{SandboxError, SandboxService, truncate_output};
