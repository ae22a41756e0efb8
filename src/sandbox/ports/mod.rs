//! Port contracts for isolated execution.

pub mod executor;

pub use executor::IsolatedExecutor;
#[cfg(test)]
pub use executor::MockIsolatedExecutor;
