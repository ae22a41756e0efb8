//! Pre-flight policy checks for model-directed execution.
//!
//! Every check returns a [`Verdict`] and never fails. The checks are
//! heuristic defense in depth: the isolation provided by
//! [`crate::sandbox`] is the trust boundary, and a determined adversary can
//! phrase dangerous code in ways no pattern list anticipates.
//!
//! - Deny/allow lists and pattern tables in [`rules`]
//! - The configured validator, [`PolicyValidator`]

mod config;
pub mod rules;
mod validator;
mod verdict;

pub use config::PolicyConfig;
pub use validator::{PolicyError, PolicyValidator};
pub use verdict::Verdict;

#[cfg(test)]
mod tests;
