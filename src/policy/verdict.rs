//! Outcome of a single policy check.

use serde::{Deserialize, Serialize};

/// Accept or reject, with a human-readable reason on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the checked input may proceed.
    pub accepted: bool,
    /// Why the input was rejected; `None` when accepted.
    pub reason: Option<String>,
}

impl Verdict {
    /// An accepting verdict.
    #[must_use]
    pub const fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    /// A rejecting verdict carrying `reason`.
    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }

    /// Returns `true` when the input may proceed.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Chains another check, evaluated only if this one accepted.
    #[must_use]
    pub fn and_then(self, next: impl FnOnce() -> Self) -> Self {
        if self.accepted { next() } else { self }
    }
}
