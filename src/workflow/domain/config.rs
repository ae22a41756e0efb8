//! Workflow settings, loaded from the `[workflow]` TOML section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine and stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Model round trips allowed in one implementation attempt.
    pub max_iterations: u32,
    /// Tasks a [`WorkflowPool`] drives at once.
    ///
    /// [`WorkflowPool`]: crate::workflow::services::WorkflowPool
    pub workers: usize,
    /// Commands run by the verification stage, each as argv.
    pub verification_commands: Vec<Vec<String>>,
    /// Name of the planning and review model, for logs.
    pub lead_model: String,
    /// Name of the implementation model, for logs.
    pub member_model: String,
    /// Backoff for transient model failures.
    pub model_retry: RetryPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            workers: 4,
            verification_commands: Vec::new(),
            lead_model: "qwen3".to_owned(),
            member_model: "qwen3-coder".to_owned(),
            model_retry: RetryPolicy::default(),
        }
    }
}

/// Backoff settings for model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based): the initial delay
    /// doubled `retry` times, capped at the maximum.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1_u64.checked_shl(retry).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.initial_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}
