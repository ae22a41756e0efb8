//! Sandbox configuration, loaded from the `[sandbox]` TOML section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ResourceLimits;

/// Preferred isolation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    /// Use a container when the runtime is reachable, else fall back.
    #[default]
    Container,
    /// Always run directly on the host.
    Direct,
}

/// Executor settings and per-request defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Preferred backend.
    pub mode: SandboxMode,
    /// Container runtime binary.
    pub runtime: String,
    /// Container image.
    pub image: String,
    /// Interpreter used for code payloads.
    pub interpreter: String,
    /// Default wall-clock budget per execution.
    pub default_timeout_secs: u64,
    /// Time allowed for teardown after a timeout.
    pub grace_secs: u64,
    /// Default memory ceiling in MiB.
    pub memory_mb: u32,
    /// Default CPU quota in thousandths of a CPU.
    pub cpu_millis: u32,
    /// Maximum number of processes inside a container.
    pub pids_limit: u32,
    /// Default network setting for requests.
    pub network_enabled: bool,
    /// Captured output beyond this many bytes per stream is discarded.
    pub output_limit_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::Container,
            runtime: "docker".to_owned(),
            image: "python:3.11-slim".to_owned(),
            interpreter: "python3".to_owned(),
            default_timeout_secs: 300,
            grace_secs: 5,
            memory_mb: 512,
            cpu_millis: 1000,
            pids_limit: 256,
            network_enabled: false,
            output_limit_bytes: 100_000,
        }
    }
}

impl SandboxConfig {
    /// Default per-request timeout.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Teardown grace period.
    #[must_use]
    pub const fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    /// Default resource ceilings.
    #[must_use]
    pub const fn limits(&self) -> ResourceLimits {
        ResourceLimits::new(self.memory_mb, self.cpu_millis)
    }
}
