//! Policy configuration, loaded from the `[policy]` TOML section.

use serde::{Deserialize, Serialize};

/// Tunables for [`super::PolicyValidator`].
///
/// The deny and allow lists start from the built-in defaults in
/// [`super::rules`]; the `extra_*` fields only ever extend them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Require every command to be on the allow list.
    pub strict: bool,
    /// Permit requests that ask for network access.
    pub allow_network: bool,
    /// Commands added to the allow list.
    pub extra_allowed: Vec<String>,
    /// Commands added to the deny list.
    pub extra_denied: Vec<String>,
    /// Largest memory limit a request may ask for.
    pub max_memory_mb: u32,
    /// Longest timeout a request may ask for.
    pub max_timeout_secs: u64,
    /// Largest CPU quota a request may ask for, in thousandths of a CPU.
    pub max_cpu_millis: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            strict: true,
            allow_network: false,
            extra_allowed: Vec::new(),
            extra_denied: Vec::new(),
            max_memory_mb: 1024,
            max_timeout_secs: 600,
            max_cpu_millis: 4000,
        }
    }
}
