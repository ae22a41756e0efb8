//! Configured policy validator.

use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use super::{
    PolicyConfig, Verdict,
    rules::{
        CODE_PATTERNS, DEFAULT_ALLOWED, DEFAULT_DENIED, PatternCategory, base_command,
        has_injection, has_traversal, sensitive_fragment,
    },
};
use crate::sandbox::domain::ResourceLimits;

/// Errors raised while building a validator.
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    /// A code pattern failed to compile.
    #[error("invalid code pattern `{pattern}`: {message}")]
    InvalidPattern {
        /// Offending pattern source.
        pattern: String,
        /// Compiler message.
        message: String,
    },
}

/// Stateless, thread-safe set of pre-flight checks.
#[derive(Debug, Clone)]
pub struct PolicyValidator {
    config: PolicyConfig,
    denied: BTreeSet<String>,
    allowed: BTreeSet<String>,
    patterns: Vec<(PatternCategory, Regex)>,
}

impl PolicyValidator {
    /// Builds a validator from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidPattern`] if a built-in pattern fails to
    /// compile.
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        let patterns = CODE_PATTERNS
            .iter()
            .map(|(category, source)| {
                RegexBuilder::new(source)
                    .case_insensitive(true)
                    .multi_line(true)
                    .build()
                    .map(|regex| (*category, regex))
                    .map_err(|err| PolicyError::InvalidPattern {
                        pattern: (*source).to_owned(),
                        message: err.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let denied = DEFAULT_DENIED
            .iter()
            .map(|name| (*name).to_owned())
            .chain(config.extra_denied.iter().cloned())
            .collect();
        let allowed = DEFAULT_ALLOWED
            .iter()
            .map(|name| (*name).to_owned())
            .chain(config.extra_allowed.iter().cloned())
            .collect();

        Ok(Self {
            config,
            denied,
            allowed,
            patterns,
        })
    }

    /// Returns the configuration this validator was built from.
    #[must_use]
    pub const fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Checks an argv-style command.
    ///
    /// The deny list wins over the allow list; in strict mode the base
    /// command must also be allowed. Every argument is scanned for traversal
    /// and shell injection markers.
    #[must_use]
    pub fn validate_command(&self, argv: &[String]) -> Verdict {
        let Some((program, args)) = argv.split_first() else {
            return Verdict::reject("Empty command");
        };
        let base = base_command(program);
        if base.trim().is_empty() {
            return Verdict::reject("Empty command");
        }
        if self.denied.contains(base) {
            return Verdict::reject(format!("Blacklisted command: {base}"));
        }
        if self.config.strict && !self.allowed.contains(base) {
            return Verdict::reject(format!("Command not in whitelist: {base}"));
        }

        for arg in args {
            if has_traversal(arg) {
                return Verdict::reject(format!("Potential path traversal detected: {arg}"));
            }
            if has_injection(arg) {
                return Verdict::reject(format!("Potential command injection detected: {arg}"));
            }
        }
        Verdict::accept()
    }

    /// Scans source code for dangerous constructs.
    ///
    /// Network patterns are only enforced when `network_enabled` is false.
    #[must_use]
    pub fn validate_code(&self, code: &str, network_enabled: bool) -> Verdict {
        self.patterns
            .iter()
            .filter(|(category, _)| !(network_enabled && *category == PatternCategory::Network))
            .find_map(|(category, regex)| {
                regex.find(code).map(|found| {
                    Verdict::reject(format!("{}: {}", category.label(), found.as_str().trim()))
                })
            })
            .unwrap_or_else(Verdict::accept)
    }

    /// Checks requested limits against the configured maxima.
    #[must_use]
    pub fn validate_limits(&self, limits: &ResourceLimits, timeout: Duration) -> Verdict {
        let max_timeout = Duration::from_secs(self.config.max_timeout_secs);
        if limits.memory_mb == 0 {
            return Verdict::reject("Memory limit must be positive");
        }
        if limits.memory_mb > self.config.max_memory_mb {
            return Verdict::reject(format!(
                "Memory limit too high: {}MB (max: {}MB)",
                limits.memory_mb, self.config.max_memory_mb
            ));
        }
        if limits.cpu_millis == 0 {
            return Verdict::reject("CPU quota must be positive");
        }
        if limits.cpu_millis > self.config.max_cpu_millis {
            return Verdict::reject(format!(
                "CPU quota too high: {} millicpus (max: {})",
                limits.cpu_millis, self.config.max_cpu_millis
            ));
        }
        if timeout.is_zero() {
            return Verdict::reject("Timeout must be positive");
        }
        if timeout > max_timeout {
            return Verdict::reject(format!(
                "Timeout too high: {}s (max: {}s)",
                timeout.as_secs(),
                self.config.max_timeout_secs
            ));
        }
        Verdict::accept()
    }

    /// Checks whether a request may enable networking.
    #[must_use]
    pub fn validate_network(&self, network_enabled: bool) -> Verdict {
        if network_enabled && !self.config.allow_network {
            return Verdict::reject("Network access not allowed by policy");
        }
        Verdict::accept()
    }

    /// Checks a workspace-relative path used by the file tools.
    #[must_use]
    pub fn validate_path(&self, relative: &str) -> Verdict {
        if relative.trim().is_empty() {
            return Verdict::reject("Empty path");
        }
        if has_traversal(relative) {
            return Verdict::reject(format!("Potential path traversal detected: {relative}"));
        }
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => {
                    return Verdict::reject(format!("Path outside workspace: {relative}"));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Verdict::reject(format!("Absolute paths not allowed: {relative}"));
                }
            }
        }
        if let Some(fragment) = sensitive_fragment(relative) {
            return Verdict::reject(format!(
                "Access to sensitive file not allowed: {relative} (matches {fragment})"
            ));
        }
        Verdict::accept()
    }
}
