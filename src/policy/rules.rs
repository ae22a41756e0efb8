//! Built-in deny/allow lists, marker tables and code pattern heuristics.
//!
//! Each rule is a pure function over its input. The validator composes
//! them with the configured lists.

use std::path::Path;

/// Commands that are always refused, whatever the allow list says.
pub const DEFAULT_DENIED: &[&str] = &[
    "rm", "rmdir", "del", "format", "dd", "mkfs", "shutdown", "reboot", "halt", "poweroff", "nc",
    "netcat", "telnet", "wget", "curl", "chmod", "chown", "chgrp", "su", "sudo", "doas", "passwd",
    "useradd", "userdel", "usermod", "iptables", "nft", "ufw", "systemctl", "service", "crontab",
    "at",
];

/// Commands permitted in strict mode.
pub const DEFAULT_ALLOWED: &[&str] = &[
    "python3", "python", "pip", "pytest", "unittest", "git", "ls", "cat", "echo", "grep", "find",
    "sed", "awk", "mkdir", "touch", "cp", "mv", "head", "tail", "wc", "sort", "uniq", "diff",
    "patch", "tar", "gzip", "gunzip", "zip", "unzip",
];

/// Substrings that indicate an attempt to leave the working directory.
/// Matched against the lowercased argument.
pub const TRAVERSAL_MARKERS: &[&str] = &["../", "..\\", "%2e%2e", "...."];

/// Substrings that would be interpreted by a shell.
pub const INJECTION_MARKERS: &[&str] = &[";", "|", "&", "`", "$(", "\n", "\r"];

/// Path fragments that name credentials or repository internals.
pub const SENSITIVE_PATH_FRAGMENTS: &[&str] = &[
    ".env",
    ".git",
    ".ssh",
    "id_rsa",
    "private_key",
    "credentials",
    "secrets",
    "password",
    "token",
];

/// Family a dangerous code pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCategory {
    /// `eval`, `exec`, `compile`, `__import__`.
    DynamicExecution,
    /// Shelling out to the host.
    OsCommand,
    /// Deserializers that can run code.
    UnsafeDeserialization,
    /// Reads of system directories and credential files.
    SensitivePath,
    /// Tampering with the interpreter recursion limit.
    RecursionLimit,
    /// Sockets and HTTP clients; only checked when network is disabled.
    Network,
}

impl PatternCategory {
    /// Prefix used in rejection reasons.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "Network operations not allowed",
            Self::RecursionLimit => "Modifying recursion limit not allowed",
            Self::DynamicExecution
            | Self::OsCommand
            | Self::UnsafeDeserialization
            | Self::SensitivePath => "Dangerous pattern detected",
        }
    }
}

/// Pattern sources, compiled case-insensitively by the validator.
pub const CODE_PATTERNS: &[(PatternCategory, &str)] = &[
    (PatternCategory::OsCommand, r"os\.system\s*\("),
    (PatternCategory::OsCommand, r"os\.popen\s*\("),
    (PatternCategory::OsCommand, r"subprocess\.(call|run|popen|check_output|check_call)\s*\("),
    (PatternCategory::OsCommand, r"shell\s*=\s*true"),
    (
        PatternCategory::DynamicExecution,
        r"(^|[^.\w])(eval|exec|compile|__import__)\s*\(",
    ),
    (
        PatternCategory::DynamicExecution,
        r"\b(builtins|__builtins__)\s*\.\s*(eval|exec|compile|__import__)\s*\(",
    ),
    (
        PatternCategory::DynamicExecution,
        r"getattr\s*\(\s*(builtins|__builtins__)\b",
    ),
    (PatternCategory::UnsafeDeserialization, r"pickle\.loads?\s*\("),
    (PatternCategory::UnsafeDeserialization, r"marshal\.loads?\s*\("),
    (PatternCategory::UnsafeDeserialization, r"yaml\.load\s*\("),
    (
        PatternCategory::SensitivePath,
        r#"open\s*\(\s*['"]/(etc|bin|boot|dev|proc|sys)"#,
    ),
    (PatternCategory::SensitivePath, r"/etc/(passwd|shadow|sudoers)"),
    (PatternCategory::RecursionLimit, r"sys\.setrecursionlimit"),
    (PatternCategory::Network, r"(import|from)\s+socket"),
    (PatternCategory::Network, r"socket\."),
    (PatternCategory::Network, r"(import|from)\s+urllib"),
    (PatternCategory::Network, r"urllib\."),
    (PatternCategory::Network, r"(import|from)\s+requests"),
    (PatternCategory::Network, r"requests\."),
    (PatternCategory::Network, r"(import|from)\s+http"),
    (PatternCategory::Network, r"http\.client"),
];

/// Returns the executable name of `program`, stripped of any directory.
#[must_use]
pub fn base_command(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(program)
}

/// Returns `true` when `arg` contains a traversal marker, in any case.
#[must_use]
pub fn has_traversal(arg: &str) -> bool {
    let lowered = arg.to_lowercase();
    TRAVERSAL_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Returns `true` when `arg` contains a shell metacharacter sequence.
#[must_use]
pub fn has_injection(arg: &str) -> bool {
    INJECTION_MARKERS.iter().any(|marker| arg.contains(marker))
}

/// Returns the first sensitive fragment `path` contains, if any.
#[must_use]
pub fn sensitive_fragment(path: &str) -> Option<&'static str> {
    let lowered = path.to_lowercase();
    SENSITIVE_PATH_FRAGMENTS
        .iter()
        .copied()
        .find(|fragment| lowered.contains(fragment))
}
