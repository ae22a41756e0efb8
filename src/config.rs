//! Stagehand configuration, read from a TOML file.
//!
//! Every section is optional and every field falls back to its default, so
//! an empty file and a missing file both yield [`StagehandConfig::default`].
//!
//! ```toml
//! workspace = "work"
//!
//! [store]
//! path = "tasks.db"
//! backup_on_start = true
//!
//! [sandbox]
//! mode = "direct"
//!
//! [workflow]
//! verification_commands = [["pytest", "-q"]]
//! ```

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::PolicyConfig;
use crate::sandbox::domain::SandboxConfig;
use crate::workflow::domain::WorkflowConfig;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Configuration file.
        path: Utf8PathBuf,
        /// Parser error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// A value is out of range.
    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: Utf8PathBuf,
    /// Take a backup before any task runs.
    pub backup_on_start: bool,
    /// Where backups go; next to the database when unset.
    pub backup_dir: Option<Utf8PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from("stagehand.db"),
            backup_on_start: false,
            backup_dir: None,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagehandConfig {
    /// Host directory exposed to executions and file tools.
    pub workspace: Utf8PathBuf,
    /// Task store settings.
    pub store: StoreConfig,
    /// Executor settings.
    pub sandbox: SandboxConfig,
    /// Validator settings.
    pub policy: PolicyConfig,
    /// Engine settings.
    pub workflow: WorkflowConfig,
}

impl Default for StagehandConfig {
    fn default() -> Self {
        Self {
            workspace: Utf8PathBuf::from("workspace"),
            store: StoreConfig::default(),
            sandbox: SandboxConfig::default(),
            policy: PolicyConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl StagehandConfig {
    /// Parses and validates TOML text. `path` only labels errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml(text: &str, path: &Utf8Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and cross-section consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.workspace.as_str().trim().is_empty() {
            return invalid("workspace", "must not be empty");
        }
        if self.store.path.as_str().trim().is_empty() {
            return invalid("store.path", "must not be empty");
        }
        if self.sandbox.default_timeout_secs == 0 {
            return invalid("sandbox.default_timeout_secs", "must be > 0");
        }
        if self.sandbox.default_timeout_secs > self.policy.max_timeout_secs {
            return invalid(
                "sandbox.default_timeout_secs",
                "must not exceed policy.max_timeout_secs",
            );
        }
        if self.sandbox.memory_mb == 0 || self.sandbox.memory_mb > self.policy.max_memory_mb {
            return invalid("sandbox.memory_mb", "must be within 1..=policy.max_memory_mb");
        }
        if self.sandbox.cpu_millis == 0 || self.sandbox.cpu_millis > self.policy.max_cpu_millis {
            return invalid(
                "sandbox.cpu_millis",
                "must be within 1..=policy.max_cpu_millis",
            );
        }
        if self.sandbox.output_limit_bytes == 0 {
            return invalid("sandbox.output_limit_bytes", "must be > 0");
        }
        if self.sandbox.network_enabled && !self.policy.allow_network {
            return invalid("sandbox.network_enabled", "requires policy.allow_network");
        }
        if self.workflow.max_iterations == 0 {
            return invalid("workflow.max_iterations", "must be > 0");
        }
        if self.workflow.workers == 0 {
            return invalid("workflow.workers", "must be > 0");
        }
        if self.workflow.model_retry.max_attempts == 0 {
            return invalid("workflow.model_retry.max_attempts", "must be > 0");
        }
        if self
            .workflow
            .verification_commands
            .iter()
            .any(|argv| argv.first().is_none_or(|program| program.trim().is_empty()))
        {
            return invalid(
                "workflow.verification_commands",
                "must contain non-empty commands",
            );
        }
        Ok(())
    }
}

/// Loads configuration from `path`.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, parsed or
/// validated.
pub fn load_config(path: &Utf8Path) -> Result<StagehandConfig, ConfigError> {
    let read_error = |source| ConfigError::Read {
        path: path.to_owned(),
        source,
    };
    let Some(name) = path.file_name() else {
        return Err(read_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path has no file name",
        )));
    };
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));

    let text = match Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.read_to_string(name))
    {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let config = StagehandConfig::default();
            config.validate()?;
            return Ok(config);
        }
        Err(err) => return Err(read_error(err)),
    };
    StagehandConfig::from_toml(&text, path)
}
