//! Runner configuration
//!
//! Defines how job commands are handed to the host: which shell interprets
//! them and how output pipes are read.

use thiserror::Error;

const DEFAULT_SHELL: &str = "sh";
const DEFAULT_SHELL_ARG: &str = "-c";
const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// Runner configuration
///
/// A job's command is executed as `<shell> <shell_arg> <command>`, which gives
/// `sh -c <command>` semantics by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Shell interpreter used for every job
    pub shell: String,

    /// Argument telling the shell to read the command from the next argument
    pub shell_arg: String,

    /// Size of the buffer used when reading stdout/stderr pipes
    pub read_chunk_size: usize,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            shell_arg: DEFAULT_SHELL_ARG.to_string(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables (all optional):
    /// - SLUICE_SHELL (default: sh)
    /// - SLUICE_SHELL_ARG (default: -c)
    /// - SLUICE_READ_CHUNK_SIZE (bytes, default: 8192)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(shell) = lookup("SLUICE_SHELL") {
            config.shell = shell;
        }

        if let Some(shell_arg) = lookup("SLUICE_SHELL_ARG") {
            config.shell_arg = shell_arg;
        }

        if let Some(raw) = lookup("SLUICE_READ_CHUNK_SIZE") {
            config.read_chunk_size = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "SLUICE_READ_CHUNK_SIZE",
                    value: raw.clone(),
                })?;
        }

        Ok(config)
    }

    /// Overrides the shell interpreter
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shell.trim().is_empty() {
            return Err(ConfigError::Invalid("shell cannot be empty".to_string()));
        }

        if self.read_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "read_chunk_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
