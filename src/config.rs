//! Configuration System
//!
//! Host configuration with hierarchical sources (defaults, global file, workspace files,
//! environment) and validation. See [`ConfigLoader`].

use crate::context::{StackAffinity, DEFAULT_MAX_DEPTH};
use crate::debug::journal::DEFAULT_JOURNAL_CAPACITY;
use crate::error::HostError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Take the engine lock when entering a context scope once locking is active
    #[serde(default = "default_true")]
    pub auto_acquire: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { auto_acquire: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub affinity: StackAffinity,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            affinity: StackAffinity::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Contexts without a token share one default domain
    #[serde(default = "default_true")]
    pub allow_default_domain: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_default_domain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Enable the debugger when the runtime starts
    #[serde(default)]
    pub enabled: bool,

    /// Enter the command loop on exception events as well as breaks
    #[serde(default = "default_true")]
    pub break_on_exception: bool,

    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default = "default_journal_capacity")]
    pub journal_capacity: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            break_on_exception: true,
            prompt: default_prompt(),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_prompt() -> String {
    "dbg> ".to_string()
}

fn default_journal_capacity() -> usize {
    DEFAULT_JOURNAL_CAPACITY
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Logging(String),
    Context(String),
    Debug(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
            ValidationError::Context(msg) => write!(f, "Context: {}", msg),
            ValidationError::Debug(msg) => write!(f, "Debug: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl HostConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if self.context.max_depth == 0 {
            errors.push(ValidationError::Context(
                "max_depth must be at least 1".to_string(),
            ));
        }

        if self.debug.journal_capacity == 0 && self.debug.enabled {
            errors.push(ValidationError::Debug(
                "journal_capacity must be at least 1 when the debugger is enabled".to_string(),
            ));
        }
        if self.debug.prompt.contains('\n') {
            errors.push(ValidationError::Debug(
                "prompt must be a single line".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validation failures folded into one error.
    pub fn validated(self) -> Result<Self, HostError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            HostError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, HostError> {
        toml::to_string_pretty(self)
            .map_err(|e| HostError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
