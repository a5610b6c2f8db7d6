//! Error types for the script host.
//!
//! Structural misuse of the stack and lock APIs (`ContextError`, `LockError`) indicates a
//! host bug and is never silently recovered. Script errors and access denials are ordinary,
//! recoverable outcomes the host is expected to handle.

use crate::types::ContextId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An error raised by the wrapped engine while compiling or running script.
///
/// Surfaced to the host unchanged; every field is whatever the engine reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptError {
    pub name: String,
    pub message: String,
    pub script_name: Option<String>,
    pub line_number: Option<u32>,
    pub start_position: Option<u32>,
    pub end_position: Option<u32>,
    pub start_column: Option<u32>,
    pub end_column: Option<u32>,
    pub source_line: Option<String>,
    pub stack_trace: Option<String>,
}

impl ScriptError {
    /// Error with a name and message and no location information.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// A value thrown by script that is not an error object (`throw "test"`).
    pub fn thrown(value: impl Into<String>) -> Self {
        Self::new("", value)
    }

    pub fn with_location(mut self, script_name: impl Into<String>, line: u32, column: u32) -> Self {
        self.script_name = Some(script_name.into());
        self.line_number = Some(line);
        self.start_column = Some(column);
        self
    }

    pub fn with_source_line(mut self, line: impl Into<String>) -> Self {
        self.source_line = Some(line.into());
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSError: ")?;
        if self.name.is_empty() {
            write!(f, "{}", self.message)?;
        } else {
            write!(f, "{}: {}", self.name, self.message)?;
        }
        if let (Some(script), Some(line)) = (&self.script_name, self.line_number) {
            write!(
                f,
                " ( {} @ {} : {} ) ",
                script,
                line,
                self.start_column.unwrap_or(0)
            )?;
        }
        if let Some(source_line) = &self.source_line {
            write!(f, " -> {}", source_line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ScriptError {}

/// Context stack discipline violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("leave({0}) called with an empty context stack")]
    LeaveOnEmptyStack(ContextId),

    #[error("leave({expected}) does not match the current context {found}")]
    LeaveMismatch { expected: ContextId, found: ContextId },

    #[error("no context has been entered")]
    NotInContext,

    #[error("context stack depth {0} exceeded")]
    DepthExceeded(usize),
}

/// Which cross-context operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOperation {
    Read,
    Write,
    Delete,
    Enumerate,
}

impl fmt::Display for AccessOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessOperation::Read => "read",
            AccessOperation::Write => "write",
            AccessOperation::Delete => "delete",
            AccessOperation::Enumerate => "enumerate",
        };
        f.write_str(s)
    }
}

/// Cross-context access refused because the security tokens do not match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access denied: {source_context} may not {operation} '{property}' in {target}")]
pub struct AccessDenied {
    pub source_context: ContextId,
    pub target: ContextId,
    pub operation: AccessOperation,
    pub property: String,
}

/// Engine lock misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("engine lock is not held by the calling thread")]
    NotHeld,

    #[error("release() called with lock depth already zero")]
    ReleaseWithoutAcquire,

    #[error("lock re-acquired during temporary release was not released (depth {depth})")]
    UnbalancedRestore { depth: usize },
}

/// Debug command protocol failures. Reported to the command loop's caller; the loop continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty debugger command")]
    EmptyCommand,

    #[error("unknown debugger command: {0}")]
    UnknownCommand(String),

    #[error("invalid argument for '{command}': {reason}")]
    InvalidArgument { command: String, reason: String },

    #[error("malformed debugger command: {0}")]
    MalformedCommand(String),

    #[error("malformed debugger request: {0}")]
    MalformedRequest(String),

    #[error("malformed debugger response: {0}")]
    MalformedResponse(String),

    #[error("cannot disable the debugger from inside its own command loop")]
    DisableInsideCommandLoop,

    #[error("unknown debug event kind: {0}")]
    UnknownEventKind(u32),
}

/// Top-level error for host-facing operations.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for HostError {
    fn from(err: config::ConfigError) -> Self {
        HostError::ConfigError(err.to_string())
    }
}
