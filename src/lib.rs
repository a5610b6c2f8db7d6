//! Scripthost: orchestration layer for an embedded script engine.
//!
//! Provides a stack of nested execution contexts with token-based cross-context access
//! control, a reentrant engine lock serializing engine access across threads, and a bridge
//! turning the engine's debug notifications into a request/response debugger protocol.
//! The engine itself is supplied by the embedder through the traits in [`engine`].

pub mod config;
pub mod context;
pub mod debug;
pub mod engine;
pub mod error;
pub mod lock;
pub mod logging;
pub mod runtime;
pub mod security;
pub mod types;

pub use config::{ConfigLoader, HostConfig};
pub use context::{ContextStack, ContextStackManager, ExecutionContext, StackAffinity};
pub use debug::{DebugBridge, DebugEvent, DebugEventKind};
pub use engine::{ScriptEngine, ScriptSource, Value};
pub use error::{AccessDenied, ContextError, HostError, LockError, ProtocolError, ScriptError};
pub use lock::EngineLock;
pub use runtime::{ContextScope, HostRuntime};
pub use security::{SecurityToken, SecurityTokenRegistry};
