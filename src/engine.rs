//! Wrapped script engine seam.
//!
//! The engine itself is an external collaborator. These traits name exactly what the host
//! layer consumes from it: compilation, evaluation, and raw debug notifications. Everything
//! else in this crate (context stack, locking, the debugger bridge) is built on top.

use crate::context::ExecutionContext;
use crate::debug::events::Script;
use crate::debug::state::Frame;
use crate::error::ScriptError;
use std::sync::Arc;

pub mod global;
pub mod source;
pub mod value;

pub use global::{GlobalObject, PropertyMap};
pub use source::ScriptSource;
pub use value::{ObjectRef, Value};

/// The wrapped engine instance. Not assumed to be internally thread-safe: callers serialize
/// access through [`crate::lock::EngineLock`] whenever locking is active.
pub trait ScriptEngine: Send + Sync {
    fn version(&self) -> &str;

    fn compile(
        &self,
        context: &ExecutionContext,
        source: &ScriptSource,
    ) -> Result<Box<dyn CompiledScript>, ScriptError>;

    fn eval(&self, context: &ExecutionContext, source: &ScriptSource)
        -> Result<Value, ScriptError>;

    /// Install or clear the single debug sink. The engine delivers events synchronously on
    /// whichever thread is executing script.
    fn set_debug_listener(&self, listener: Option<Arc<dyn DebugListener>>);

    /// Ask the engine to break at the next statement.
    fn debug_break(&self) {}

    /// Queue a JSON protocol request for asynchronous processing.
    fn send_debug_command(&self, _request: &str) {}

    /// Process queued debug messages now.
    fn process_debug_messages(&self) {}
}

/// A compiled script bound to the engine that produced it.
pub trait CompiledScript: Send {
    fn source(&self) -> &ScriptSource;

    fn run(&self, context: &ExecutionContext) -> Result<Value, ScriptError>;
}

/// Receiver of the engine's raw debug notifications.
pub trait DebugListener: Send + Sync {
    /// `kind` is the engine's numeric event code; see [`crate::debug::DebugEventKind`].
    fn on_debug_event(&self, kind: u32, event: Box<dyn RawDebugEvent>);

    fn on_debug_message(&self, json: &str);
}

/// A paused engine's view of one debug event.
///
/// Every accessor may call back into the paused engine, so the bridge only invokes them
/// when a handler actually inspects the event.
pub trait RawDebugEvent {
    fn frame_count(&self) -> usize;

    fn frame(&self, index: usize) -> Option<Frame>;

    fn selected_frame(&self) -> usize {
        0
    }

    /// Script descriptor for compile events.
    fn script(&self) -> Option<Script> {
        None
    }

    /// Function name for new-function events.
    fn function_name(&self) -> Option<String> {
        None
    }

    /// Thrown value for exception events, and whether it was uncaught.
    fn exception(&self) -> Option<(Value, bool)> {
        None
    }

    /// The synchronous command processor of the paused engine. Only break and exception
    /// events carry one.
    fn command_processor(&self) -> Option<&dyn CommandProcessor> {
        None
    }
}

/// Synchronous request/response processor of a paused engine, speaking the JSON
/// debugger protocol.
pub trait CommandProcessor {
    fn process(&self, request_json: &str) -> Result<String, ScriptError>;
}
