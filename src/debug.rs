//! Debugger bridge
//!
//! Classifies the engine's raw debug notifications into [`DebugEvent`]s, dispatches them to
//! host handlers, and drives a blocking command loop while the engine is paused.

pub mod bridge;
pub mod command_loop;
pub mod events;
pub mod journal;
pub mod protocol;
pub mod state;

pub use bridge::{DebugBridge, EventHandler, HandlerResult, MessageHandler};
pub use command_loop::{CommandChannel, LineChannel, ScriptedChannel};
pub use events::{DebugEvent, DebugEventKind, Script, ScriptKind};
pub use journal::{DeliveryOutcome, EventJournal, JournalEntry};
pub use protocol::{
    CommandRequest, CommandResponse, DebugCommand, DebugMessage, ResponseMessage, StepAction,
};
pub use state::{ExecutionState, Frame};
