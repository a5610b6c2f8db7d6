//! Execution contexts and the context stack.

pub mod execution;
pub mod manager;
pub mod stack;

pub use execution::{ExecutionContext, WeakContext};
pub use manager::{ContextStackManager, StackAffinity};
pub use stack::{ContextStack, EntryOrigin, DEFAULT_MAX_DEPTH};
