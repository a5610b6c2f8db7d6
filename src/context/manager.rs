//! Context stack manager: owns one stack per call chain.

use crate::context::execution::ExecutionContext;
use crate::context::stack::ContextStack;
use crate::error::ContextError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::thread::{self, ThreadId};

/// How call chains map onto stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackAffinity {
    /// One stack shared by the whole process.
    Process,
    /// One stack per OS thread.
    #[default]
    Thread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StackKey {
    Process,
    Thread(ThreadId),
}

/// Tracks context activation for every logical call chain.
///
/// The manager only guards its own map; the stacks themselves follow the engine lock
/// discipline (callers hold the engine lock, or otherwise guarantee single-threaded use).
#[derive(Debug)]
pub struct ContextStackManager {
    affinity: StackAffinity,
    max_depth: usize,
    stacks: Mutex<HashMap<StackKey, ContextStack>>,
}

impl ContextStackManager {
    pub fn new(affinity: StackAffinity, max_depth: usize) -> Self {
        Self {
            affinity,
            max_depth,
            stacks: Mutex::new(HashMap::new()),
        }
    }

    pub fn affinity(&self) -> StackAffinity {
        self.affinity
    }

    fn key(&self) -> StackKey {
        match self.affinity {
            StackAffinity::Process => StackKey::Process,
            StackAffinity::Thread => StackKey::Thread(thread::current().id()),
        }
    }

    /// Run `f` against the calling chain's stack. Empty stacks are discarded afterwards.
    pub fn with_stack<R>(&self, f: impl FnOnce(&mut ContextStack) -> R) -> R {
        let key = self.key();
        let mut stacks = self.stacks.lock();
        let max_depth = self.max_depth;
        let stack = stacks
            .entry(key)
            .or_insert_with(|| ContextStack::with_max_depth(max_depth));
        let result = f(stack);
        if !stack.in_context() {
            stacks.remove(&key);
        }
        result
    }

    fn peek<R>(&self, f: impl FnOnce(&ContextStack) -> R, empty: R) -> R {
        let stacks = self.stacks.lock();
        match stacks.get(&self.key()) {
            Some(stack) => f(stack),
            None => empty,
        }
    }

    pub fn enter(&self, context: &ExecutionContext) -> Result<(), ContextError> {
        self.with_stack(|s| s.enter(context))
    }

    pub fn enter_from_script(&self, context: &ExecutionContext) -> Result<(), ContextError> {
        self.with_stack(|s| s.enter_from_script(context))
    }

    pub fn leave(&self, context: &ExecutionContext) -> Result<(), ContextError> {
        self.with_stack(|s| s.leave(context))
    }

    pub fn current(&self) -> Option<ExecutionContext> {
        self.peek(|s| s.current(), None)
    }

    pub fn entered(&self) -> Option<ExecutionContext> {
        self.peek(|s| s.entered(), None)
    }

    pub fn calling(&self) -> Option<ExecutionContext> {
        self.peek(|s| s.calling(), None)
    }

    pub fn in_context(&self) -> bool {
        self.peek(|s| s.in_context(), false)
    }

    pub fn depth(&self) -> usize {
        self.peek(|s| s.depth(), 0)
    }

    /// Current context or `NotInContext`.
    pub fn require_current(&self) -> Result<ExecutionContext, ContextError> {
        self.current().ok_or(ContextError::NotInContext)
    }

    /// Number of call chains with at least one entered context.
    pub fn active_stacks(&self) -> usize {
        self.stacks.lock().len()
    }
}
