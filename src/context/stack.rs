//! Context stack: LIFO record of active execution contexts for one call chain.
//!
//! Frames are grouped into entry sequences. Every host `enter` starts a new sequence;
//! a script-driven switch into another context (`enter_from_script`) joins the sequence
//! on top. `current()` is the top frame, `entered()` the oldest frame of the top sequence.
//! Re-entering the context already on top bumps that frame's nesting counter instead of
//! pushing a duplicate frame.

use crate::context::execution::ExecutionContext;
use crate::error::ContextError;
use crate::types::ContextId;
use tracing::{error, trace, warn};

pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Who pushed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Host code entered the context explicitly.
    Host,
    /// Running script crossed into another context's function.
    Script,
}

#[derive(Debug)]
struct StackFrame {
    context: ExecutionContext,
    nesting: usize,
    sequence: u64,
    origin: EntryOrigin,
}

#[derive(Debug)]
pub struct ContextStack {
    frames: Vec<StackFrame>,
    next_sequence: u64,
    depth: usize,
    max_depth: usize,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStack {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            next_sequence: 0,
            depth: 0,
            max_depth,
        }
    }

    /// Host entry: push `context`, starting a new entry sequence.
    pub fn enter(&mut self, context: &ExecutionContext) -> Result<(), ContextError> {
        self.push(context, EntryOrigin::Host)
    }

    /// Script-driven entry: push `context` into the current entry sequence.
    pub fn enter_from_script(&mut self, context: &ExecutionContext) -> Result<(), ContextError> {
        if self.frames.is_empty() {
            error!(context_id = %context.id(), "script-driven enter with no context entered");
            return Err(ContextError::NotInContext);
        }
        self.push(context, EntryOrigin::Script)
    }

    fn push(&mut self, context: &ExecutionContext, origin: EntryOrigin) -> Result<(), ContextError> {
        if self.depth >= self.max_depth {
            error!(context_id = %context.id(), max_depth = self.max_depth, "context stack overflow");
            return Err(ContextError::DepthExceeded(self.max_depth));
        }

        let top_sequence = self.frames.last().map(|f| f.sequence);
        if let Some(top) = self.frames.last_mut().filter(|f| f.context == *context) {
            top.nesting += 1;
        } else {
            let sequence = match (origin, top_sequence) {
                (EntryOrigin::Script, Some(sequence)) => sequence,
                _ => {
                    self.next_sequence += 1;
                    self.next_sequence
                }
            };
            self.frames.push(StackFrame {
                context: context.clone(),
                nesting: 1,
                sequence,
                origin,
            });
        }

        self.depth += 1;
        context.mark_entered();
        trace!(context_id = %context.id(), depth = self.depth, origin = ?origin, "context entered");
        Ok(())
    }

    /// Pop the most recent entry of `context`. Fails without touching the stack when the stack
    /// is empty or `context` is not on top.
    pub fn leave(&mut self, context: &ExecutionContext) -> Result<(), ContextError> {
        let top = match self.frames.last_mut() {
            Some(top) => top,
            None => {
                error!(context_id = %context.id(), "leave with empty context stack");
                return Err(ContextError::LeaveOnEmptyStack(context.id()));
            }
        };

        if top.context != *context {
            let found = top.context.id();
            error!(
                context_id = %context.id(),
                current = %found,
                "leave does not match the current context"
            );
            return Err(ContextError::LeaveMismatch {
                expected: context.id(),
                found,
            });
        }

        if top.nesting > 1 {
            top.nesting -= 1;
        } else {
            self.frames.pop();
        }

        self.depth -= 1;
        context.mark_left();
        trace!(context_id = %context.id(), depth = self.depth, "context exited");
        Ok(())
    }

    /// Innermost active context.
    pub fn current(&self) -> Option<ExecutionContext> {
        self.frames.last().map(|f| f.context.clone())
    }

    /// Outermost context of the unbroken entry sequence on top of the stack.
    pub fn entered(&self) -> Option<ExecutionContext> {
        let sequence = self.frames.last()?.sequence;
        self.frames
            .iter()
            .rev()
            .take_while(|f| f.sequence == sequence)
            .last()
            .map(|f| f.context.clone())
    }

    /// Context beneath `current()` within the same entry sequence: the context of the calling
    /// script function.
    pub fn calling(&self) -> Option<ExecutionContext> {
        let n = self.frames.len();
        if n < 2 {
            return None;
        }
        let (top, below) = (&self.frames[n - 1], &self.frames[n - 2]);
        if top.sequence == below.sequence && top.origin == EntryOrigin::Script {
            Some(below.context.clone())
        } else {
            None
        }
    }

    pub fn in_context(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Total entries, counting nested re-entries.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Distinct frames on the stack.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Nesting counter of the top frame (0 when empty).
    pub fn top_nesting(&self) -> usize {
        self.frames.last().map(|f| f.nesting).unwrap_or(0)
    }

    pub fn contains(&self, context: &ExecutionContext) -> bool {
        self.frames.iter().any(|f| f.context == *context)
    }

    /// Context ids bottom to top.
    pub fn context_ids(&self) -> Vec<ContextId> {
        self.frames.iter().map(|f| f.context.id()).collect()
    }
}

impl Drop for ContextStack {
    fn drop(&mut self) {
        if self.frames.is_empty() {
            return;
        }
        warn!(
            frames = self.frames.len(),
            depth = self.depth,
            "context stack dropped with contexts still entered"
        );
        for frame in self.frames.drain(..) {
            for _ in 0..frame.nesting {
                frame.context.mark_left();
            }
        }
    }
}
