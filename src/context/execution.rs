//! Execution contexts: an isolated global namespace plus a security token.

use crate::engine::global::{GlobalObject, PropertyMap};
use crate::engine::value::ObjectRef;
use crate::security::SecurityToken;
use crate::types::ContextId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

struct ContextInner {
    id: ContextId,
    global: Arc<dyn GlobalObject>,
    token: RwLock<SecurityToken>,
    /// Live stack entries (including nested re-entries) across all stacks.
    entries: AtomicUsize,
    /// The context whose namespace this one re-enters, if created by [`ExecutionContext::wrapping`].
    wraps: Option<ContextId>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        trace!(context_id = %self.id, "context destroyed");
    }
}

/// Host-side handle to an execution context.
///
/// Cloning the handle shares the context. Context stacks hold clones, so a context lives until
/// its last handle is released and it is on no stack.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    /// Create a context. Without a global object a fresh [`PropertyMap`] is used.
    pub fn create(global: Option<Arc<dyn GlobalObject>>) -> Self {
        let global = global.unwrap_or_else(|| Arc::new(PropertyMap::new()));
        Self::build(global, None)
    }

    /// Create a new context that re-enters `other`'s namespace (shares its global object).
    /// The new context starts with no security token.
    pub fn wrapping(other: &ExecutionContext) -> Self {
        Self::build(other.inner.global.clone(), Some(other.id()))
    }

    fn build(global: Arc<dyn GlobalObject>, wraps: Option<ContextId>) -> Self {
        let id = ContextId::next();
        trace!(context_id = %id, wraps = ?wraps, "context created");
        Self {
            inner: Arc::new(ContextInner {
                id,
                global,
                token: RwLock::new(SecurityToken::none()),
                entries: AtomicUsize::new(0),
                wraps,
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn wraps(&self) -> Option<ContextId> {
        self.inner.wraps
    }

    /// The global namespace as a script value owned by this context.
    pub fn global(&self) -> ObjectRef {
        ObjectRef::owned(self.inner.global.clone(), self.downgrade())
    }

    /// Direct access to the global object, bypassing security checks. For the engine adapter
    /// and for the context's own code.
    pub fn global_object(&self) -> &Arc<dyn GlobalObject> {
        &self.inner.global
    }

    pub fn security_token(&self) -> SecurityToken {
        self.inner.token.read().clone()
    }

    pub(crate) fn replace_security_token(&self, token: SecurityToken) -> SecurityToken {
        std::mem::replace(&mut *self.inner.token.write(), token)
    }

    /// Whether this context is on any context stack.
    pub fn is_active(&self) -> bool {
        self.entry_count() > 0
    }

    pub fn entry_count(&self) -> usize {
        self.inner.entries.load(Ordering::Acquire)
    }

    pub(crate) fn mark_entered(&self) {
        self.inner.entries.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn mark_left(&self) {
        self.inner.entries.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ExecutionContext {}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.inner.id)
            .field("token", &*self.inner.token.read())
            .field("entries", &self.entry_count())
            .finish()
    }
}

/// Non-owning reference to a context, held by values that point into its namespace.
#[derive(Clone)]
pub struct WeakContext {
    id: ContextId,
    inner: Weak<ContextInner>,
}

impl WeakContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// `None` once every owning handle is gone.
    pub fn upgrade(&self) -> Option<ExecutionContext> {
        self.inner.upgrade().map(|inner| ExecutionContext { inner })
    }
}

impl fmt::Debug for WeakContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakContext({})", self.id)
    }
}
