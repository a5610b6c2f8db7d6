//! Security token registry: decides whether one context may touch another's objects.

use crate::context::ExecutionContext;
use crate::engine::value::ObjectRef;
use crate::security::guard::GuardedGlobal;
use crate::security::token::SecurityToken;
use crate::types::ContextId;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::{debug, info};

/// Compares per-context tokens to grant or deny cross-context access.
///
/// Tokens live on the contexts themselves; the registry owns the access policy and the
/// revocation set.
#[derive(Debug)]
pub struct SecurityTokenRegistry {
    allow_default_domain: bool,
    revoked: RwLock<HashSet<ContextId>>,
}

impl Default for SecurityTokenRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SecurityTokenRegistry {
    /// `allow_default_domain`: whether two contexts without tokens share one domain.
    pub fn new(allow_default_domain: bool) -> Self {
        Self {
            allow_default_domain,
            revoked: RwLock::new(HashSet::new()),
        }
    }

    pub fn allows_default_domain(&self) -> bool {
        self.allow_default_domain
    }

    /// Assign or clear a context's token. Access already granted is not revoked.
    pub fn set_token(&self, context: &ExecutionContext, token: impl Into<SecurityToken>) {
        let token = token.into();
        let previous = context.replace_security_token(token.clone());
        debug!(
            context_id = %context.id(),
            previous = %previous,
            token = %token,
            "security token set"
        );
    }

    pub fn token(&self, context: &ExecutionContext) -> SecurityToken {
        context.security_token()
    }

    /// Refuse all cross-context access to and from `context`, regardless of tokens.
    pub fn revoke(&self, context: &ExecutionContext) {
        info!(context_id = %context.id(), "security access revoked");
        self.revoked.write().insert(context.id());
    }

    pub fn reinstate(&self, context: &ExecutionContext) {
        self.revoked.write().remove(&context.id());
    }

    pub fn is_revoked(&self, context: &ExecutionContext) -> bool {
        self.revoked.read().contains(&context.id())
    }

    /// Whether script running in `source` may access objects belonging to `target`.
    ///
    /// A context always reaches its own namespace. Otherwise neither side may be revoked and
    /// the tokens must be equal: both present and equal, or both absent when the default
    /// domain is allowed.
    pub fn check_access(&self, source: &ExecutionContext, target: &ExecutionContext) -> bool {
        if source == target {
            return true;
        }
        {
            let revoked = self.revoked.read();
            if revoked.contains(&source.id()) || revoked.contains(&target.id()) {
                return false;
            }
        }
        let (a, b) = (source.security_token(), target.security_token());
        match (a.is_none(), b.is_none()) {
            (true, true) => self.allow_default_domain,
            (false, false) => a == b,
            _ => false,
        }
    }

    /// Enforcement point: property access from `source` into `target`.
    pub fn guard<'a>(&'a self, source: &ExecutionContext, target: &ObjectRef) -> GuardedGlobal<'a> {
        GuardedGlobal::new(self, source.clone(), target.clone())
    }
}
