//! Token-checked property access into another context's global namespace.

use crate::context::ExecutionContext;
use crate::engine::value::{ObjectRef, Value};
use crate::error::{AccessDenied, AccessOperation};
use crate::security::registry::SecurityTokenRegistry;
use tracing::warn;

/// Property access from `source` into an object that may belong to another context.
///
/// Reads, writes and enumeration report [`AccessDenied`]; `delete` reports denial as `false`,
/// the same result as deleting a property that does not exist.
pub struct GuardedGlobal<'a> {
    registry: &'a SecurityTokenRegistry,
    source: ExecutionContext,
    target: ObjectRef,
}

impl<'a> GuardedGlobal<'a> {
    pub(crate) fn new(
        registry: &'a SecurityTokenRegistry,
        source: ExecutionContext,
        target: ObjectRef,
    ) -> Self {
        Self {
            registry,
            source,
            target,
        }
    }

    pub fn source(&self) -> &ExecutionContext {
        &self.source
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    fn authorize(&self, operation: AccessOperation, property: &str) -> Result<(), AccessDenied> {
        let owner = match self.target.owner() {
            // Host objects bound to no context are not token-checked.
            None => return Ok(()),
            Some(owner) => owner,
        };
        let allowed = match owner.upgrade() {
            Some(target) => self.registry.check_access(&self.source, &target),
            None => false,
        };
        if allowed {
            Ok(())
        } else {
            warn!(
                source_context = %self.source.id(),
                target = %owner.id(),
                operation = %operation,
                property = property,
                "cross-context access denied"
            );
            Err(AccessDenied {
                source_context: self.source.id(),
                target: owner.id(),
                operation,
                property: property.to_string(),
            })
        }
    }

    pub fn get(&self, name: &str) -> Result<Option<Value>, AccessDenied> {
        self.authorize(AccessOperation::Read, name)?;
        Ok(self.target.object().get(name))
    }

    pub fn set(&self, name: &str, value: Value) -> Result<(), AccessDenied> {
        self.authorize(AccessOperation::Write, name)?;
        self.target.object().set(name, value);
        Ok(())
    }

    /// `false` when the property did not exist or access was denied.
    pub fn delete(&self, name: &str) -> bool {
        match self.authorize(AccessOperation::Delete, name) {
            Ok(()) => self.target.object().delete(name),
            Err(_) => false,
        }
    }

    pub fn keys(&self) -> Result<Vec<String>, AccessDenied> {
        self.authorize(AccessOperation::Enumerate, "*")?;
        Ok(self.target.object().keys())
    }
}
