//! Script values crossing the engine boundary.

use crate::context::WeakContext;
use crate::engine::global::GlobalObject;
use crate::types::ContextId;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// A script-visible object: a global namespace or any host object exposed through
/// the [`GlobalObject`] capability interface.
///
/// When the object is the global namespace of an execution context, `owner` names that
/// context so cross-context access can be checked against its security token.
#[derive(Clone)]
pub struct ObjectRef {
    object: Arc<dyn GlobalObject>,
    owner: Option<WeakContext>,
}

impl ObjectRef {
    /// A host object not bound to any context. Access to it is never token-checked.
    pub fn detached(object: Arc<dyn GlobalObject>) -> Self {
        Self {
            object,
            owner: None,
        }
    }

    pub(crate) fn owned(object: Arc<dyn GlobalObject>, owner: WeakContext) -> Self {
        Self {
            object,
            owner: Some(owner),
        }
    }

    pub fn object(&self) -> &Arc<dyn GlobalObject> {
        &self.object
    }

    pub fn owner(&self) -> Option<&WeakContext> {
        self.owner.as_ref()
    }

    pub fn owner_id(&self) -> Option<ContextId> {
        self.owner.as_ref().map(|o| o.id())
    }

    /// Identity comparison: two refs are equal when they name the same object instance.
    pub fn same_object(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("class", &self.object.class_name())
            .field("owner", &self.owner_id())
            .finish()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

/// A value produced or consumed by the wrapped engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A function reference, identified by name only; calling it is the engine's business.
    Function(String),
    Object(ObjectRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// JSON form used by the debugger protocol. Objects are summarised by class name.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined => json!({ "type": "undefined" }),
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Number(n) => json!(n),
            Value::String(s) => json!(s),
            Value::Function(name) => json!({ "type": "function", "name": name }),
            Value::Object(o) => json!({ "type": "object", "className": o.object().class_name() }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => f.write_str(s),
            Value::Function(name) => write!(f, "function {}() {{ [native code] }}", name),
            Value::Object(o) => write!(f, "[object {}]", o.object().class_name()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
