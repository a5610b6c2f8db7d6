//! Capability interface for script-visible global namespaces.

use crate::engine::value::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Property access on an object the engine treats as a global namespace.
///
/// Any host object can serve as a context's global by implementing this trait; the engine
/// adapter routes script property lookups through it.
pub trait GlobalObject: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;

    fn set(&self, name: &str, value: Value);

    /// Remove a property. Returns whether it existed.
    fn delete(&self, name: &str) -> bool;

    /// Property names in a stable order.
    fn keys(&self) -> Vec<String>;

    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn class_name(&self) -> &str {
        "Object"
    }
}

/// Default global object: a plain property map.
#[derive(Debug, Default)]
pub struct PropertyMap {
    class_name: String,
    properties: RwLock<BTreeMap<String, Value>>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::with_class("global")
    }

    pub fn with_class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            properties: RwLock::new(BTreeMap::new()),
        }
    }

    /// Builder-style initial property.
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.write().insert(name.to_string(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }
}

impl GlobalObject for PropertyMap {
    fn get(&self, name: &str) -> Option<Value> {
        self.properties.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: Value) {
        self.properties.write().insert(name.to_string(), value);
    }

    fn delete(&self, name: &str) -> bool {
        self.properties.write().remove(name).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.read().keys().cloned().collect()
    }

    fn has(&self, name: &str) -> bool {
        self.properties.read().contains_key(name)
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }
}
