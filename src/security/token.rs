//! Opaque per-context security token.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Equality-comparable domain marker. Absent by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityToken(Option<String>);

impl SecurityToken {
    pub fn none() -> Self {
        SecurityToken(None)
    }

    pub fn new(token: impl Into<String>) -> Self {
        SecurityToken(Some(token.into()))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<&str> for SecurityToken {
    fn from(token: &str) -> Self {
        SecurityToken::new(token)
    }
}

impl From<Option<String>> for SecurityToken {
    fn from(token: Option<String>) -> Self {
        SecurityToken(token)
    }
}

impl fmt::Display for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(token) => f.write_str(token),
            None => f.write_str("<none>"),
        }
    }
}
