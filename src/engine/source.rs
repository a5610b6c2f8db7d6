//! Script source text plus its origin.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSource {
    pub source: String,
    pub name: Option<String>,
    pub line_offset: u32,
    pub column_offset: u32,
}

impl ScriptSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: None,
            line_offset: 0,
            column_offset: 0,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, line_offset: u32, column_offset: u32) -> Self {
        self.line_offset = line_offset;
        self.column_offset = column_offset;
        self
    }

    /// Name used in diagnostics; anonymous sources report `<anonymous>`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    pub fn line_count(&self) -> u32 {
        self.source.lines().count().max(1) as u32
    }
}

impl From<&str> for ScriptSource {
    fn from(source: &str) -> Self {
        ScriptSource::new(source)
    }
}

impl From<String> for ScriptSource {
    fn from(source: String) -> Self {
        ScriptSource::new(source)
    }
}
