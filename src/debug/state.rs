//! Paused execution state: stack frames, materialized on first inspection.

use crate::engine::{RawDebugEvent, Value};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

/// One stack frame of a paused engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub index: usize,
    /// Function name; empty for anonymous functions and top-level code.
    pub function: String,
    pub receiver: Value,
    pub is_construct_call: bool,
    pub is_debugger_frame: bool,
    pub arguments: Vec<(String, Value)>,
    pub locals: Vec<(String, Value)>,
    pub source_position: Option<u32>,
    pub source_line: Option<u32>,
    pub source_column: Option<u32>,
    pub source_line_text: Option<String>,
    pub script_name: Option<String>,
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

impl Frame {
    pub fn new(index: usize, function: impl Into<String>) -> Self {
        Self {
            index,
            function: function.into(),
            ..Self::default()
        }
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    /// Call expression for the frame, e.g. `new Point(x=1, y=2)`.
    pub fn invocation_text(&self) -> String {
        let mut out = String::new();
        if self.is_construct_call {
            out.push_str("new ");
        }
        if let Value::Object(receiver) = &self.receiver {
            if !self.is_construct_call {
                out.push_str(&format!("[{}].", receiver.object().class_name()));
            }
        }
        if self.function.is_empty() {
            out.push_str("[anonymous]");
        } else {
            out.push_str(&self.function);
        }
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|(name, value)| format!("{}={}", name, render_value(value)))
            .collect();
        out.push('(');
        out.push_str(&args.join(", "));
        out.push(')');
        out
    }

    /// Script location, e.g. `test.js line 3 column 5 (position 20)`.
    pub fn source_and_position_text(&self) -> String {
        let script = self.script_name.as_deref().unwrap_or("<anonymous>");
        let mut out = script.to_string();
        if let Some(line) = self.source_line {
            out.push_str(&format!(" line {}", line + 1));
            if let Some(column) = self.source_column {
                out.push_str(&format!(" column {}", column + 1));
            }
        }
        if let Some(position) = self.source_position {
            out.push_str(&format!(" (position {})", position));
        }
        out
    }

    /// One `var name = value;` line per local.
    pub fn locals_text(&self) -> String {
        self.locals
            .iter()
            .map(|(name, value)| format!("var {} = {};", name, render_value(value)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02} {} {}",
            self.index,
            self.invocation_text(),
            self.source_and_position_text()
        )?;
        if let Some(text) = &self.source_line_text {
            write!(f, "\n        {}", text.trim_end())?;
        }
        Ok(())
    }
}

/// Stack of a paused engine.
///
/// Nothing is fetched from the engine until asked for; each frame is fetched at most once.
pub struct ExecutionState {
    raw: Rc<dyn RawDebugEvent>,
    frames: OnceCell<Vec<OnceCell<Option<Frame>>>>,
}

impl ExecutionState {
    pub(crate) fn new(raw: Rc<dyn RawDebugEvent>) -> Self {
        Self {
            raw,
            frames: OnceCell::new(),
        }
    }

    fn slots(&self) -> &[OnceCell<Option<Frame>>] {
        self.frames.get_or_init(|| {
            (0..self.raw.frame_count())
                .map(|_| OnceCell::new())
                .collect()
        })
    }

    pub fn frame_count(&self) -> usize {
        self.slots().len()
    }

    pub fn selected_frame(&self) -> usize {
        self.raw.selected_frame()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.slots()
            .get(index)?
            .get_or_init(|| self.raw.frame(index))
            .as_ref()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> + '_ {
        (0..self.frame_count()).filter_map(move |index| self.frame(index))
    }

    /// Frames fetched from the engine so far.
    pub fn materialized(&self) -> usize {
        self.frames
            .get()
            .map(|slots| slots.iter().filter(|slot| slot.get().is_some()).count())
            .unwrap_or(0)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in self.frames() {
            writeln!(f, "{}", frame)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionState")
            .field("materialized", &self.materialized())
            .finish()
    }
}
