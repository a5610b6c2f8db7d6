//! Classified debug events.

use crate::debug::state::ExecutionState;
use crate::engine::{CommandProcessor, RawDebugEvent, Value};
use crate::error::ProtocolError;
use crate::types::ScriptId;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

/// The closed set of events the engine raises. Discriminants are the engine's event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugEventKind {
    Break = 1,
    Exception = 2,
    NewFunction = 3,
    BeforeCompile = 4,
    AfterCompile = 5,
}

impl DebugEventKind {
    pub const ALL: [DebugEventKind; 5] = [
        DebugEventKind::Break,
        DebugEventKind::Exception,
        DebugEventKind::NewFunction,
        DebugEventKind::BeforeCompile,
        DebugEventKind::AfterCompile,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(ProtocolError::UnknownEventKind(code))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DebugEventKind::Break => "break",
            DebugEventKind::Exception => "exception",
            DebugEventKind::NewFunction => "new_function",
            DebugEventKind::BeforeCompile => "before_compile",
            DebugEventKind::AfterCompile => "after_compile",
        }
    }

    /// Break and exception events pause the engine and carry a command processor.
    pub fn pauses(self) -> bool {
        matches!(self, DebugEventKind::Break | DebugEventKind::Exception)
    }
}

impl fmt::Display for DebugEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Native,
    Extension,
    Normal,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScriptKind::Native => "native",
            ScriptKind::Extension => "extension",
            ScriptKind::Normal => "normal",
        };
        f.write_str(s)
    }
}

/// Script descriptor attached to compile events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: Option<ScriptId>,
    pub name: Option<String>,
    pub source: String,
    pub line_offset: u32,
    pub column_offset: u32,
    pub kind: ScriptKind,
}

impl Script {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            source: source.into(),
            line_offset: 0,
            column_offset: 0,
            kind: ScriptKind::Normal,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn line_count(&self) -> usize {
        self.source.lines().count().max(1)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} script {} @ {}:{}> : '{}'",
            self.kind,
            self.name.as_deref().unwrap_or("<anonymous>"),
            self.line_offset,
            self.column_offset,
            self.source
        )
    }
}

struct EventCore {
    raw: Rc<dyn RawDebugEvent>,
    state: OnceCell<ExecutionState>,
}

impl EventCore {
    fn new(raw: Rc<dyn RawDebugEvent>) -> Self {
        Self {
            raw,
            state: OnceCell::new(),
        }
    }

    fn state(&self) -> &ExecutionState {
        self.state
            .get_or_init(|| ExecutionState::new(Rc::clone(&self.raw)))
    }
}

pub struct BreakEvent {
    core: EventCore,
}

impl BreakEvent {
    pub fn state(&self) -> &ExecutionState {
        self.core.state()
    }
}

pub struct ExceptionEvent {
    core: EventCore,
    exception: OnceCell<Option<(Value, bool)>>,
}

impl ExceptionEvent {
    pub fn state(&self) -> &ExecutionState {
        self.core.state()
    }

    fn details(&self) -> Option<&(Value, bool)> {
        self.exception
            .get_or_init(|| self.core.raw.exception())
            .as_ref()
    }

    /// The thrown value.
    pub fn exception(&self) -> Option<&Value> {
        self.details().map(|(value, _)| value)
    }

    pub fn is_uncaught(&self) -> bool {
        self.details().map(|(_, uncaught)| *uncaught).unwrap_or(false)
    }
}

pub struct NewFunctionEvent {
    core: EventCore,
    name: OnceCell<Option<String>>,
}

impl NewFunctionEvent {
    pub fn function_name(&self) -> Option<&str> {
        self.name
            .get_or_init(|| self.core.raw.function_name())
            .as_deref()
    }
}

pub struct CompileEvent {
    core: EventCore,
    script: OnceCell<Option<Script>>,
}

impl CompileEvent {
    pub fn state(&self) -> &ExecutionState {
        self.core.state()
    }

    pub fn script(&self) -> Option<&Script> {
        self.script
            .get_or_init(|| self.core.raw.script())
            .as_ref()
    }
}

/// A raw engine notification classified into one of the five kinds.
///
/// Accessors call into the paused engine on first use and cache the result.
pub enum DebugEvent {
    Break(BreakEvent),
    Exception(ExceptionEvent),
    NewFunction(NewFunctionEvent),
    BeforeCompile(CompileEvent),
    AfterCompile(CompileEvent),
}

impl DebugEvent {
    pub fn classify(code: u32, raw: Box<dyn RawDebugEvent>) -> Result<Self, ProtocolError> {
        let kind = DebugEventKind::from_code(code)?;
        let core = EventCore::new(Rc::from(raw));
        Ok(match kind {
            DebugEventKind::Break => DebugEvent::Break(BreakEvent { core }),
            DebugEventKind::Exception => DebugEvent::Exception(ExceptionEvent {
                core,
                exception: OnceCell::new(),
            }),
            DebugEventKind::NewFunction => DebugEvent::NewFunction(NewFunctionEvent {
                core,
                name: OnceCell::new(),
            }),
            DebugEventKind::BeforeCompile => DebugEvent::BeforeCompile(CompileEvent {
                core,
                script: OnceCell::new(),
            }),
            DebugEventKind::AfterCompile => DebugEvent::AfterCompile(CompileEvent {
                core,
                script: OnceCell::new(),
            }),
        })
    }

    pub fn kind(&self) -> DebugEventKind {
        match self {
            DebugEvent::Break(_) => DebugEventKind::Break,
            DebugEvent::Exception(_) => DebugEventKind::Exception,
            DebugEvent::NewFunction(_) => DebugEventKind::NewFunction,
            DebugEvent::BeforeCompile(_) => DebugEventKind::BeforeCompile,
            DebugEvent::AfterCompile(_) => DebugEventKind::AfterCompile,
        }
    }

    fn core(&self) -> &EventCore {
        match self {
            DebugEvent::Break(e) => &e.core,
            DebugEvent::Exception(e) => &e.core,
            DebugEvent::NewFunction(e) => &e.core,
            DebugEvent::BeforeCompile(e) | DebugEvent::AfterCompile(e) => &e.core,
        }
    }

    pub fn state(&self) -> &ExecutionState {
        self.core().state()
    }

    /// Compile events only.
    pub fn script(&self) -> Option<&Script> {
        match self {
            DebugEvent::BeforeCompile(e) | DebugEvent::AfterCompile(e) => e.script(),
            _ => None,
        }
    }

    /// Present on break and exception events while the engine is paused.
    pub fn command_processor(&self) -> Option<&dyn CommandProcessor> {
        self.core().raw.command_processor()
    }

    /// Short text shown when a command loop starts: the event kind and the selected frame.
    pub fn summary(&self) -> String {
        let state = self.state();
        let frame = state
            .frame(state.selected_frame())
            .map(|frame| frame.to_string());
        let head = match self {
            DebugEvent::Break(_) => "break".to_string(),
            DebugEvent::Exception(e) => {
                let prefix = if e.is_uncaught() {
                    "uncaught exception"
                } else {
                    "exception"
                };
                match e.exception() {
                    Some(value) => format!("{}: {}", prefix, value),
                    None => prefix.to_string(),
                }
            }
            other => other.to_string(),
        };
        match frame {
            Some(frame) => format!("{}\n{}", head, frame),
            None => head,
        }
    }
}

impl fmt::Display for DebugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugEvent::Break(e) => write!(f, "break event:\n{}", e.state()),
            DebugEvent::Exception(e) => match e.exception() {
                Some(value) => write!(f, "exception event: {}\n{}", value, e.state()),
                None => write!(f, "exception event:\n{}", e.state()),
            },
            DebugEvent::NewFunction(e) => write!(
                f,
                "new function event: {}",
                e.function_name().unwrap_or("[anonymous]")
            ),
            DebugEvent::BeforeCompile(e) => match e.script() {
                Some(script) => write!(f, "before compile script: {}\n{}", script, e.state()),
                None => write!(f, "before compile script: <unknown>\n{}", e.state()),
            },
            DebugEvent::AfterCompile(e) => match e.script() {
                Some(script) => write!(f, "after compile script: {}\n{}", script, e.state()),
                None => write!(f, "after compile script: <unknown>\n{}", e.state()),
            },
        }
    }
}

impl fmt::Debug for DebugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugEvent")
            .field("kind", &self.kind())
            .finish()
    }
}
