//! Scripted stand-in for the wrapped script engine.
//!
//! Understands just enough to drive the host layer: `;`-separated statements made of
//! number/string literals, `+`, global variable reads and assignments, `throw <expr>`,
//! `debugger`, and the `function test() { text = "..."; return eval(text) } test()` shape,
//! which evaluates the quoted source as a nested script. Every compilation raises a
//! before/after compile event pair; `debugger` raises a break event and `throw` an exception
//! event, both carrying a command processor answering the JSON debugger protocol.

use parking_lot::Mutex;
use scripthost::context::ExecutionContext;
use scripthost::debug::{Frame, Script, ScriptKind};
use scripthost::engine::{
    CommandProcessor, CompiledScript, DebugListener, RawDebugEvent, ScriptEngine, ScriptSource,
    Value,
};
use scripthost::error::ScriptError;
use scripthost::types::ScriptId;
use serde_json::{json, Value as Json};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

pub const BREAK: u32 = 1;
pub const EXCEPTION: u32 = 2;
pub const BEFORE_COMPILE: u32 = 4;
pub const AFTER_COMPILE: u32 = 5;

#[derive(Default)]
struct EngineState {
    listener: Mutex<Option<Arc<dyn DebugListener>>>,
    listener_installs: AtomicUsize,
    scripts: Mutex<Vec<Script>>,
    next_script_id: AtomicU64,
    call_stack: Mutex<Vec<String>>,
    break_requested: AtomicBool,
    queued_commands: Mutex<Vec<String>>,
    frame_fetches: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

/// Cheap handle; clones share one engine.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<EngineState>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_listener(&self) -> bool {
        self.state.listener.lock().is_some()
    }

    /// Number of times a listener was installed.
    pub fn listener_installs(&self) -> usize {
        self.state.listener_installs.load(Ordering::SeqCst)
    }

    /// Frames fetched from raised events so far.
    pub fn frame_fetches(&self) -> usize {
        self.state.frame_fetches.load(Ordering::SeqCst)
    }

    /// JSON requests received by command processors.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().clone()
    }

    pub fn compiled_scripts(&self) -> usize {
        self.state.scripts.lock().len()
    }

    /// Function names reported as callers of the top-level frame, innermost first.
    pub fn set_call_stack(&self, names: &[&str]) {
        *self.state.call_stack.lock() = names.iter().map(|n| n.to_string()).collect();
    }

    /// Deliver a bare event with an arbitrary code.
    pub fn emit(&self, code: u32) {
        self.notify(code, self.event(Vec::new(), None));
    }

    fn listener(&self) -> Option<Arc<dyn DebugListener>> {
        self.state.listener.lock().clone()
    }

    fn notify(&self, kind: u32, event: ScriptedEvent) {
        if let Some(listener) = self.listener() {
            listener.on_debug_event(kind, Box::new(event));
        }
    }

    fn register(&self, source: &ScriptSource) -> Script {
        let id = self.state.next_script_id.fetch_add(1, Ordering::SeqCst) + 1;
        let script = Script {
            id: Some(ScriptId(id)),
            name: source.name.clone(),
            source: source.source.clone(),
            line_offset: source.line_offset,
            column_offset: source.column_offset,
            kind: ScriptKind::Normal,
        };
        self.state.scripts.lock().push(script.clone());
        script
    }

    fn compile_events(&self, source: &ScriptSource) {
        let script = self.register(source);
        self.notify(BEFORE_COMPILE, self.event(Vec::new(), None).with_script(script.clone()));
        self.notify(AFTER_COMPILE, self.event(Vec::new(), None).with_script(script));
    }

    fn event(&self, frames: Vec<Frame>, processor: Option<ScriptedProcessor>) -> ScriptedEvent {
        ScriptedEvent {
            frames,
            script: None,
            exception: None,
            processor,
            fetches: Arc::clone(&self.state.frame_fetches),
        }
    }

    fn frames(&self, context: &ExecutionContext, source: &ScriptSource, statement: &str) -> Vec<Frame> {
        let position = source.source.find(statement).unwrap_or(0);
        let line = source.source[..position].matches('\n').count() as u32;
        let line_start = source.source[..position].rfind('\n').map(|p| p + 1).unwrap_or(0);
        let line_text = source.source[line_start..].lines().next().unwrap_or("").to_string();
        let locals = context
            .global_object()
            .keys()
            .into_iter()
            .filter_map(|key| context.global_object().get(&key).map(|value| (key, value)))
            .collect();

        let mut frames = vec![Frame {
            index: 0,
            function: String::new(),
            receiver: Value::Object(context.global()),
            locals,
            source_position: Some(position as u32),
            source_line: Some(source.line_offset + line),
            source_column: Some((position - line_start) as u32),
            source_line_text: Some(line_text),
            script_name: source.name.clone(),
            ..Frame::default()
        }];
        for (offset, name) in self.state.call_stack.lock().iter().enumerate() {
            frames.push(Frame {
                script_name: source.name.clone(),
                ..Frame::new(offset + 1, name.clone())
            });
        }
        frames
    }

    fn processor(&self, context: &ExecutionContext, source: &ScriptSource, frames: &[Frame]) -> ScriptedProcessor {
        ScriptedProcessor {
            context: context.clone(),
            frames: frames.to_vec(),
            scripts: self.state.scripts.lock().clone(),
            source: source.source.clone(),
            next_seq: Cell::new(1),
            next_breakpoint: Cell::new(1),
            requests: Arc::clone(&self.state.requests),
        }
    }

    fn pause(&self, context: &ExecutionContext, source: &ScriptSource, statement: &str) {
        let Some(listener) = self.listener() else {
            return;
        };
        let frames = self.frames(context, source, statement);
        let processor = self.processor(context, source, &frames);
        listener.on_debug_message(
            &json!({ "seq": 0, "type": "event", "event": "break", "body": {} }).to_string(),
        );
        listener.on_debug_event(BREAK, Box::new(self.event(frames, Some(processor))));
    }

    fn raise(&self, context: &ExecutionContext, source: &ScriptSource, statement: &str, value: Value) {
        if self.listener().is_none() {
            return;
        }
        let frames = self.frames(context, source, statement);
        let processor = self.processor(context, source, &frames);
        let mut event = self.event(frames, Some(processor));
        event.exception = Some((value, true));
        self.notify(EXCEPTION, event);
    }

    fn execute(&self, context: &ExecutionContext, source: &ScriptSource) -> Result<Value, ScriptError> {
        if self.state.break_requested.swap(false, Ordering::SeqCst) {
            self.pause(context, source, source.source.trim());
        }
        let text = source.source.trim();
        if text.starts_with("function ") {
            let inner = quoted_assignment(text, "text");
            if let Some(inner) = inner {
                context.global_object().set("text", Value::from(inner.as_str()));
                if text.contains("eval(text)") {
                    let nested = ScriptSource::new(inner);
                    self.compile_events(&nested);
                    return self.execute(context, &nested);
                }
            }
            return Ok(Value::Undefined);
        }

        let mut result = Value::Undefined;
        for statement in text.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            result = self.statement(context, source, statement)?;
        }
        Ok(result)
    }

    fn statement(&self, context: &ExecutionContext, source: &ScriptSource, statement: &str) -> Result<Value, ScriptError> {
        if statement == "debugger" {
            self.pause(context, source, statement);
            return Ok(Value::Undefined);
        }
        if let Some(thrown) = statement.strip_prefix("throw ") {
            let value = evaluate_expression(context, thrown)?;
            self.raise(context, source, statement, value.clone());
            return Err(ScriptError::thrown(value.to_string()).with_source_line(statement));
        }
        if let Some((name, expr)) = split_assignment(statement) {
            let value = evaluate_expression(context, expr)?;
            context.global_object().set(name, value.clone());
            return Ok(value);
        }
        evaluate_expression(context, statement)
    }
}

impl ScriptEngine for ScriptedEngine {
    fn version(&self) -> &str {
        "scripted-0.1"
    }

    fn compile(
        &self,
        _context: &ExecutionContext,
        source: &ScriptSource,
    ) -> Result<Box<dyn CompiledScript>, ScriptError> {
        if source.source.matches('"').count() % 2 != 0 {
            return Err(ScriptError::new("SyntaxError", "Unterminated string literal")
                .with_location(source.display_name(), source.line_offset + 1, 0));
        }
        self.compile_events(source);
        Ok(Box::new(ScriptedScript {
            engine: self.clone(),
            source: source.clone(),
        }))
    }

    fn eval(&self, context: &ExecutionContext, source: &ScriptSource) -> Result<Value, ScriptError> {
        self.compile_events(source);
        self.execute(context, source)
    }

    fn set_debug_listener(&self, listener: Option<Arc<dyn DebugListener>>) {
        if listener.is_some() {
            self.state.listener_installs.fetch_add(1, Ordering::SeqCst);
        }
        *self.state.listener.lock() = listener;
    }

    fn debug_break(&self) {
        self.state.break_requested.store(true, Ordering::SeqCst);
    }

    fn send_debug_command(&self, request: &str) {
        self.state.queued_commands.lock().push(request.to_string());
    }

    fn process_debug_messages(&self) {
        let queued: Vec<String> = std::mem::take(&mut *self.state.queued_commands.lock());
        let Some(listener) = self.listener() else {
            return;
        };
        let context = ExecutionContext::create(None);
        let processor = self.processor(&context, &ScriptSource::new(""), &[]);
        for request in queued {
            if let Ok(response) = processor.process(&request) {
                listener.on_debug_message(&response);
            }
        }
    }
}

struct ScriptedScript {
    engine: ScriptedEngine,
    source: ScriptSource,
}

impl CompiledScript for ScriptedScript {
    fn source(&self) -> &ScriptSource {
        &self.source
    }

    fn run(&self, context: &ExecutionContext) -> Result<Value, ScriptError> {
        self.engine.execute(context, &self.source)
    }
}

struct ScriptedEvent {
    frames: Vec<Frame>,
    script: Option<Script>,
    exception: Option<(Value, bool)>,
    processor: Option<ScriptedProcessor>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedEvent {
    fn with_script(mut self, script: Script) -> Self {
        self.script = Some(script);
        self
    }
}

impl RawDebugEvent for ScriptedEvent {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Option<Frame> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.frames.get(index).cloned()
    }

    fn script(&self) -> Option<Script> {
        self.script.clone()
    }

    fn exception(&self) -> Option<(Value, bool)> {
        self.exception.clone()
    }

    fn command_processor(&self) -> Option<&dyn CommandProcessor> {
        self.processor.as_ref().map(|p| p as &dyn CommandProcessor)
    }
}

/// Answers JSON debugger requests against a snapshot of the paused state.
struct ScriptedProcessor {
    context: ExecutionContext,
    frames: Vec<Frame>,
    scripts: Vec<Script>,
    source: String,
    next_seq: Cell<u64>,
    next_breakpoint: Cell<u64>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CommandProcessor for ScriptedProcessor {
    fn process(&self, request_json: &str) -> Result<String, ScriptError> {
        self.requests.lock().push(request_json.to_string());
        let request: Json = serde_json::from_str(request_json)
            .map_err(|e| ScriptError::new("SyntaxError", e.to_string()))?;
        let request_seq = request["seq"].as_u64().unwrap_or(0);
        let command = request["command"].as_str().unwrap_or("").to_string();
        let args = &request["arguments"];

        let (success, running, body, message): (bool, bool, Json, Option<String>) =
            match command.as_str() {
                "continue" => (true, true, Json::Null, None),
                "backtrace" => {
                    let total = self.frames.len();
                    let from = (args["fromFrame"].as_u64().unwrap_or(0) as usize).min(total);
                    let to = args["toFrame"]
                        .as_u64()
                        .map(|t| t as usize)
                        .unwrap_or(total)
                        .clamp(from, total);
                    let frames: Vec<Json> = self.frames[from..to]
                        .iter()
                        .map(|f| json!({ "index": f.index, "text": f.to_string() }))
                        .collect();
                    (
                        true,
                        false,
                        json!({ "fromFrame": from, "toFrame": to, "totalFrames": total, "frames": frames }),
                        None,
                    )
                }
                "frame" => {
                    let index = args["number"].as_u64().unwrap_or(0) as usize;
                    match self.frames.get(index) {
                        Some(frame) => (
                            true,
                            false,
                            json!({ "index": index, "text": frame.to_string() }),
                            None,
                        ),
                        None => (false, false, Json::Null, Some(format!("Frame {} not found", index))),
                    }
                }
                "evaluate" => {
                    let expression = args["expression"].as_str().unwrap_or("");
                    match evaluate_expression(&self.context, expression) {
                        Ok(value) => (
                            true,
                            false,
                            json!({ "text": value.to_string(), "type": value.type_name() }),
                            None,
                        ),
                        Err(err) => (false, false, Json::Null, Some(err.to_string())),
                    }
                }
                "scripts" => {
                    let scripts: Vec<Json> = self
                        .scripts
                        .iter()
                        .map(|s| {
                            json!({
                                "id": s.id.map(|id| id.0),
                                "name": s.name.clone().unwrap_or_else(|| "<anonymous>".to_string()),
                                "lineCount": s.line_count(),
                            })
                        })
                        .collect();
                    (true, false, Json::Array(scripts), None)
                }
                "source" => (true, false, json!({ "source": self.source }), None),
                "setbreakpoint" => {
                    let id = self.next_breakpoint.get();
                    self.next_breakpoint.set(id + 1);
                    (true, false, json!({ "breakpoint": id, "line": args["line"] }), None)
                }
                "clearbreakpoint" => (true, false, json!({ "breakpoint": args["breakpoint"] }), None),
                other => (false, false, Json::Null, Some(format!("Unknown command \"{}\"", other))),
            };

        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        Ok(json!({
            "seq": seq,
            "request_seq": request_seq,
            "type": "response",
            "command": command,
            "success": success,
            "running": running,
            "body": body,
            "message": message,
        })
        .to_string())
    }
}

/// `name = "value"` or `name = 'value'` inside `text`.
fn quoted_assignment(text: &str, name: &str) -> Option<String> {
    let start = text.find(name)? + name.len();
    let rest = text[start..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}

fn split_assignment(statement: &str) -> Option<(&str, &str)> {
    let (name, expr) = statement.split_once('=')?;
    let name = name.trim().strip_prefix("var ").unwrap_or(name.trim()).trim();
    if expr.starts_with('=') || name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, expr.trim()))
}

fn term(context: &ExecutionContext, token: &str) -> Result<Value, ScriptError> {
    if token.is_empty() {
        return Err(ScriptError::new("SyntaxError", "Unexpected end of input"));
    }
    let quoted = |q: char| token.len() >= 2 && token.starts_with(q) && token.ends_with(q);
    if quoted('"') || quoted('\'') {
        return Ok(Value::from(&token[1..token.len() - 1]));
    }
    if let Ok(n) = token.parse::<f64>() {
        return Ok(Value::Number(n));
    }
    match token {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        "undefined" => return Ok(Value::Undefined),
        _ => {}
    }
    context
        .global_object()
        .get(token)
        .ok_or_else(|| ScriptError::new("ReferenceError", format!("{} is not defined", token)))
}

/// Literals, globals and `+`.
pub fn evaluate_expression(context: &ExecutionContext, expr: &str) -> Result<Value, ScriptError> {
    let expr = expr.trim();
    let terms = expr
        .split('+')
        .map(|t| term(context, t.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    if terms.len() == 1 {
        return Ok(terms.into_iter().next().unwrap_or_default());
    }
    if terms.iter().all(|t| t.as_f64().is_some()) {
        return Ok(Value::Number(terms.iter().filter_map(Value::as_f64).sum()));
    }
    Ok(Value::String(terms.iter().map(|t| t.to_string()).collect()))
}
