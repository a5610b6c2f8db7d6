//! Debugger command protocol.
//!
//! Textual shell commands are parsed into [`DebugCommand`], encoded as JSON requests for
//! the engine's command processor, and the JSON responses are decoded and rendered back
//! into a [`CommandResponse`] carrying display text and the `running` flag.

use crate::engine::CommandProcessor;
use crate::error::{HostError, ProtocolError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    In,
    Next,
    Out,
}

impl StepAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StepAction::In => "in",
            StepAction::Next => "next",
            StepAction::Out => "out",
        }
    }
}

impl FromStr for StepAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(StepAction::In),
            "next" => Ok(StepAction::Next),
            "out" => Ok(StepAction::Out),
            other => Err(ProtocolError::InvalidArgument {
                command: "step".to_string(),
                reason: format!("unknown step action '{}'", other),
            }),
        }
    }
}

/// A parsed debugger shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugCommand {
    Continue,
    Step { action: StepAction, count: u32 },
    Backtrace { from: Option<u32>, to: Option<u32> },
    Frame { number: Option<u32> },
    Print { expression: String },
    Scripts,
    Source { from: Option<u32>, to: Option<u32> },
    SetBreakpoint { script: String, line: u32 },
    ClearBreakpoint { id: u32 },
}

fn parse_number(command: &str, token: &str) -> Result<u32, ProtocolError> {
    token.parse().map_err(|_| ProtocolError::InvalidArgument {
        command: command.to_string(),
        reason: format!("expected a number, got '{}'", token),
    })
}

fn optional_number(command: &str, token: Option<&str>) -> Result<Option<u32>, ProtocolError> {
    token.map(|t| parse_number(command, t)).transpose()
}

fn missing(command: &str, what: &str) -> ProtocolError {
    ProtocolError::InvalidArgument {
        command: command.to_string(),
        reason: format!("missing {}", what),
    }
}

fn at_least_one(command: &str, count: u32) -> Result<u32, ProtocolError> {
    if count == 0 {
        return Err(ProtocolError::InvalidArgument {
            command: command.to_string(),
            reason: "count must be at least 1".to_string(),
        });
    }
    Ok(count)
}

fn no_more_arguments<'a>(
    command: &str,
    mut args: impl Iterator<Item = &'a str>,
) -> Result<(), ProtocolError> {
    match args.next() {
        Some(extra) => Err(ProtocolError::InvalidArgument {
            command: command.to_string(),
            reason: format!("unexpected argument '{}'", extra),
        }),
        None => Ok(()),
    }
}

impl DebugCommand {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };
        let mut args = rest.split_whitespace();
        match head {
            "" => Err(ProtocolError::EmptyCommand),
            "continue" | "c" => Ok(DebugCommand::Continue),
            "step" | "s" => {
                let mut action = StepAction::In;
                let mut count = 1;
                if let Some(first) = args.next() {
                    match first.parse::<u32>() {
                        Ok(n) => count = n,
                        Err(_) => {
                            action = first.parse()?;
                            count = optional_number(head, args.next())?.unwrap_or(1);
                        }
                    }
                }
                no_more_arguments(head, args)?;
                Ok(DebugCommand::Step {
                    action,
                    count: at_least_one(head, count)?,
                })
            }
            "next" | "n" => {
                let count = optional_number(head, args.next())?.unwrap_or(1);
                no_more_arguments(head, args)?;
                Ok(DebugCommand::Step {
                    action: StepAction::Next,
                    count: at_least_one(head, count)?,
                })
            }
            "out" => {
                no_more_arguments(head, args)?;
                Ok(DebugCommand::Step {
                    action: StepAction::Out,
                    count: 1,
                })
            }
            "backtrace" | "bt" => Ok(DebugCommand::Backtrace {
                from: optional_number(head, args.next())?,
                to: optional_number(head, args.next())?,
            }),
            "frame" | "f" => Ok(DebugCommand::Frame {
                number: optional_number(head, args.next())?,
            }),
            "print" | "p" => {
                if rest.is_empty() {
                    return Err(missing(head, "expression"));
                }
                Ok(DebugCommand::Print {
                    expression: rest.to_string(),
                })
            }
            "scripts" => Ok(DebugCommand::Scripts),
            "source" => Ok(DebugCommand::Source {
                from: optional_number(head, args.next())?,
                to: optional_number(head, args.next())?,
            }),
            "break" | "b" => {
                let target = args.next().ok_or_else(|| missing(head, "<script>:<line>"))?;
                let (script, line) = target
                    .rsplit_once(':')
                    .ok_or_else(|| missing(head, "':<line>'"))?;
                if script.is_empty() {
                    return Err(missing(head, "script name"));
                }
                Ok(DebugCommand::SetBreakpoint {
                    script: script.to_string(),
                    line: parse_number(head, line)?,
                })
            }
            "clear" => {
                let id = args.next().ok_or_else(|| missing(head, "breakpoint id"))?;
                Ok(DebugCommand::ClearBreakpoint {
                    id: parse_number(head, id)?,
                })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    /// Protocol command name.
    pub fn name(&self) -> &'static str {
        match self {
            DebugCommand::Continue | DebugCommand::Step { .. } => "continue",
            DebugCommand::Backtrace { .. } => "backtrace",
            DebugCommand::Frame { .. } => "frame",
            DebugCommand::Print { .. } => "evaluate",
            DebugCommand::Scripts => "scripts",
            DebugCommand::Source { .. } => "source",
            DebugCommand::SetBreakpoint { .. } => "setbreakpoint",
            DebugCommand::ClearBreakpoint { .. } => "clearbreakpoint",
        }
    }

    pub fn arguments(&self) -> Option<Json> {
        match self {
            DebugCommand::Continue | DebugCommand::Scripts => None,
            DebugCommand::Step { action, count } => Some(json!({
                "stepaction": action.as_str(),
                "stepcount": count,
            })),
            DebugCommand::Backtrace { from, to } => {
                let mut args = serde_json::Map::new();
                if let Some(from) = from {
                    args.insert("fromFrame".into(), json!(from));
                }
                if let Some(to) = to {
                    args.insert("toFrame".into(), json!(to));
                }
                (!args.is_empty()).then_some(Json::Object(args))
            }
            DebugCommand::Frame { number } => number.map(|n| json!({ "number": n })),
            DebugCommand::Print { expression } => Some(json!({ "expression": expression })),
            DebugCommand::Source { from, to } => {
                let mut args = serde_json::Map::new();
                if let Some(from) = from {
                    args.insert("fromLine".into(), json!(from));
                }
                if let Some(to) = to {
                    args.insert("toLine".into(), json!(to));
                }
                (!args.is_empty()).then_some(Json::Object(args))
            }
            DebugCommand::SetBreakpoint { script, line } => Some(json!({
                "type": "script",
                "target": script,
                "line": line,
            })),
            DebugCommand::ClearBreakpoint { id } => Some(json!({ "breakpoint": id })),
        }
    }

    /// Whether a successful response lets the engine resume.
    pub fn resumes(&self) -> bool {
        matches!(self, DebugCommand::Continue | DebugCommand::Step { .. })
    }
}

impl FromStr for DebugCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DebugCommand::parse(s)
    }
}

/// Outgoing JSON request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub seq: u64,
    #[serde(rename = "type")]
    pub message_type: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Json>,
}

impl CommandRequest {
    pub fn new(seq: u64, command: &DebugCommand) -> Self {
        Self {
            seq,
            message_type: "request".to_string(),
            command: command.name().to_string(),
            arguments: command.arguments(),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::MalformedRequest(e.to_string()))
    }
}

/// Incoming JSON response, as produced by the engine's command processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub request_seq: u64,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub command: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub body: Option<Json>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ResponseMessage {
    pub fn decode(json: &str) -> Result<Self, ProtocolError> {
        let message: ResponseMessage = serde_json::from_str(json)
            .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;
        if message.message_type != "response" {
            return Err(ProtocolError::MalformedResponse(format!(
                "expected a response, got '{}'",
                message.message_type
            )));
        }
        Ok(message)
    }
}

/// What the command loop shows and whether it should return control to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResponse {
    pub text: String,
    pub running: bool,
    pub success: bool,
}

fn string_field<'a>(body: &'a Json, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Json::as_str)
}

fn render_body(command: &DebugCommand, body: &Json) -> String {
    match command {
        DebugCommand::Backtrace { .. } => {
            let frames = body.get("frames").and_then(Json::as_array);
            match frames {
                Some(frames) if !frames.is_empty() => frames
                    .iter()
                    .map(|frame| match string_field(frame, "text") {
                        Some(text) => text.to_string(),
                        None => frame.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
                _ => "no stack frames".to_string(),
            }
        }
        DebugCommand::Scripts => match body.as_array() {
            Some(scripts) => scripts
                .iter()
                .map(|script| {
                    let id = script.get("id").map(Json::to_string).unwrap_or_default();
                    let name = string_field(script, "name").unwrap_or("<anonymous>");
                    match script.get("lineCount").and_then(Json::as_u64) {
                        Some(lines) => format!("{}: {} ({} lines)", id, name, lines),
                        None => format!("{}: {}", id, name),
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            None => body.to_string(),
        },
        DebugCommand::Source { .. } => string_field(body, "source")
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        DebugCommand::SetBreakpoint { .. } => match body.get("breakpoint") {
            Some(id) => format!("breakpoint {} set", id),
            None => body.to_string(),
        },
        DebugCommand::ClearBreakpoint { .. } => match body.get("breakpoint") {
            Some(id) => format!("breakpoint {} cleared", id),
            None => body.to_string(),
        },
        _ => match body {
            Json::String(s) => s.clone(),
            Json::Null => String::new(),
            other => string_field(other, "text")
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        },
    }
}

impl CommandResponse {
    pub fn from_message(command: &DebugCommand, message: &ResponseMessage) -> Self {
        if !message.success {
            return Self {
                text: message
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{} failed", command.name())),
                running: message.running,
                success: false,
            };
        }
        let text = match &message.body {
            Some(body) => render_body(command, body),
            None if command.resumes() => "running".to_string(),
            None => String::new(),
        };
        Self {
            text,
            running: message.running,
            success: true,
        }
    }
}

/// Run one textual command through a paused engine's processor.
pub fn execute(
    processor: &dyn CommandProcessor,
    seq: u64,
    text: &str,
) -> Result<CommandResponse, HostError> {
    let command = DebugCommand::parse(text)?;
    let request = CommandRequest::new(seq, &command);
    let raw = processor.process(&request.encode()?)?;
    let message = ResponseMessage::decode(&raw)?;
    if message.request_seq != 0 && message.request_seq != seq {
        return Err(ProtocolError::MalformedResponse(format!(
            "response to request {} received for request {}",
            message.request_seq, seq
        ))
        .into());
    }
    Ok(CommandResponse::from_message(&command, &message))
}

/// Asynchronous message from the engine's debug agent.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugMessage {
    Event { seq: u64, event: String, body: Json },
    Response(ResponseMessage),
    Other(Json),
}

impl DebugMessage {
    pub fn parse(json: &str) -> Result<Self, ProtocolError> {
        let value: Json = serde_json::from_str(json)
            .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;
        match string_field(&value, "type") {
            Some("event") => Ok(DebugMessage::Event {
                seq: value.get("seq").and_then(Json::as_u64).unwrap_or(0),
                event: string_field(&value, "event").unwrap_or_default().to_string(),
                body: value.get("body").cloned().unwrap_or(Json::Null),
            }),
            Some("response") => ResponseMessage::decode(json).map(DebugMessage::Response),
            _ => Ok(DebugMessage::Other(value)),
        }
    }

    pub fn is_break(&self) -> bool {
        matches!(self, DebugMessage::Event { event, .. } if event == "break")
    }
}

impl fmt::Display for DebugMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugMessage::Event { seq, event, .. } => write!(f, "event {} (seq {})", event, seq),
            DebugMessage::Response(r) => write!(
                f,
                "response to {} (request {})",
                r.command.as_deref().unwrap_or("?"),
                r.request_seq
            ),
            DebugMessage::Other(value) => write!(f, "{}", value),
        }
    }
}
