//! Debug event bridge: engine notifications in, host handlers and a command loop out.

use crate::config::DebugConfig;
use crate::debug::command_loop::CommandChannel;
use crate::debug::events::{DebugEvent, DebugEventKind};
use crate::debug::journal::{DeliveryOutcome, EventJournal};
use crate::debug::protocol::{self, CommandRequest, CommandResponse, DebugCommand, DebugMessage};
use crate::engine::{CommandProcessor, DebugListener, RawDebugEvent, ScriptEngine};
use crate::error::{HostError, ProtocolError};
use parking_lot::{Condvar, Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, error, info, trace, warn};

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
pub type EventHandler = Arc<dyn Fn(&DebugEvent) -> HandlerResult + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(&DebugMessage) -> HandlerResult + Send + Sync>;

#[derive(Default, Clone)]
struct Handlers {
    on_break: Option<EventHandler>,
    on_exception: Option<EventHandler>,
    on_new_function: Option<EventHandler>,
    on_before_compile: Option<EventHandler>,
    on_after_compile: Option<EventHandler>,
    on_message: Option<MessageHandler>,
}

impl Handlers {
    fn slot(&mut self, kind: DebugEventKind) -> &mut Option<EventHandler> {
        match kind {
            DebugEventKind::Break => &mut self.on_break,
            DebugEventKind::Exception => &mut self.on_exception,
            DebugEventKind::NewFunction => &mut self.on_new_function,
            DebugEventKind::BeforeCompile => &mut self.on_before_compile,
            DebugEventKind::AfterCompile => &mut self.on_after_compile,
        }
    }

    fn for_kind(&self, kind: DebugEventKind) -> Option<EventHandler> {
        match kind {
            DebugEventKind::Break => self.on_break.clone(),
            DebugEventKind::Exception => self.on_exception.clone(),
            DebugEventKind::NewFunction => self.on_new_function.clone(),
            DebugEventKind::BeforeCompile => self.on_before_compile.clone(),
            DebugEventKind::AfterCompile => self.on_after_compile.clone(),
        }
    }
}

/// Command loop nesting per thread. Loops may run on several threads at once while the
/// engine lock is temporarily released.
#[derive(Debug, Default)]
struct LoopState {
    depths: HashMap<ThreadId, usize>,
}

impl LoopState {
    fn owned_by(&self, thread: ThreadId) -> bool {
        self.depths.contains_key(&thread)
    }

    fn is_running(&self) -> bool {
        !self.depths.is_empty()
    }
}

struct BridgeInner {
    enabled: AtomicBool,
    break_on_exception: AtomicBool,
    prompt: RwLock<String>,
    handlers: RwLock<Handlers>,
    channel: Mutex<Option<Box<dyn CommandChannel>>>,
    loop_state: Mutex<LoopState>,
    loop_finished: Condvar,
    journal: EventJournal,
    next_request_seq: AtomicU64,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl BridgeInner {
    fn next_seq(&self) -> u64 {
        self.next_request_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Run a handler; failures are reported and never propagate into the engine.
    fn deliver<T: ?Sized>(
        &self,
        what: &str,
        handler: &(dyn Fn(&T) -> HandlerResult + Send + Sync),
        arg: &T,
    ) -> DeliveryOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(arg))) {
            Ok(Ok(())) => DeliveryOutcome::Handled,
            Ok(Err(err)) => {
                warn!(event = what, error = %err, "debug handler failed");
                DeliveryOutcome::HandlerFailed
            }
            Err(payload) => {
                error!(
                    event = what,
                    panic = %panic_message(payload.as_ref()),
                    "debug handler panicked"
                );
                DeliveryOutcome::HandlerFailed
            }
        }
    }

    fn should_pause(&self, kind: DebugEventKind) -> bool {
        match kind {
            DebugEventKind::Break => true,
            DebugEventKind::Exception => self.break_on_exception.load(Ordering::Acquire),
            _ => false,
        }
    }

    fn enter_loop(&self) {
        let mut state = self.loop_state.lock();
        *state.depths.entry(thread::current().id()).or_insert(0) += 1;
    }

    fn leave_loop(&self) {
        let mut state = self.loop_state.lock();
        let thread = thread::current().id();
        if let Some(depth) = state.depths.get_mut(&thread) {
            *depth -= 1;
            if *depth == 0 {
                state.depths.remove(&thread);
            }
        }
        if !state.is_running() {
            drop(state);
            self.loop_finished.notify_all();
        }
    }

    fn execute(
        &self,
        processor: &dyn CommandProcessor,
        text: &str,
    ) -> Result<CommandResponse, HostError> {
        protocol::execute(processor, self.next_seq(), text)
    }

    /// Blocking request/response loop over the registered channel. Returns once a response
    /// reports `running`, or the channel is closed.
    fn run_command_loop(&self, event: &DebugEvent) {
        let Some(processor) = event.command_processor() else {
            debug!(kind = %event.kind(), "paused event carries no command processor");
            return;
        };
        // Taken for the duration of the loop; nested pauses find no channel and do not block.
        let Some(mut channel) = self.channel.lock().take() else {
            return;
        };
        self.enter_loop();
        let prompt = self.prompt.read().clone();
        info!(kind = %event.kind(), "debugger command loop started");

        if let Err(err) = channel.write_response(&event.summary()) {
            warn!(error = %err, "failed to write debugger summary");
        }
        let mut commands = 0usize;
        loop {
            let line = match channel.read_command(&prompt) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("command channel closed, resuming");
                    self.resume(processor);
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    let err = ProtocolError::MalformedCommand(err.to_string());
                    warn!(error = %err, "undecodable debugger command skipped");
                    if let Err(err) = channel.write_response(&format!("error: {}", err)) {
                        warn!(error = %err, "failed to write debugger response");
                    }
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "command channel failed, resuming");
                    self.resume(processor);
                    break;
                }
            };
            commands += 1;
            match self.execute(processor, &line) {
                Ok(response) => {
                    if let Err(err) = channel.write_response(&response.text) {
                        warn!(error = %err, "failed to write debugger response");
                    }
                    if response.running {
                        break;
                    }
                }
                Err(err) => {
                    warn!(command = %line, error = %err, "debugger command failed");
                    if let Err(err) = channel.write_response(&format!("error: {}", err)) {
                        warn!(error = %err, "failed to write debugger response");
                    }
                }
            }
        }

        {
            let mut slot = self.channel.lock();
            if slot.is_none() {
                *slot = Some(channel);
            }
        }
        self.leave_loop();
        info!(commands, "debugger command loop finished");
    }

    fn resume(&self, processor: &dyn CommandProcessor) {
        if let Err(err) = self.execute(processor, "continue") {
            warn!(error = %err, "continue after channel close failed");
        }
    }
}

impl DebugListener for BridgeInner {
    fn on_debug_event(&self, code: u32, raw: Box<dyn RawDebugEvent>) {
        if !self.enabled.load(Ordering::Acquire) {
            trace!(code, "debug event ignored while disabled");
            return;
        }
        let event = match DebugEvent::classify(code, raw) {
            Ok(event) => event,
            Err(err) => {
                warn!(code, error = %err, "unclassifiable debug event dropped");
                return;
            }
        };
        let kind = event.kind();
        let seq = self.journal.record(kind, DeliveryOutcome::Unhandled);
        trace!(seq, kind = %kind, "debug event received");

        let handler = self.handlers.read().for_kind(kind);
        if let Some(handler) = handler {
            let outcome = self.deliver(kind.as_str(), handler.as_ref(), &event);
            self.journal.set_outcome(seq, outcome);
        }

        if self.should_pause(kind) {
            self.run_command_loop(&event);
        }
    }

    fn on_debug_message(&self, json: &str) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        let handler = self.handlers.read().on_message.clone();
        let Some(handler) = handler else {
            return;
        };
        match DebugMessage::parse(json) {
            Ok(message) => {
                self.deliver("message", handler.as_ref(), &message);
            }
            Err(err) => warn!(error = %err, "malformed debug message dropped"),
        }
    }
}

/// Host-side debugger facade over the engine's debug notifications.
///
/// Handlers are optional per event kind. Break events, and exception events when
/// `break_on_exception` is set, enter the blocking command loop if a [`CommandChannel`] has
/// been registered.
#[derive(Clone)]
pub struct DebugBridge {
    inner: Arc<BridgeInner>,
}

impl Default for DebugBridge {
    fn default() -> Self {
        Self::from_config(&DebugConfig::default())
    }
}

impl DebugBridge {
    pub fn from_config(config: &DebugConfig) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                enabled: AtomicBool::new(false),
                break_on_exception: AtomicBool::new(config.break_on_exception),
                prompt: RwLock::new(config.prompt.clone()),
                handlers: RwLock::new(Handlers::default()),
                channel: Mutex::new(None),
                loop_state: Mutex::new(LoopState::default()),
                loop_finished: Condvar::new(),
                journal: EventJournal::new(config.journal_capacity),
                next_request_seq: AtomicU64::new(1),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Register (or clear) the event and message sinks with `engine`.
    ///
    /// Enabling twice is a no-op. Disabling waits for a command loop running on another
    /// thread to finish, and is refused from inside a command loop on the calling thread.
    pub fn set_enabled(&self, engine: &dyn ScriptEngine, enable: bool) -> Result<(), ProtocolError> {
        if enable {
            if self.inner.enabled.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            let listener: Arc<dyn DebugListener> = self.inner.clone();
            engine.set_debug_listener(Some(listener));
            info!("debugger enabled");
            return Ok(());
        }

        if !self.is_enabled() {
            return Ok(());
        }
        {
            let mut state = self.inner.loop_state.lock();
            if state.owned_by(thread::current().id()) {
                error!("debugger disable requested from inside its command loop");
                return Err(ProtocolError::DisableInsideCommandLoop);
            }
            while state.is_running() {
                self.inner.loop_finished.wait(&mut state);
            }
        }
        engine.set_debug_listener(None);
        self.inner.enabled.store(false, Ordering::Release);
        info!("debugger disabled");
        Ok(())
    }

    /// Whether a command loop is running on any thread.
    pub fn in_command_loop(&self) -> bool {
        self.inner.loop_state.lock().is_running()
    }

    pub fn set_handler(&self, kind: DebugEventKind, handler: Option<EventHandler>) {
        *self.inner.handlers.write().slot(kind) = handler;
    }

    pub fn on_break<F>(&self, handler: F)
    where
        F: Fn(&DebugEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(DebugEventKind::Break, Some(Arc::new(handler)));
    }

    pub fn on_exception<F>(&self, handler: F)
    where
        F: Fn(&DebugEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(DebugEventKind::Exception, Some(Arc::new(handler)));
    }

    pub fn on_new_function<F>(&self, handler: F)
    where
        F: Fn(&DebugEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(DebugEventKind::NewFunction, Some(Arc::new(handler)));
    }

    pub fn on_before_compile<F>(&self, handler: F)
    where
        F: Fn(&DebugEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(DebugEventKind::BeforeCompile, Some(Arc::new(handler)));
    }

    pub fn on_after_compile<F>(&self, handler: F)
    where
        F: Fn(&DebugEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(DebugEventKind::AfterCompile, Some(Arc::new(handler)));
    }

    /// Receive the engine's asynchronous JSON debug messages.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&DebugMessage) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.handlers.write().on_message = Some(Arc::new(handler));
    }

    pub fn clear_handlers(&self) {
        *self.inner.handlers.write() = Handlers::default();
    }

    /// Install the channel the command loop reads from. Returns the previous one.
    pub fn set_command_channel(
        &self,
        channel: Option<Box<dyn CommandChannel>>,
    ) -> Option<Box<dyn CommandChannel>> {
        std::mem::replace(&mut *self.inner.channel.lock(), channel)
    }

    pub fn take_command_channel(&self) -> Option<Box<dyn CommandChannel>> {
        self.inner.channel.lock().take()
    }

    pub fn break_on_exception(&self) -> bool {
        self.inner.break_on_exception.load(Ordering::Acquire)
    }

    pub fn set_break_on_exception(&self, enable: bool) {
        self.inner.break_on_exception.store(enable, Ordering::Release);
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        *self.inner.prompt.write() = prompt.into();
    }

    pub fn journal(&self) -> &EventJournal {
        &self.inner.journal
    }

    /// Translate a textual command for a paused engine and return its rendered response.
    pub fn process_command(
        &self,
        processor: &dyn CommandProcessor,
        text: &str,
    ) -> Result<CommandResponse, HostError> {
        self.inner.execute(processor, text)
    }

    pub fn debug_break(&self, engine: &dyn ScriptEngine) {
        debug!("debug break requested");
        engine.debug_break();
    }

    /// Queue a textual command for asynchronous processing by the engine. The response
    /// arrives through the message handler. Returns the request's sequence number.
    pub fn send_command(&self, engine: &dyn ScriptEngine, text: &str) -> Result<u64, ProtocolError> {
        let command = DebugCommand::parse(text)?;
        let seq = self.inner.next_seq();
        let request = CommandRequest::new(seq, &command);
        trace!(seq, command = %request.command, "debug command queued");
        engine.send_debug_command(&request.encode()?);
        Ok(seq)
    }

    pub fn process_debug_messages(&self, engine: &dyn ScriptEngine) {
        engine.process_debug_messages();
    }
}
