//! Host runtime: the service object tying engine, lock, context stacks, security and the
//! debugger together.
//!
//! Everything process-wide in an embedding (the engine lock, the debugger's enabled flag)
//! lives on an explicitly constructed [`HostRuntime`] so that tests can build isolated
//! instances. Share one [`EngineLock`] between runtimes with [`HostRuntime::with_lock`].

use crate::config::HostConfig;
use crate::context::{ContextStackManager, ExecutionContext};
use crate::debug::DebugBridge;
use crate::engine::{CompiledScript, GlobalObject, ObjectRef, ScriptEngine, ScriptSource, Value};
use crate::error::HostError;
use crate::lock::{EngineLock, EngineLockGuard};
use crate::security::{GuardedGlobal, SecurityToken, SecurityTokenRegistry};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

pub struct HostRuntime {
    engine: Arc<dyn ScriptEngine>,
    lock: Arc<EngineLock>,
    contexts: ContextStackManager,
    security: SecurityTokenRegistry,
    debugger: DebugBridge,
    config: HostConfig,
}

impl HostRuntime {
    /// Runtime with default configuration.
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Result<Self, HostError> {
        Self::with_config(engine, HostConfig::default())
    }

    pub fn with_config(engine: Arc<dyn ScriptEngine>, config: HostConfig) -> Result<Self, HostError> {
        Self::with_lock(engine, config, Arc::new(EngineLock::new()))
    }

    /// Runtime using an existing engine lock.
    pub fn with_lock(
        engine: Arc<dyn ScriptEngine>,
        config: HostConfig,
        lock: Arc<EngineLock>,
    ) -> Result<Self, HostError> {
        let config = config.validated()?;
        let runtime = Self {
            contexts: ContextStackManager::new(config.context.affinity, config.context.max_depth),
            security: SecurityTokenRegistry::new(config.security.allow_default_domain),
            debugger: DebugBridge::from_config(&config.debug),
            engine,
            lock,
            config,
        };
        if runtime.config.debug.enabled {
            runtime.set_debug_enabled(true)?;
        }
        info!(
            engine = runtime.engine.version(),
            affinity = ?runtime.config.context.affinity,
            "host runtime created"
        );
        Ok(runtime)
    }

    pub fn engine(&self) -> &Arc<dyn ScriptEngine> {
        &self.engine
    }

    pub fn lock(&self) -> &Arc<EngineLock> {
        &self.lock
    }

    pub fn contexts(&self) -> &ContextStackManager {
        &self.contexts
    }

    pub fn security(&self) -> &SecurityTokenRegistry {
        &self.security
    }

    pub fn debugger(&self) -> &DebugBridge {
        &self.debugger
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    // Contexts

    pub fn create_context(&self, global: Option<Arc<dyn GlobalObject>>) -> ExecutionContext {
        let context = ExecutionContext::create(global);
        debug!(context_id = %context.id(), "context created");
        context
    }

    /// New context re-entering `other`'s namespace.
    pub fn wrap_context(&self, other: &ExecutionContext) -> ExecutionContext {
        ExecutionContext::wrapping(other)
    }

    pub fn enter(&self, context: &ExecutionContext) -> Result<(), HostError> {
        Ok(self.contexts.enter(context)?)
    }

    /// Context switch made by running script; joins the current entry sequence.
    pub fn enter_from_script(&self, context: &ExecutionContext) -> Result<(), HostError> {
        Ok(self.contexts.enter_from_script(context)?)
    }

    pub fn leave(&self, context: &ExecutionContext) -> Result<(), HostError> {
        Ok(self.contexts.leave(context)?)
    }

    /// Enter `context` until the returned scope drops. Takes the engine lock first when the
    /// lock discipline is active and `lock.auto_acquire` is set.
    pub fn scope(&self, context: &ExecutionContext) -> Result<ContextScope<'_>, HostError> {
        let guard = (self.config.lock.auto_acquire && self.lock.is_active()).then(|| self.lock.lock());
        self.contexts.enter(context)?;
        Ok(ContextScope {
            runtime: self,
            context: context.clone(),
            guard,
        })
    }

    pub fn current(&self) -> Option<ExecutionContext> {
        self.contexts.current()
    }

    pub fn entered(&self) -> Option<ExecutionContext> {
        self.contexts.entered()
    }

    pub fn calling(&self) -> Option<ExecutionContext> {
        self.contexts.calling()
    }

    pub fn in_context(&self) -> bool {
        self.contexts.in_context()
    }

    // Script execution, always in the current context

    pub fn compile(
        &self,
        source: impl Into<ScriptSource>,
    ) -> Result<Box<dyn CompiledScript>, HostError> {
        let context = self.contexts.require_current()?;
        let source = source.into();
        debug!(context_id = %context.id(), script = source.display_name(), "compile");
        Ok(self.engine.compile(&context, &source)?)
    }

    pub fn run(&self, script: &dyn CompiledScript) -> Result<Value, HostError> {
        let context = self.contexts.require_current()?;
        script.run(&context).map_err(|err| {
            debug!(context_id = %context.id(), error = %err, "script raised");
            HostError::from(err)
        })
    }

    pub fn eval(&self, source: impl Into<ScriptSource>) -> Result<Value, HostError> {
        let context = self.contexts.require_current()?;
        let source = source.into();
        self.engine.eval(&context, &source).map_err(|err| {
            debug!(context_id = %context.id(), error = %err, "script raised");
            HostError::from(err)
        })
    }

    // Security

    pub fn set_security_token(&self, context: &ExecutionContext, token: impl Into<SecurityToken>) {
        self.security.set_token(context, token);
    }

    pub fn check_access(&self, source: &ExecutionContext, target: &ExecutionContext) -> bool {
        self.security.check_access(source, target)
    }

    /// Access `target` from the current context.
    pub fn access(&self, target: &ObjectRef) -> Result<GuardedGlobal<'_>, HostError> {
        let source = self.contexts.require_current()?;
        Ok(self.security.guard(&source, target))
    }

    // Debugging

    pub fn debug_enabled(&self) -> bool {
        self.debugger.is_enabled()
    }

    pub fn set_debug_enabled(&self, enable: bool) -> Result<(), HostError> {
        Ok(self.debugger.set_enabled(self.engine.as_ref(), enable)?)
    }

    pub fn debug_break(&self) {
        self.debugger.debug_break(self.engine.as_ref());
    }

    pub fn send_debug_command(&self, text: &str) -> Result<u64, HostError> {
        Ok(self.debugger.send_command(self.engine.as_ref(), text)?)
    }

    pub fn process_debug_messages(&self) {
        self.debugger.process_debug_messages(self.engine.as_ref());
    }
}

impl Drop for HostRuntime {
    fn drop(&mut self) {
        if self.debugger.is_enabled() {
            if let Err(err) = self.debugger.set_enabled(self.engine.as_ref(), false) {
                error!(error = %err, "failed to detach debugger");
            }
        }
    }
}

/// An entered context. Leaves the context, then releases any engine lock it took.
#[must_use = "the context is left as soon as the scope is dropped"]
pub struct ContextScope<'a> {
    runtime: &'a HostRuntime,
    context: ExecutionContext,
    guard: Option<EngineLockGuard<'a>>,
}

impl ContextScope<'_> {
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn eval(&self, source: impl Into<ScriptSource>) -> Result<Value, HostError> {
        self.runtime.eval(source)
    }

    pub fn holds_lock(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.runtime.contexts.leave(&self.context) {
            if !thread::panicking() {
                panic!("context scope left out of order: {err}");
            }
        }
    }
}
