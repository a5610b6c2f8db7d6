//! Shared test utilities for integration tests
//!
//! Provides runtime construction over the scripted engine, recording debug handlers, and
//! serialized access to HOME / SCRIPTHOST_* environment variables.

#![allow(dead_code)]

use crate::integration::test_engine::ScriptedEngine;
use parking_lot::Mutex as PlMutex;
use scripthost::config::HostConfig;
use scripthost::debug::{CommandChannel, DebugEvent, DebugEventKind, ScriptedChannel};
use scripthost::runtime::HostRuntime;
use std::io;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
    scripthost_env: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
            scripthost_env: std::env::var("SCRIPTHOST_ENV").ok(),
        }
    }

    fn restore(self) {
        for (key, value) in [
            ("HOME", self.home),
            ("XDG_CONFIG_HOME", self.xdg_config_home),
            ("SCRIPTHOST_ENV", self.scripthost_env),
        ] {
            match value {
                Some(orig) => std::env::set_var(key, orig),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointing into `test_dir`.
///
/// The global config file then lives at `<test_dir>/scripthost/config.toml`.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path().to_str().unwrap());
    std::env::remove_var("SCRIPTHOST_ENV");

    let result = f();

    env_state.restore();

    result
}

/// A scripted engine plus a runtime driving it.
pub fn runtime() -> (ScriptedEngine, HostRuntime) {
    runtime_with(HostConfig::default())
}

pub fn runtime_with(config: HostConfig) -> (ScriptedEngine, HostRuntime) {
    let engine = ScriptedEngine::new();
    let runtime = HostRuntime::with_config(Arc::new(engine.clone()), config).unwrap();
    (engine, runtime)
}

/// Runtime with the debugger enabled.
pub fn debug_runtime() -> (ScriptedEngine, HostRuntime) {
    let mut config = HostConfig::default();
    config.debug.enabled = true;
    runtime_with(config)
}

/// Text of every delivered event, in arrival order.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<PlMutex<Vec<(DebugEventKind, String)>>>,
}

impl EventLog {
    pub fn record(&self, event: &DebugEvent) {
        self.entries.lock().push((event.kind(), event.to_string()));
    }

    pub fn kinds(&self) -> Vec<DebugEventKind> {
        self.entries.lock().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, text)| text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Record before/after compile events of `runtime` into a fresh log.
pub fn record_compiles(runtime: &HostRuntime) -> EventLog {
    let log = EventLog::default();
    let before = log.clone();
    runtime.debugger().on_before_compile(move |event| {
        before.record(event);
        Ok(())
    });
    let after = log.clone();
    runtime.debugger().on_after_compile(move |event| {
        after.record(event);
        Ok(())
    });
    log
}

/// Scripted command channel that stays inspectable after the bridge takes ownership.
#[derive(Clone)]
pub struct SharedChannel {
    inner: Arc<PlMutex<ScriptedChannel>>,
}

impl SharedChannel {
    pub fn new(commands: &[&str]) -> Self {
        Self {
            inner: Arc::new(PlMutex::new(ScriptedChannel::new(commands.iter().copied()))),
        }
    }

    /// Register a handle to this channel as `runtime`'s command channel.
    pub fn install(&self, runtime: &HostRuntime) {
        runtime
            .debugger()
            .set_command_channel(Some(Box::new(self.clone())));
    }

    pub fn responses(&self) -> Vec<String> {
        self.inner.lock().responses().to_vec()
    }

    pub fn remaining(&self) -> usize {
        self.inner.lock().remaining()
    }
}

impl CommandChannel for SharedChannel {
    fn read_command(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.inner.lock().read_command(prompt)
    }

    fn write_response(&mut self, text: &str) -> io::Result<()> {
        self.inner.lock().write_response(text)
    }
}
