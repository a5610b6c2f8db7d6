//! Merge rules: built-in defaults, applied before any file or environment source.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the host defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("lock.auto_acquire", true)?
        .set_default("context.affinity", "thread")?
        .set_default("context.max_depth", 1024_i64)?
        .set_default("security.allow_default_domain", true)?
        .set_default("debug.enabled", false)?
        .set_default("debug.break_on_exception", true)?
        .set_default("debug.prompt", "dbg> ")?
        .set_default("debug.journal_capacity", 1024_i64)
}
