//! Configuration loading facade.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::HostConfig;
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`HostConfig`] from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Merge, lowest precedence first: built-in defaults, the global file, the workspace
    /// files under `<workspace_root>/config/`, then `SCRIPTHOST_*` environment variables
    /// (`__` separates nested keys, e.g. `SCRIPTHOST_DEBUG__ENABLED=true`).
    pub fn load(workspace_root: &Path) -> Result<HostConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            Environment::with_prefix("SCRIPTHOST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let config: HostConfig = builder.build()?.try_deserialize()?;
        debug!(workspace_root = %workspace_root.display(), "configuration loaded");
        Ok(config)
    }

    /// Load a single file over the built-in defaults.
    pub fn load_from_file(path: &Path) -> Result<HostConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn default() -> HostConfig {
        HostConfig::default()
    }
}
