//! Configuration file loading for sandscript
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `SANDSCRIPT_` environment variables (`SANDSCRIPT_LUAENGINE__ENABLED=false`)
//! 2. `--config <path>` specified file
//! 3. Project root: `./sandscript.toml` or `./.sandscript.toml`
//! 4. Global: `$XDG_CONFIG_HOME/sandscript/config.toml`
//! 5. Default values
//!
//! The file is a set of INI-like sections (`[Startup]`, `[LuaEngine]`,
//! `[Capabilities]`, ...) holding scalar values. Engines read them through
//! [`FileConfigSource`], the adapter for the application's `ConfigSource`
//! port.

mod file_config;
mod loader;
mod source;

pub use file_config::{CAPABILITIES_SECTION, FileConfig, FileSection, FileValue};
pub use loader::ConfigLoader;
pub use source::FileConfigSource;

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a [`FileConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}
