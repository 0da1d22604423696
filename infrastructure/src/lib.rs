//! Infrastructure layer for sandscript
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: configuration file loading, the Lua 5.4
//! script engine with its compilers, and stand-alone region services.

pub mod config;
pub mod engines;
pub mod region;

#[cfg(feature = "scripting")]
pub mod scripting;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, FileConfig, FileConfigSource, FileValue};
pub use engines::register_builtin_engines;
pub use region::{EstatePermissions, InMemoryUserDirectory};

#[cfg(feature = "scripting")]
pub use scripting::{LuaBackendCompiler, LuaScriptEngine, SlangTranslator};
