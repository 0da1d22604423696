//! Built-in engine registration.
//!
//! Hosts call [`register_builtin_engines`] once at start-up, before any
//! region is created.

use sandscript_application::{EngineRegistry, RegistryError};

#[cfg(feature = "scripting")]
use crate::scripting::LuaScriptEngine;
#[cfg(feature = "scripting")]
use sandscript_application::engine_factory;

/// Register every engine compiled into this build.
pub fn register_builtin_engines(registry: &EngineRegistry) -> Result<(), RegistryError> {
    #[cfg(feature = "scripting")]
    registry.register(
        LuaScriptEngine::NAME,
        engine_factory(|| Ok(LuaScriptEngine::new())),
    )?;

    tracing::debug!(engines = ?registry.names(), "Built-in script engines registered");
    Ok(())
}
