//! Engine Registry
//!
//! The [`EngineRegistry`] maps an engine name to a factory that produces a
//! fresh [`ScriptEnginePort`] for one region. Engine implementations
//! register themselves explicitly at process start; regions then look the
//! configured name up and instantiate it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = Arc::new(EngineRegistry::new());
//! registry.register("lua", engine_factory(|| Ok(LuaScriptEngine::new())))?;
//!
//! let engine = registry.create("lua")?;        // fresh instance per region
//! assert!(registry.create("nope").is_err());   // EngineNotFound
//! ```
//!
//! # Locking
//!
//! One mutex guards the name table and is held only for the map operation
//! itself. Factories run outside the lock, so a slow or panicking factory
//! never blocks registration or other lookups.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use thiserror::Error;

use crate::ports::script_engine::ScriptEnginePort;

/// Error type a factory may return.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Produces a new, uninitialized engine instance.
pub type EngineFactory =
    Arc<dyn Fn() -> Result<Box<dyn ScriptEnginePort>, FactoryError> + Send + Sync>;

/// Wrap a closure returning a concrete engine into an [`EngineFactory`].
pub fn engine_factory<E, F>(f: F) -> EngineFactory
where
    E: ScriptEnginePort + 'static,
    F: Fn() -> Result<E, FactoryError> + Send + Sync + 'static,
{
    Arc::new(move || f().map(|engine| Box::new(engine) as Box<dyn ScriptEnginePort>))
}

/// Errors from registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("script engine not found: '{0}'")]
    EngineNotFound(String),

    #[error("script engine already registered: '{0}'")]
    DuplicateEngine(String),

    #[error("script engine '{name}' failed to start: {cause}")]
    EngineCreationError {
        name: String,
        #[source]
        cause: FactoryError,
    },
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::EngineNotFound(_))
    }
}

/// A factory panicked instead of returning an error.
#[derive(Error, Debug)]
#[error("engine factory panicked: {0}")]
pub struct FactoryPanic(pub String);

/// One registered engine implementation.
#[derive(Clone)]
pub struct EngineDescriptor {
    pub name: String,
    pub factory: EngineFactory,
}

/// Process-wide table of engine implementations.
#[derive(Default)]
pub struct EngineRegistry {
    engines: Mutex<HashMap<String, EngineDescriptor>>,
}

static GLOBAL: OnceLock<Arc<EngineRegistry>> = OnceLock::new();

impl EngineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry. Populated explicitly at startup and
    /// emptied by [`EngineRegistry::clear`] at shutdown.
    pub fn global() -> Arc<EngineRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(EngineRegistry::new())))
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, EngineDescriptor>> {
        // Every critical section is a single map operation, so a poisoned
        // table is still consistent.
        self.engines.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an engine implementation. An existing name is never
    /// overwritten; use [`EngineRegistry::replace`] for that.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: EngineFactory,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut table = self.table();
        if table.contains_key(&name) {
            tracing::warn!(engine = %name, "Rejected duplicate script engine registration");
            return Err(RegistryError::DuplicateEngine(name));
        }
        tracing::debug!(engine = %name, "Registered script engine");
        table.insert(name.clone(), EngineDescriptor { name, factory });
        Ok(())
    }

    /// Register or overwrite an engine. Overwriting is logged.
    pub fn replace(&self, name: impl Into<String>, factory: EngineFactory) {
        let name = name.into();
        let previous = self
            .table()
            .insert(name.clone(), EngineDescriptor { name: name.clone(), factory });
        if previous.is_some() {
            tracing::warn!(engine = %name, "Replaced existing script engine registration");
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.table().remove(name).is_some()
    }

    /// Get the factory registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<EngineFactory, RegistryError> {
        self.table()
            .get(name)
            .map(|d| Arc::clone(&d.factory))
            .ok_or_else(|| RegistryError::EngineNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table().contains_key(name)
    }

    /// Instantiate the engine registered under `name`.
    ///
    /// Factory errors and panics are both reported as
    /// [`RegistryError::EngineCreationError`]; neither escapes to the caller.
    pub fn create(&self, name: &str) -> Result<Box<dyn ScriptEnginePort>, RegistryError> {
        let factory = self.lookup(name)?;

        match catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(Ok(engine)) => Ok(engine),
            Ok(Err(cause)) => Err(RegistryError::EngineCreationError {
                name: name.to_string(),
                cause,
            }),
            Err(payload) => Err(RegistryError::EngineCreationError {
                name: name.to_string(),
                cause: Box::new(FactoryPanic(panic_message(payload.as_ref()))),
            }),
        }
    }

    /// Registered engine names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.table().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Remove every registration (process teardown).
    pub fn clear(&self) {
        self.table().clear();
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
