//! Script engine port: interface every pluggable engine implements.
//!
//! This port abstracts the engine so that:
//! - The region loader and host never depend on a concrete runtime
//! - A no-op implementation (`NoScriptEngine`) is always available
//! - Engines are selected by name through the `EngineRegistry`

use sandscript_domain::{
    CompileError, CompiledUnit, EngineState, LifecycleError, ObjectId, ScriptExecutionContext,
    ScriptItem, ScriptValue,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use super::config_source::ConfigSource;
use super::region::RegionContext;

/// Failure of an engine lifecycle operation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("engine configuration error: {0}")]
    Config(String),

    #[error("engine runtime error: {0}")]
    Runtime(String),
}

/// Failure to load, address or signal a script.
#[derive(Error, Debug)]
pub enum ScriptLoadError {
    #[error("script engine is not active (state: {state})")]
    NotActive { state: EngineState },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("unknown script: {0}")]
    UnknownScript(ObjectId),

    #[error("script worker unavailable: {0}")]
    Worker(String),
}

/// Run state of one loaded script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStatus {
    /// Worker alive and accepting events.
    Running,
    /// The script raised an error or exceeded its budget; no further
    /// events are delivered.
    Faulted(String),
    /// Worker ended (removed or engine closed).
    Stopped,
}

/// Port for a per-region script engine.
///
/// The region loader owns one instance exclusively and drives its
/// lifecycle: `initialize` → `post_initialize` → `close`.
pub trait ScriptEnginePort: Send + Sync {
    /// Registry name of the engine implementation.
    fn name(&self) -> &str;

    fn state(&self) -> EngineState;

    /// Whether the engine is actually available (i.e. not `NoScriptEngine`).
    fn is_available(&self) -> bool;

    /// Read configuration and come up. A disabled engine returns `Ok` and
    /// stays `Uninitialized`.
    fn initialize(
        &mut self,
        region: Arc<RegionContext>,
        config: &mut dyn ConfigSource,
    ) -> Result<(), EngineError>;

    /// Second-phase startup; a no-op unless `initialize` activated the engine.
    fn post_initialize(&mut self) -> Result<(), EngineError>;

    /// Release every script and the compiler chain. Safe in any state.
    fn close(&mut self) -> Result<(), EngineError>;

    /// Compile and start a script, replacing any instance with the same id.
    fn load_script(&mut self, item: ScriptItem) -> Result<Arc<CompiledUnit>, ScriptLoadError>;

    /// Stop a script and dispose its handles. Returns whether it existed.
    fn remove_script(&mut self, script_id: ObjectId) -> bool;

    /// Queue an event for a running script.
    fn post_event(
        &self,
        script_id: ObjectId,
        event: &str,
        args: Vec<ScriptValue>,
    ) -> Result<(), ScriptLoadError>;

    fn running_scripts(&self) -> Vec<ScriptExecutionContext>;

    fn script_status(&self, script_id: ObjectId) -> Option<ScriptStatus>;

    /// Latest compiled unit for a script.
    fn compiled_unit(&self, script_id: ObjectId) -> Option<Arc<CompiledUnit>>;

    /// Reclaim handles whose leases expired by `now`; returns how many.
    fn sweep_leases(&self, now: Instant) -> usize;

    /// Events queued for (or being handled by) a script, counting its
    /// initial load. Engines without a queue report 0.
    fn pending_events(&self, _script_id: ObjectId) -> usize {
        0
    }
}

/// No-op script engine used when scripting is disabled.
///
/// Lifecycle calls succeed without doing anything, scripts are refused,
/// and the engine reports itself as unavailable.
#[derive(Default)]
pub struct NoScriptEngine {
    state: EngineState,
}

impl NoScriptEngine {
    pub const NAME: &'static str = "none";

    pub fn new() -> Self {
        Self::default()
    }
}

impl ScriptEnginePort for NoScriptEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn is_available(&self) -> bool {
        false
    }

    fn initialize(
        &mut self,
        _region: Arc<RegionContext>,
        _config: &mut dyn ConfigSource,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn post_initialize(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.state = EngineState::Closed;
        Ok(())
    }

    fn load_script(&mut self, _item: ScriptItem) -> Result<Arc<CompiledUnit>, ScriptLoadError> {
        Err(ScriptLoadError::NotActive { state: self.state })
    }

    fn remove_script(&mut self, _script_id: ObjectId) -> bool {
        false
    }

    fn post_event(
        &self,
        script_id: ObjectId,
        _event: &str,
        _args: Vec<ScriptValue>,
    ) -> Result<(), ScriptLoadError> {
        Err(ScriptLoadError::UnknownScript(script_id))
    }

    fn running_scripts(&self) -> Vec<ScriptExecutionContext> {
        Vec::new()
    }

    fn script_status(&self, _script_id: ObjectId) -> Option<ScriptStatus> {
        None
    }

    fn compiled_unit(&self, _script_id: ObjectId) -> Option<Arc<CompiledUnit>> {
        None
    }

    fn sweep_leases(&self, _now: Instant) -> usize {
        0
    }
}
