//! Region engine loader use case
//!
//! Owns the script engine of one region and drives it from the region's
//! lifecycle hooks:
//!
//! 1. **on_region_created** - read `[Startup]`, look the engine up in the
//!    [`EngineRegistry`] and initialize it
//! 2. **on_post_initialize** - second startup phase
//! 3. **on_region_closing** - close and drop the engine
//!
//! The region must come up whatever the scripting configuration says.
//! Every failure on this path (unknown engine name, factory error,
//! initialize error, panic inside engine code) is logged and leaves the
//! region running without scripting. An engine that turns itself off
//! through its own section stays attached in `Uninitialized`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::ports::config_source::ConfigSource;
use crate::ports::region::RegionContext;
use crate::ports::script_engine::{EngineError, ScriptEnginePort};
use crate::registry::{EngineRegistry, panic_message};

/// Section holding region startup switches.
pub const STARTUP_SECTION: &str = "Startup";
/// Key naming the engine implementation to use.
pub const SCRIPT_ENGINE_KEY: &str = "script_engine";
/// Master switch for scripting in the region.
pub const SCRIPTING_ENABLED_KEY: &str = "scripting_enabled";
/// Engine used when `[Startup]` does not name one.
pub const DEFAULT_ENGINE: &str = "lua";

/// Per-region owner of the script engine.
pub struct RegionEngineLoader {
    registry: Arc<EngineRegistry>,
    engine: Option<Box<dyn ScriptEnginePort>>,
    region_name: Option<String>,
}

impl RegionEngineLoader {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            engine: None,
            region_name: None,
        }
    }

    /// Select, create and initialize the configured engine.
    pub fn on_region_created(&mut self, region: Arc<RegionContext>, config: &mut dyn ConfigSource) {
        if self.engine.is_some() {
            warn!(region = %region.name, "Region created twice; closing previous script engine");
            self.on_region_closing();
        }
        self.region_name = Some(region.name.clone());

        let startup = config.section(STARTUP_SECTION).unwrap_or_default();
        if !startup.get_bool(SCRIPTING_ENABLED_KEY, true) {
            info!(region = %region.name, "Scripting disabled for region");
            return;
        }
        let engine_name = startup.get_string(SCRIPT_ENGINE_KEY, DEFAULT_ENGINE);

        let mut engine = match self.registry.create(&engine_name) {
            Ok(engine) => engine,
            Err(e) => {
                error!(
                    region = %region.name,
                    engine = %engine_name,
                    error = %e,
                    "Could not create script engine; region continues without scripting"
                );
                return;
            }
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            engine.initialize(Arc::clone(&region), config)
        }));
        if let Err(reason) = flatten(result) {
            error!(
                region = %region.name,
                engine = %engine_name,
                error = %reason,
                "Script engine failed to initialize; region continues without scripting"
            );
            close_quietly(engine.as_mut(), &region.name);
            return;
        }

        if engine.state().is_active() {
            info!(region = %region.name, engine = %engine_name, "Script engine initialized");
        } else {
            // Kept as-is so its state stays observable; it accepts no scripts.
            info!(
                region = %region.name,
                engine = %engine_name,
                state = %engine.state(),
                "Script engine disabled by its configuration"
            );
        }
        self.engine = Some(engine);
    }

    /// Forward the second startup phase. Failure drops the engine.
    pub fn on_post_initialize(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let region = self.region_name.as_deref().unwrap_or("?");

        let result = catch_unwind(AssertUnwindSafe(|| engine.post_initialize()));
        if let Err(reason) = flatten(result) {
            error!(
                region,
                engine = engine.name(),
                error = %reason,
                "Script engine failed post-initialization; disabling scripting"
            );
            close_quietly(engine.as_mut(), region);
            self.engine = None;
        }
    }

    /// Close and drop the engine. Never fails.
    pub fn on_region_closing(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            let region = self.region_name.as_deref().unwrap_or("?");
            close_quietly(engine.as_mut(), region);
            info!(region, engine = engine.name(), "Script engine closed");
        }
    }

    pub fn engine(&self) -> Option<&dyn ScriptEnginePort> {
        self.engine.as_deref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut (dyn ScriptEnginePort + 'static)> {
        self.engine.as_deref_mut()
    }

    /// Whether an engine is attached and accepting scripts.
    pub fn is_scripting_enabled(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|engine| engine.state().is_active())
    }
}

impl Drop for RegionEngineLoader {
    fn drop(&mut self) {
        self.on_region_closing();
    }
}

/// Collapse a panic-guarded engine call into one error string.
fn flatten(result: std::thread::Result<Result<(), EngineError>>) -> Result<(), String> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panic: {}", panic_message(payload.as_ref()))),
    }
}

fn close_quietly(engine: &mut dyn ScriptEnginePort, region: &str) {
    let result = catch_unwind(AssertUnwindSafe(|| engine.close()));
    if let Err(reason) = flatten(result) {
        warn!(region, engine = engine.name(), error = %reason, "Error while closing script engine");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::config_source::{InMemoryConfigSource, KeyValueConfig};
    use crate::ports::script_engine::{ScriptLoadError, ScriptStatus};
    use crate::registry::{EngineFactory, FactoryError, engine_factory};
    use sandscript_domain::{
        CompiledUnit, EngineState, ObjectId, ScriptExecutionContext, ScriptItem, ScriptValue,
    };
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Clone, Copy, Default)]
    enum Fault {
        #[default]
        None,
        InitError,
        InitPanic,
        PostInitPanic,
        CloseError,
        ClosePanic,
        DisabledByConfig,
    }

    /// Records lifecycle calls into a shared log.
    struct ScriptedEngine {
        state: EngineState,
        fault: Fault,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ScriptedEngine {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ScriptEnginePort for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }
        fn state(&self) -> EngineState {
            self.state
        }
        fn is_available(&self) -> bool {
            true
        }
        fn initialize(
            &mut self,
            _region: Arc<RegionContext>,
            _config: &mut dyn ConfigSource,
        ) -> Result<(), EngineError> {
            self.record("initialize");
            match self.fault {
                Fault::InitError => Err(EngineError::Config("bad section".into())),
                Fault::InitPanic => panic!("initialize exploded"),
                Fault::DisabledByConfig => Ok(()),
                _ => Ok(self.state.transition(EngineState::Initialized)?),
            }
        }
        fn post_initialize(&mut self) -> Result<(), EngineError> {
            self.record("post_initialize");
            match self.fault {
                Fault::PostInitPanic => panic!("post_initialize exploded"),
                Fault::DisabledByConfig => Ok(()),
                _ => Ok(self.state.transition(EngineState::PostInitialized)?),
            }
        }
        fn close(&mut self) -> Result<(), EngineError> {
            self.record("close");
            match self.fault {
                Fault::CloseError => Err(EngineError::Runtime("stuck worker".into())),
                Fault::ClosePanic => panic!("close exploded"),
                _ => {
                    self.state = EngineState::Closed;
                    Ok(())
                }
            }
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

    struct Harness {
        registry: Arc<EngineRegistry>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Harness {
        fn with_engine(fault: Fault) -> Self {
            let registry = Arc::new(EngineRegistry::new());
            let calls = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&calls);
            registry
                .register(
                    "scripted",
                    engine_factory(move || {
                        Ok(ScriptedEngine {
                            state: EngineState::Uninitialized,
                            fault,
                            calls: Arc::clone(&log),
                        })
                    }),
                )
                .unwrap();
            Self { registry, calls }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn start(&self, startup: KeyValueConfig) -> RegionEngineLoader {
            let mut config = InMemoryConfigSource::new().with_section(STARTUP_SECTION, startup);
            let mut loader = RegionEngineLoader::new(Arc::clone(&self.registry));
            let region = Arc::new(RegionContext::new("Sandbox", ObjectId::new_random()));
            loader.on_region_created(region, &mut config);
            loader
        }
    }

    fn select(name: &str) -> KeyValueConfig {
        KeyValueConfig::new().with(SCRIPT_ENGINE_KEY, name)
    }

    #[test]
    fn test_full_lifecycle() {
        let harness = Harness::with_engine(Fault::None);
        let mut loader = harness.start(select("scripted"));
        assert!(loader.is_scripting_enabled());

        loader.on_post_initialize();
        assert_eq!(
            loader.engine().map(|e| e.state()),
            Some(EngineState::PostInitialized)
        );

        loader.on_region_closing();
        assert!(loader.engine().is_none());
        assert_eq!(harness.calls(), vec!["initialize", "post_initialize", "close"]);
    }

    #[test]
    fn test_unregistered_engine_leaves_scripting_disabled() {
        let harness = Harness::with_engine(Fault::None);
        let mut loader = harness.start(select("Alpha"));
        assert!(!loader.is_scripting_enabled());
        assert!(loader.engine().is_none());

        // Later hooks are harmless no-ops.
        loader.on_post_initialize();
        loader.on_region_closing();
        assert!(harness.calls().is_empty());
    }

    #[test]
    fn test_default_engine_name_is_lua() {
        let harness = Harness::with_engine(Fault::None);
        let loader = harness.start(KeyValueConfig::new());
        assert!(loader.engine().is_none());
        assert!(harness.calls().is_empty());
    }

    #[test]
    fn test_scripting_master_switch() {
        let harness = Harness::with_engine(Fault::None);
        let loader = harness.start(select("scripted").with(SCRIPTING_ENABLED_KEY, "off"));
        assert!(!loader.is_scripting_enabled());
        assert!(harness.calls().is_empty());
    }

    #[test]
    fn test_factory_failure_is_contained() {
        let registry = Arc::new(EngineRegistry::new());
        let failing: EngineFactory =
            Arc::new(|| -> Result<Box<dyn ScriptEnginePort>, FactoryError> {
                Err("no runtime".into())
            });
        registry.register("broken", failing).unwrap();

        let mut loader = RegionEngineLoader::new(registry);
        let mut config =
            InMemoryConfigSource::new().with_section(STARTUP_SECTION, select("broken"));
        let region = Arc::new(RegionContext::new("Sandbox", ObjectId::new_random()));
        loader.on_region_created(region, &mut config);
        assert!(!loader.is_scripting_enabled());
    }

    #[test]
    fn test_initialize_error_closes_engine() {
        let harness = Harness::with_engine(Fault::InitError);
        let loader = harness.start(select("scripted"));
        assert!(loader.engine().is_none());
        assert_eq!(harness.calls(), vec!["initialize", "close"]);
    }

    #[test]
    fn test_initialize_panic_is_contained() {
        let harness = Harness::with_engine(Fault::InitPanic);
        let loader = harness.start(select("scripted"));
        assert!(!loader.is_scripting_enabled());
        assert_eq!(harness.calls(), vec!["initialize", "close"]);
    }

    #[test]
    fn test_engine_disabled_by_its_own_config() {
        let harness = Harness::with_engine(Fault::DisabledByConfig);
        let mut loader = harness.start(select("scripted"));
        loader.on_post_initialize();

        assert_eq!(
            loader.engine().map(|e| e.state()),
            Some(EngineState::Uninitialized)
        );
        assert!(!loader.is_scripting_enabled());
        assert_eq!(harness.calls(), vec!["initialize", "post_initialize"]);

        loader.on_region_closing();
        assert!(loader.engine().is_none());
        assert_eq!(
            harness.calls(),
            vec!["initialize", "post_initialize", "close"]
        );
    }

    #[test]
    fn test_post_initialize_panic_drops_engine() {
        let harness = Harness::with_engine(Fault::PostInitPanic);
        let mut loader = harness.start(select("scripted"));
        loader.on_post_initialize();
        assert!(loader.engine().is_none());
        assert_eq!(
            harness.calls(),
            vec!["initialize", "post_initialize", "close"]
        );
    }

    #[test]
    fn test_close_errors_are_swallowed() {
        for fault in [Fault::CloseError, Fault::ClosePanic] {
            let harness = Harness::with_engine(fault);
            let mut loader = harness.start(select("scripted"));
            assert!(loader.is_scripting_enabled());
            loader.on_region_closing();
            assert!(loader.engine().is_none());
        }
    }
}
