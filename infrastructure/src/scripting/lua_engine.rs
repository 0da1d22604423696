//! Lua script engine: ties together the compiler chain, the sandbox API
//! surface and the per-script workers.
//!
//! `LuaScriptEngine` implements `ScriptEnginePort` from the application
//! layer. One instance serves one region and owns a tokio runtime for
//! that region's workers, collaborator calls and the lease sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sandscript_application::sandbox::modules::builtin_modules;
use sandscript_application::{
    ApiModule, BackendCompiler, CompileMetadata, CompilerChain, ConfigSource, EngineError,
    RegionContext, SandboxApiSurface, ScriptEnginePort, ScriptLoadError, ScriptStatus,
};
use sandscript_domain::{
    CapabilityFlagSet, CompiledUnit, EngineState, LifecycleError, ObjectId,
    ScriptExecutionContext, ScriptItem, ScriptLanguage, ScriptValue,
};
use tokio::runtime::Runtime;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::compiler::{LuaBackendCompiler, standard_chain};
use super::settings::{LUA_ENGINE_SECTION, LuaEngineSettings, capabilities_from};
use super::worker::{ScriptWorker, WorkerLimits};
use crate::config::CAPABILITIES_SECTION;

/// Blocking threads beyond `max_scripts` for workers still winding down
/// after a reload or removal.
const BLOCKING_HEADROOM: usize = 16;

/// How long `close` waits for cancelled workers to exit.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Lua 5.4 script engine implementing `ScriptEnginePort`.
pub struct LuaScriptEngine {
    state: EngineState,
    settings: LuaEngineSettings,
    backend: Arc<dyn BackendCompiler>,
    extra_modules: Vec<Arc<dyn ApiModule>>,
    active: Option<ActiveEngine>,
}

/// Everything that exists only between `initialize` and `close`.
struct ActiveEngine {
    runtime: Runtime,
    region: Arc<RegionContext>,
    capabilities: Arc<CapabilityFlagSet>,
    surface: Arc<SandboxApiSurface>,
    chain: CompilerChain,
    scripts: HashMap<ObjectId, ScriptWorker>,
    sweeper: Option<CancellationToken>,
}

impl Default for LuaScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LuaScriptEngine {
    pub const NAME: &'static str = "lua";

    pub fn new() -> Self {
        Self {
            state: EngineState::Uninitialized,
            settings: LuaEngineSettings::default(),
            backend: Arc::new(LuaBackendCompiler::new()),
            extra_modules: Vec::new(),
            active: None,
        }
    }

    /// Replace the terminal compiler of the chain built at `initialize`.
    pub fn with_compiler_backend(mut self, backend: Arc<dyn BackendCompiler>) -> Self {
        self.backend = backend;
        self
    }

    /// Contribute host functions beyond the built-in modules.
    pub fn with_module(mut self, module: Arc<dyn ApiModule>) -> Self {
        self.extra_modules.push(module);
        self
    }

    pub fn settings(&self) -> &LuaEngineSettings {
        &self.settings
    }

    /// Capability flags in force; `None` unless active.
    pub fn capabilities(&self) -> Option<&CapabilityFlagSet> {
        self.active.as_ref().map(|a| a.capabilities.as_ref())
    }

    /// Source languages accepted by `load_script`.
    pub fn languages(&self) -> Vec<ScriptLanguage> {
        self.active
            .as_ref()
            .map(|a| a.chain.languages())
            .unwrap_or_default()
    }

    /// Host function names visible to scripts as `host.<name>`.
    pub fn host_functions(&self) -> Vec<&'static str> {
        self.active
            .as_ref()
            .map(|a| a.surface.function_names())
            .unwrap_or_default()
    }

    pub fn live_handles(&self) -> usize {
        self.active
            .as_ref()
            .map(|a| a.surface.live_handles())
            .unwrap_or(0)
    }

    fn limits(&self) -> WorkerLimits {
        WorkerLimits {
            memory_limit_bytes: self.settings.memory_limit_bytes,
            max_slice: self.settings.max_slice,
            instruction_interval: self.settings.instruction_interval,
        }
    }

    fn not_active(&self) -> ScriptLoadError {
        ScriptLoadError::NotActive { state: self.state }
    }

    fn start_sweeper(active: &mut ActiveEngine, settings: &LuaEngineSettings) {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let surface = Arc::clone(&active.surface);
        let period = settings.lease_sweep_interval;
        let region = active.region.name.clone();

        active.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let reclaimed = surface.sweep(Instant::now());
                        if reclaimed > 0 {
                            tracing::debug!(region = %region, reclaimed, "Lease sweep");
                        }
                    }
                }
            }
            tracing::trace!(region = %region, "Lease sweeper stopped");
        });
        active.sweeper = Some(token);
    }
}

impl ScriptEnginePort for LuaScriptEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn is_available(&self) -> bool {
        true
    }

    fn initialize(
        &mut self,
        region: Arc<RegionContext>,
        config: &mut dyn ConfigSource,
    ) -> Result<(), EngineError> {
        let section = match config.section(LUA_ENGINE_SECTION) {
            Some(section) => section,
            None => {
                let defaults = LuaEngineSettings::defaults_section();
                config.set_section(LUA_ENGINE_SECTION, defaults.clone());
                tracing::debug!(
                    region = %region.name,
                    "Seeded [{}] with defaults",
                    LUA_ENGINE_SECTION
                );
                defaults
            }
        };
        self.settings = LuaEngineSettings::from_section(&section);

        if !self.settings.enabled {
            tracing::info!(region = %region.name, "Lua engine disabled by configuration");
            return Ok(());
        }
        if !self.state.can_transition_to(EngineState::Initialized) {
            return Err(LifecycleError {
                from: self.state,
                to: EngineState::Initialized,
            }
            .into());
        }

        let capabilities = Arc::new(capabilities_from(
            &section,
            config.section(CAPABILITIES_SECTION).as_ref(),
        ));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(self.settings.max_scripts.saturating_add(BLOCKING_HEADROOM))
            .thread_name(format!("sandscript-{}", region.name))
            .enable_all()
            .build()
            .map_err(|e| EngineError::Runtime(format!("failed to start runtime: {}", e)))?;

        let mut builder = SandboxApiSurface::builder(Arc::clone(&region), Arc::clone(&capabilities))
            .runtime(runtime.handle().clone())
            .service_timeout(self.settings.service_timeout);
        for module in builtin_modules() {
            builder = builder.module(module.as_ref());
        }
        for module in &self.extra_modules {
            builder = builder.module(module.as_ref());
        }
        let surface = match builder.build() {
            Ok(surface) => Arc::new(surface),
            Err(e) => {
                runtime.shutdown_background();
                return Err(EngineError::Config(e.to_string()));
            }
        };

        let chain = standard_chain(Arc::clone(&self.backend), self.settings.default_language);

        tracing::info!(
            region = %region.name,
            capabilities = ?capabilities.enabled().collect::<Vec<_>>(),
            default_language = %self.settings.default_language,
            lease = ?self.settings.lease.mode(),
            "Lua engine initialized"
        );

        self.active = Some(ActiveEngine {
            runtime,
            region,
            capabilities,
            surface,
            chain,
            scripts: HashMap::new(),
            sweeper: None,
        });
        self.state.transition(EngineState::Initialized)?;
        Ok(())
    }

    fn post_initialize(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Initialized {
            return Ok(());
        }
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        Self::start_sweeper(active, &self.settings);
        self.state.transition(EngineState::PostInitialized)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Closed {
            return Ok(());
        }

        if let Some(mut active) = self.active.take() {
            if let Some(sweeper) = active.sweeper.take() {
                sweeper.cancel();
            }
            let mut workers: Vec<ScriptWorker> =
                active.scripts.drain().map(|(_, worker)| worker).collect();
            for worker in &mut workers {
                worker.stop();
            }
            let deadline = Instant::now() + CLOSE_GRACE;
            while workers.iter().any(|w| !w.is_finished()) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            let stragglers = workers.iter().filter(|w| !w.is_finished()).count();
            if stragglers > 0 {
                tracing::warn!(
                    region = %active.region.name,
                    stragglers,
                    "Script workers still running at close"
                );
            }
            let handles = active.surface.dispose_all();
            tracing::info!(
                region = %active.region.name,
                scripts = workers.len(),
                handles,
                "Lua engine closed"
            );
            let ActiveEngine { runtime, chain, .. } = active;
            drop(chain);
            runtime.shutdown_background();
        }

        self.state.transition(EngineState::Closed)?;
        Ok(())
    }

    fn load_script(&mut self, item: ScriptItem) -> Result<Arc<CompiledUnit>, ScriptLoadError> {
        let limits = self.limits();
        let lease = self.settings.lease;
        let max_scripts = self.settings.max_scripts;
        let state = self.state;
        let Some(active) = self.active.as_mut() else {
            return Err(ScriptLoadError::NotActive { state });
        };

        let meta = CompileMetadata::new(item.script_id, item.name.clone());
        let unit = Arc::new(active.chain.compile(&meta, &item.source)?);

        let live = active
            .scripts
            .iter()
            .filter(|(id, worker)| **id != item.script_id && !worker.is_finished())
            .count();
        if live >= max_scripts {
            tracing::warn!(
                script_id = %item.script_id,
                script = %item.name,
                max_scripts,
                "Script limit reached"
            );
            return Err(ScriptLoadError::Worker(format!(
                "script limit reached ({})",
                max_scripts
            )));
        }

        if let Some(mut previous) = active.scripts.remove(&item.script_id) {
            previous.stop();
            active.surface.dispose_owner(item.script_id);
            tracing::debug!(script_id = %item.script_id, "Superseded running script");
        }

        let context = Arc::new(ScriptExecutionContext::for_item(
            &item,
            Self::NAME,
            &active.region.name,
        ));
        let handle = active
            .surface
            .issue_handle(Arc::clone(&context), lease, Instant::now());
        let worker = ScriptWorker::spawn(
            active.runtime.handle(),
            Arc::clone(&unit),
            context,
            Arc::clone(&active.surface),
            handle,
            limits,
        );
        active.scripts.insert(item.script_id, worker);

        tracing::info!(
            script_id = %item.script_id,
            script = %item.name,
            language = %unit.source_language,
            %handle,
            "Script loaded"
        );
        Ok(unit)
    }

    fn remove_script(&mut self, script_id: ObjectId) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let Some(mut worker) = active.scripts.remove(&script_id) else {
            return false;
        };
        worker.stop();
        let disposed = active.surface.dispose_owner(script_id);
        tracing::debug!(%script_id, disposed, "Script removed");
        true
    }

    fn post_event(
        &self,
        script_id: ObjectId,
        event: &str,
        args: Vec<ScriptValue>,
    ) -> Result<(), ScriptLoadError> {
        let active = self.active.as_ref().ok_or_else(|| self.not_active())?;
        let worker = active
            .scripts
            .get(&script_id)
            .ok_or(ScriptLoadError::UnknownScript(script_id))?;

        if let Err(e) = active.surface.renew(worker.handle(), Instant::now()) {
            tracing::debug!(%script_id, error = %e, "Lease not renewed on event delivery");
        }
        worker.post(event, args)
    }

    fn running_scripts(&self) -> Vec<ScriptExecutionContext> {
        let Some(active) = self.active.as_ref() else {
            return Vec::new();
        };
        let mut contexts: Vec<_> = active
            .scripts
            .values()
            .filter(|w| w.status() == ScriptStatus::Running)
            .map(|w| w.context().as_ref().clone())
            .collect();
        contexts.sort_by(|a, b| a.script_name.cmp(&b.script_name));
        contexts
    }

    fn script_status(&self, script_id: ObjectId) -> Option<ScriptStatus> {
        self.active
            .as_ref()
            .and_then(|a| a.scripts.get(&script_id))
            .map(|w| w.status())
    }

    fn compiled_unit(&self, script_id: ObjectId) -> Option<Arc<CompiledUnit>> {
        self.active
            .as_ref()
            .and_then(|a| a.scripts.get(&script_id))
            .map(|w| Arc::clone(w.unit()))
    }

    fn sweep_leases(&self, now: Instant) -> usize {
        self.active
            .as_ref()
            .map(|a| a.surface.sweep(now))
            .unwrap_or(0)
    }

    fn pending_events(&self, script_id: ObjectId) -> usize {
        self.active
            .as_ref()
            .and_then(|a| a.scripts.get(&script_id))
            .map(|w| w.pending_events())
            .unwrap_or(0)
    }
}

impl Drop for LuaScriptEngine {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Lua engine close on drop failed");
        }
    }
}
