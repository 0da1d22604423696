#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use sandscript_application::{
    BackendCompiler, CompileMetadata, InMemoryConfigSource, KeyValueConfig, RegionContext,
    ScriptEnginePort, ScriptStatus,
};
use sandscript_domain::{Artifact, CompileError, ObjectId, ScriptItem, ScriptLanguage};
use sandscript_infrastructure::LuaBackendCompiler;
use sandscript_infrastructure::scripting::LUA_ENGINE_SECTION;

/// Lua back end that counts how often it is asked to compile.
#[derive(Default)]
pub struct CountingBackend {
    inner: LuaBackendCompiler,
    calls: AtomicUsize,
}

impl CountingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BackendCompiler for CountingBackend {
    fn language(&self) -> ScriptLanguage {
        self.inner.language()
    }

    fn compile(&self, meta: &CompileMetadata, source: &str) -> Result<Artifact, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(meta, source)
    }
}

pub fn region() -> Arc<RegionContext> {
    Arc::new(RegionContext::new("Sandbox", ObjectId::new_random()))
}

pub fn engine_config(section: KeyValueConfig) -> InMemoryConfigSource {
    InMemoryConfigSource::new().with_section(LUA_ENGINE_SECTION, section)
}

pub fn script(name: &str, source: &str) -> ScriptItem {
    ScriptItem::new(name, ObjectId::new_random(), ObjectId::new_random(), source)
}

/// Wait until the script has handled everything queued for it.
pub fn settle(engine: &dyn ScriptEnginePort, id: ObjectId) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.pending_events(id) > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
}

pub fn fault_of(engine: &dyn ScriptEnginePort, id: ObjectId) -> String {
    match engine.script_status(id) {
        Some(ScriptStatus::Faulted(message)) => message,
        other => panic!("expected a faulted script, got {:?}", other),
    }
}
