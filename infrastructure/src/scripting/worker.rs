//! One script, one VM, one blocking worker.
//!
//! A worker owns its Lua state for its whole life; nothing else touches
//! it. Events arrive over a bounded channel and are delivered by calling
//! the global function with the event's name. Any error raised by the
//! script (including a budget abort or a memory-limit hit) faults that
//! script only: its worker stops and the engine keeps running.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use mlua::prelude::*;
use sandscript_application::{
    ProxyHandle, SandboxApiSurface, ScriptLoadError, ScriptStatus, panic_message,
};
use sandscript_domain::{CompiledUnit, ScriptExecutionContext, ScriptValue};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::budget::ExecutionBudget;
use super::host_api::{install_host_api, into_lua};
use super::sandbox::new_sandboxed_vm;

/// Event delivered once the chunk has run.
pub const STARTUP_EVENT: &str = "state_entry";

/// Events a script may have queued before `post_event` reports back-pressure.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Resource limits applied to every VM.
#[derive(Debug, Clone, Copy)]
pub struct WorkerLimits {
    pub memory_limit_bytes: usize,
    pub max_slice: Duration,
    pub instruction_interval: u32,
}

#[derive(Debug)]
struct ScriptEvent {
    name: String,
    args: Vec<ScriptValue>,
}

/// Handle to a running script worker.
pub struct ScriptWorker {
    context: Arc<ScriptExecutionContext>,
    handle: ProxyHandle,
    unit: Arc<CompiledUnit>,
    events: Option<mpsc::Sender<ScriptEvent>>,
    cancel: CancellationToken,
    status: Arc<Mutex<ScriptStatus>>,
    pending: Arc<AtomicUsize>,
    join: JoinHandle<()>,
}

impl ScriptWorker {
    /// Start a worker on the blocking pool of `runtime`.
    pub fn spawn(
        runtime: &Handle,
        unit: Arc<CompiledUnit>,
        context: Arc<ScriptExecutionContext>,
        surface: Arc<SandboxApiSurface>,
        handle: ProxyHandle,
        limits: WorkerLimits,
    ) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();
        let status = Arc::new(Mutex::new(ScriptStatus::Running));
        // The initial load counts as one pending event.
        let pending = Arc::new(AtomicUsize::new(1));

        let run = WorkerRun {
            unit: Arc::clone(&unit),
            context: Arc::clone(&context),
            surface,
            handle,
            budget: ExecutionBudget::new(
                limits.max_slice,
                limits.instruction_interval,
                cancel.clone(),
            ),
            memory_limit: limits.memory_limit_bytes,
            pending: Arc::clone(&pending),
        };
        let status_slot = Arc::clone(&status);
        let pending_slot = Arc::clone(&pending);

        let join = runtime.spawn_blocking(move || {
            let context = Arc::clone(&run.context);
            let outcome = match catch_unwind(AssertUnwindSafe(|| run.run(rx))) {
                Ok(Ok(())) => ScriptStatus::Stopped,
                Ok(Err(message)) => ScriptStatus::Faulted(message),
                Err(payload) => ScriptStatus::Faulted(format!(
                    "worker panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };
            match &outcome {
                ScriptStatus::Faulted(message) => tracing::warn!(
                    script_id = %context.script_id,
                    script = %context.script_name,
                    error = %message,
                    "Script faulted"
                ),
                _ => tracing::debug!(
                    script_id = %context.script_id,
                    script = %context.script_name,
                    "Script worker stopped"
                ),
            }
            *lock(&status_slot) = outcome;
            pending_slot.store(0, Ordering::SeqCst);
        });

        Self {
            context,
            handle,
            unit,
            events: Some(tx),
            cancel,
            status,
            pending,
            join,
        }
    }

    pub fn context(&self) -> &Arc<ScriptExecutionContext> {
        &self.context
    }

    pub fn handle(&self) -> ProxyHandle {
        self.handle
    }

    pub fn unit(&self) -> &Arc<CompiledUnit> {
        &self.unit
    }

    pub fn status(&self) -> ScriptStatus {
        lock(&self.status).clone()
    }

    pub fn pending_events(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether the worker thread has exited and released its pool slot.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Queue an event without blocking.
    pub fn post(&self, name: &str, args: Vec<ScriptValue>) -> Result<(), ScriptLoadError> {
        if let ScriptStatus::Faulted(message) = self.status() {
            return Err(ScriptLoadError::Worker(format!("script faulted: {}", message)));
        }
        let Some(events) = &self.events else {
            return Err(ScriptLoadError::Worker("script stopped".to_string()));
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        let event = ScriptEvent {
            name: name.to_string(),
            args,
        };
        events.try_send(event).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    ScriptLoadError::Worker("event queue full".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    ScriptLoadError::Worker("script stopped".to_string())
                }
            }
        })
    }

    /// Abort the running invocation and let the worker exit.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.events = None;
    }
}

impl Drop for ScriptWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(status: &Mutex<ScriptStatus>) -> MutexGuard<'_, ScriptStatus> {
    status.lock().unwrap_or_else(|e| e.into_inner())
}

/// State moved onto the blocking thread.
struct WorkerRun {
    unit: Arc<CompiledUnit>,
    context: Arc<ScriptExecutionContext>,
    surface: Arc<SandboxApiSurface>,
    handle: ProxyHandle,
    budget: ExecutionBudget,
    memory_limit: usize,
    pending: Arc<AtomicUsize>,
}

impl WorkerRun {
    fn run(self, mut rx: mpsc::Receiver<ScriptEvent>) -> Result<(), String> {
        let lua = new_sandboxed_vm(self.memory_limit).map_err(|e| fault_message(&e))?;
        install_host_api(&lua, Arc::clone(&self.surface), self.handle)
            .map_err(|e| fault_message(&e))?;

        self.budget
            .run(&lua, || {
                lua.load(self.unit.artifact.code.as_str())
                    .set_name(format!("={}", self.context.script_name))
                    .exec()
            })
            .map_err(|e| fault_message(&e))?;
        self.deliver(&lua, STARTUP_EVENT, Vec::new())?;
        self.pending.fetch_sub(1, Ordering::SeqCst);

        while let Some(event) = rx.blocking_recv() {
            if self.budget.is_cancelled() {
                break;
            }
            self.deliver(&lua, &event.name, event.args)?;
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Call the global handler for `event`, if the script defines one.
    fn deliver(&self, lua: &Lua, event: &str, args: Vec<ScriptValue>) -> Result<(), String> {
        let handler: LuaValue = lua.globals().get(event).map_err(|e| fault_message(&e))?;
        let LuaValue::Function(handler) = handler else {
            tracing::trace!(
                script = %self.context.script_name,
                event,
                "Script has no handler for event"
            );
            return Ok(());
        };

        let args = args
            .into_iter()
            .map(|value| into_lua(lua, value))
            .collect::<LuaResult<LuaMultiValue>>()
            .map_err(|e| fault_message(&e))?;

        self.budget
            .run(lua, || handler.call::<()>(args))
            .map_err(|e| fault_message(&e))
    }
}

/// First line of the innermost error message, without the mlua wrapper text.
pub(crate) fn fault_message(err: &LuaError) -> String {
    match err {
        LuaError::RuntimeError(message) => first_line(message),
        LuaError::CallbackError { cause, .. } => fault_message(cause),
        LuaError::MemoryError(message) => {
            format!("memory limit exceeded: {}", first_line(message))
        }
        LuaError::SyntaxError { message, .. } => first_line(message),
        other => first_line(&other.to_string()),
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::budget::{BUDGET_EXCEEDED, CANCELLED};
    use sandscript_application::RegionContext;
    use sandscript_application::sandbox::modules::builtin_modules;
    use sandscript_domain::{Artifact, CapabilityFlagSet, LeasePolicy, ObjectId, ScriptItem, ScriptLanguage};
    use std::time::Instant;

    struct Fixture {
        runtime: tokio::runtime::Runtime,
        surface: Arc<SandboxApiSurface>,
    }

    impl Fixture {
        fn new() -> Self {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let region = Arc::new(RegionContext::new("Test", ObjectId::new_random()));
            let mut builder = SandboxApiSurface::builder(region, Arc::new(CapabilityFlagSet::new()))
                .runtime(runtime.handle().clone());
            for module in builtin_modules() {
                builder = builder.module(module.as_ref());
            }
            Self {
                runtime,
                surface: Arc::new(builder.build().unwrap()),
            }
        }

        fn spawn(&self, code: &str) -> ScriptWorker {
            self.spawn_with_slice(code, Duration::from_millis(30))
        }

        fn spawn_with_slice(&self, code: &str, max_slice: Duration) -> ScriptWorker {
            let item = ScriptItem::new("w", ObjectId::new_random(), ObjectId::new_random(), code);
            let context = Arc::new(ScriptExecutionContext::for_item(&item, "lua", "Test"));
            let handle =
                self.surface
                    .issue_handle(Arc::clone(&context), LeasePolicy::manual(), Instant::now());
            let unit = Arc::new(CompiledUnit::new(
                item.script_id,
                ScriptLanguage::Lua,
                Artifact::new(ScriptLanguage::Lua, code),
            ));
            ScriptWorker::spawn(
                self.runtime.handle(),
                unit,
                context,
                Arc::clone(&self.surface),
                handle,
                WorkerLimits {
                    memory_limit_bytes: 8 * 1024 * 1024,
                    max_slice,
                    instruction_interval: 100,
                },
            )
        }
    }

    fn settle(worker: &ScriptWorker) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.pending_events() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_events_are_delivered_in_order() {
        let fixture = Fixture::new();
        let worker = fixture.spawn(
            "seen = {}\n\
             function touch(n) seen[#seen + 1] = n end\n\
             function check() if table.concat(seen, ',') ~= '1,2,3' then error('order ' .. table.concat(seen, ',')) end end",
        );
        for n in 1..=3 {
            worker.post("touch", vec![ScriptValue::Integer(n)]).unwrap();
        }
        worker.post("check", Vec::new()).unwrap();
        settle(&worker);
        assert_eq!(worker.status(), ScriptStatus::Running);
    }

    #[test]
    fn test_error_in_handler_faults_script() {
        let fixture = Fixture::new();
        let worker = fixture.spawn("function boom() error('kaboom', 0) end");
        worker.post("boom", Vec::new()).unwrap();
        settle(&worker);
        assert_eq!(worker.status(), ScriptStatus::Faulted("kaboom".to_string()));
        assert!(worker.post("boom", Vec::new()).is_err());
    }

    #[test]
    fn test_runaway_state_entry_is_aborted() {
        let fixture = Fixture::new();
        let worker = fixture.spawn("function state_entry() while true do end end");
        settle(&worker);
        match worker.status() {
            ScriptStatus::Faulted(message) => assert!(message.contains(BUDGET_EXCEEDED)),
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_handler_is_ignored() {
        let fixture = Fixture::new();
        let worker = fixture.spawn("x = 1");
        worker.post("no_such_event", Vec::new()).unwrap();
        settle(&worker);
        assert_eq!(worker.status(), ScriptStatus::Running);
    }

    #[test]
    fn test_stop_ends_worker() {
        let fixture = Fixture::new();
        let mut worker = fixture.spawn("x = 1");
        settle(&worker);
        worker.stop();
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.status() == ScriptStatus::Running && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(worker.status(), ScriptStatus::Stopped);
        assert!(worker.post("x", Vec::new()).is_err());
    }

    #[test]
    fn test_stop_ends_a_script_hiding_in_pcall() {
        let fixture = Fixture::new();
        let mut worker = fixture.spawn_with_slice(
            "function state_entry() while true do pcall(function() while true do end end) end end",
            Duration::from_secs(600),
        );
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(worker.status(), ScriptStatus::Running);

        worker.stop();
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.status() == ScriptStatus::Running && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        match worker.status() {
            ScriptStatus::Faulted(message) => assert!(message.contains(CANCELLED)),
            other => panic!("expected a cancelled script, got {:?}", other),
        }
        while !worker.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(worker.is_finished());
    }
}
