//! Per-invocation execution budget.
//!
//! Every entry into a script (running the chunk, delivering an event) gets
//! a wall-clock slice. An instruction-count hook checks the slice and the
//! worker's cancellation token and aborts the invocation with a runtime
//! error when either has run out.
//!
//! An abort is sticky for the rest of the invocation: the hook keeps
//! raising it, and the sandbox's `pcall`, `xpcall` and `coroutine.resume`
//! re-raise it through [`check_abort`] instead of handing it to the script.

use std::time::{Duration, Instant};

use mlua::prelude::*;
use mlua::{HookTriggers, VmState};
use tokio_util::sync::CancellationToken;

/// Message prefix of a budget abort.
pub const BUDGET_EXCEEDED: &str = "execution budget exceeded";
/// Message prefix of a cancellation abort.
pub const CANCELLED: &str = "script cancelled";

/// Abort recorded by the hook for the current invocation.
struct Tripped(String);

/// Fail with the pending abort, if the current invocation has one.
pub(crate) fn check_abort(lua: &Lua) -> LuaResult<()> {
    match lua.app_data_ref::<Tripped>() {
        Some(tripped) => Err(LuaError::RuntimeError(tripped.0.clone())),
        None => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionBudget {
    pub max_slice: Duration,
    pub instruction_interval: u32,
    cancel: CancellationToken,
}

impl ExecutionBudget {
    pub fn new(max_slice: Duration, instruction_interval: u32, cancel: CancellationToken) -> Self {
        Self {
            max_slice,
            instruction_interval,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `f` with the budget hook installed.
    pub fn run<T, F>(&self, lua: &Lua, f: F) -> LuaResult<T>
    where
        F: FnOnce() -> LuaResult<T>,
    {
        let started = Instant::now();
        let max_slice = self.max_slice;
        let cancel = self.cancel.clone();
        lua.remove_app_data::<Tripped>();
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(self.instruction_interval.max(1)),
            move |lua, _debug| {
                check_abort(lua)?;
                let message = if cancel.is_cancelled() {
                    CANCELLED.to_string()
                } else if started.elapsed() >= max_slice {
                    format!("{} ({} ms)", BUDGET_EXCEEDED, max_slice.as_millis())
                } else {
                    return Ok(VmState::Continue);
                };
                lua.set_app_data(Tripped(message.clone()));
                Err(LuaError::RuntimeError(message))
            },
        );
        let out = f();
        lua.remove_hook();
        let tripped = lua.remove_app_data::<Tripped>();
        match (out, tripped) {
            // A script that swallowed the abort still ends with it.
            (Ok(_), Some(Tripped(message))) => Err(LuaError::RuntimeError(message)),
            (out, _) => out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::sandbox::new_sandboxed_vm;

    #[test]
    fn test_runaway_loop_is_aborted() {
        let lua = new_sandboxed_vm(0).unwrap();
        let budget = ExecutionBudget::new(Duration::from_millis(20), 100, CancellationToken::new());

        let started = Instant::now();
        let result = budget.run(&lua, || lua.load("while true do end").exec());
        let err = result.unwrap_err();
        assert!(err.to_string().contains(BUDGET_EXCEEDED));
        assert!(started.elapsed() < Duration::from_secs(5));

        // The VM stays usable for the next invocation.
        let value: i64 = budget.run(&lua, || lua.load("return 1 + 1").eval()).unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_cancellation_aborts() {
        let lua = new_sandboxed_vm(0).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let budget = ExecutionBudget::new(Duration::from_secs(60), 10, token);
        let err = budget
            .run(&lua, || lua.load("local n = 0 while true do n = n + 1 end").exec())
            .unwrap_err();
        assert!(err.to_string().contains(CANCELLED));
        assert!(budget.is_cancelled());
    }

    #[test]
    fn test_pcall_cannot_swallow_the_abort() {
        let lua = new_sandboxed_vm(0).unwrap();
        let budget = ExecutionBudget::new(Duration::from_millis(20), 100, CancellationToken::new());

        let started = Instant::now();
        let err = budget
            .run(&lua, || {
                lua.load(
                    "while true do\n\
                         pcall(function() while true do end end)\n\
                         xpcall(function() while true do end end, function(e) return e end)\n\
                         coroutine.resume(coroutine.create(function() while true do end end))\n\
                     end",
                )
                .exec()
            })
            .unwrap_err();
        assert!(err.to_string().contains(BUDGET_EXCEEDED), "got: {}", err);
        assert!(started.elapsed() < Duration::from_secs(5));

        // Ordinary errors are still catchable once the budget is reset.
        let caught: bool = budget
            .run(&lua, || lua.load("return not pcall(error, 'x')").eval())
            .unwrap();
        assert!(caught);
    }

    #[test]
    fn test_cancellation_is_not_swallowed() {
        let lua = new_sandboxed_vm(0).unwrap();
        let token = CancellationToken::new();
        let budget = ExecutionBudget::new(Duration::from_secs(60), 100, token.clone());

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            token.cancel();
        });
        let started = Instant::now();
        let err = budget
            .run(&lua, || {
                lua.load("while true do pcall(function() while true do end end) end")
                    .exec()
            })
            .unwrap_err();
        canceller.join().unwrap();
        assert!(err.to_string().contains(CANCELLED), "got: {}", err);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
