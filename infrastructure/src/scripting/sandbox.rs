//! Lua sandbox: one restricted VM per script.
//!
//! Scripts are untrusted. Only the pure standard libraries are opened and
//! everything that reaches the file system, the process, the module loader
//! or raw bytecode is removed afterwards.

use mlua::prelude::*;

use super::budget::check_abort;

/// Libraries opened in every script VM. `os` is trimmed to its clock
/// functions by [`apply_sandbox`].
fn script_libs() -> LuaStdLib {
    LuaStdLib::TABLE
        | LuaStdLib::STRING
        | LuaStdLib::UTF8
        | LuaStdLib::MATH
        | LuaStdLib::COROUTINE
        | LuaStdLib::OS
}

/// Create a VM for one script with the sandbox applied.
///
/// `memory_limit` of 0 leaves allocation unbounded.
pub fn new_sandboxed_vm(memory_limit: usize) -> LuaResult<Lua> {
    let lua = Lua::new_with(script_libs(), LuaOptions::default())?;
    apply_sandbox(&lua)?;
    if memory_limit > 0 {
        lua.set_memory_limit(memory_limit)?;
    }
    Ok(lua)
}

/// Apply sandbox restrictions to the Lua VM.
///
/// Removes:
/// - `io`, `package`, `require`, `debug`
/// - `os` except `os.time` / `os.clock`
/// - `dofile`, `loadfile`, `load`: no code from outside the compiled unit
/// - `string.dump`: no bytecode round-trips
/// - `collectgarbage`: GC tuning is the host's business
/// - `print`: replaced by the host API when it is installed
///
/// `pcall`, `xpcall` and `coroutine.resume` are wrapped so a budget or
/// cancellation abort passes through them.
pub fn apply_sandbox(lua: &Lua) -> LuaResult<()> {
    let guard = lua.create_function(|lua, results: LuaMultiValue| {
        check_abort(lua)?;
        Ok(results)
    })?;
    lua.load(
        r#"
        local guard = ...
        local pcall, xpcall = pcall, xpcall
        _G.pcall = function(...) return guard(pcall(...)) end
        _G.xpcall = function(...) return guard(xpcall(...)) end
        if coroutine then
            local resume = coroutine.resume
            coroutine.resume = function(...) return guard(resume(...)) end
        end

        local time, clock = os and os.time, os and os.clock
        os = { time = time, clock = clock }
        io = nil
        package = nil
        require = nil
        debug = nil
        dofile = nil
        loadfile = nil
        load = nil
        collectgarbage = nil
        print = nil
        if string then string.dump = nil end
    "#,
    )
    .set_name("=sandbox")
    .call::<()>(guard)
}
