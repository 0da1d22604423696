//! Host API bridge: exposes the sandbox surface to a script VM as `host`.
//!
//! Each surface function becomes a raw Lua function returning
//! `(ok, value_or_message)`. A small prelude wraps them so that a
//! [`SandboxError`](sandscript_application::SandboxError) surfaces as a
//! plain Lua error whose message is the error text (no position prefix),
//! while denials already came back as the neutral value.

use std::sync::Arc;
use std::time::Instant;

use mlua::prelude::*;
use sandscript_application::{ProxyHandle, SandboxApiSurface};
use sandscript_domain::ScriptValue;

const PRELUDE: &str = r#"
local raw = ...
local api = {}
for name, fn in pairs(raw) do
    api[name] = function(...)
        local ok, value = fn(...)
        if not ok then
            error(value, 0)
        end
        return value
    end
end
host = api
if api.log then
    print = api.log
end
"#;

/// Install the global `host` table for the script holding `handle`.
pub fn install_host_api(
    lua: &Lua,
    surface: Arc<SandboxApiSurface>,
    handle: ProxyHandle,
) -> LuaResult<()> {
    let raw = lua.create_table()?;
    for name in surface.function_names() {
        let surface = Arc::clone(&surface);
        let function = lua.create_function(move |lua, args: LuaMultiValue| {
            let args: Vec<ScriptValue> = args.into_iter().map(from_lua).collect();
            match surface.invoke(handle, name, &args, Instant::now()) {
                Ok(value) => Ok((true, into_lua(lua, value)?)),
                Err(e) => Ok((false, LuaValue::String(lua.create_string(e.to_string())?))),
            }
        })?;
        raw.set(name, function)?;
    }

    lua.load(PRELUDE).set_name("=host").call::<()>(raw)
}

/// Lua argument to host value. Tables, functions and other reference
/// types have no host representation and arrive as `Nil`.
pub fn from_lua(value: LuaValue) -> ScriptValue {
    match value {
        LuaValue::Nil => ScriptValue::Nil,
        LuaValue::Boolean(b) => ScriptValue::Boolean(b),
        LuaValue::Integer(n) => ScriptValue::Integer(n),
        LuaValue::Number(n) => ScriptValue::Float(n),
        LuaValue::String(s) => ScriptValue::String(s.to_string_lossy().to_string()),
        _ => ScriptValue::Nil,
    }
}

pub fn into_lua(lua: &Lua, value: ScriptValue) -> LuaResult<LuaValue> {
    Ok(match value {
        ScriptValue::Nil => LuaValue::Nil,
        ScriptValue::Boolean(b) => LuaValue::Boolean(b),
        ScriptValue::Integer(n) => LuaValue::Integer(n),
        ScriptValue::Float(n) => LuaValue::Number(n),
        ScriptValue::String(s) => LuaValue::String(lua.create_string(&s)?),
    })
}
