//! Lua scripting engine (feature-gated: `scripting`)
//!
//! Provides the `LuaScriptEngine` that implements `ScriptEnginePort`
//! from the application layer, backed by mlua (Lua 5.4).
//!
//! # Modules
//!
//! - `compiler`: Lua back-end compiler and the Slang front end
//! - `sandbox`: restricted VM construction
//! - `budget`: per-invocation time slice and cancellation hook
//! - `host_api`: `host.<fn>(…)` bridge onto the sandbox API surface
//! - `worker`: one blocking worker per loaded script
//! - `settings`: typed `[LuaEngine]` section
//! - `lua_engine`: Main engine struct tying everything together

mod budget;
pub mod compiler;
mod host_api;
mod lua_engine;
mod sandbox;
pub mod settings;
mod worker;

pub use budget::{BUDGET_EXCEEDED, CANCELLED, ExecutionBudget};
pub use compiler::{LuaBackendCompiler, SlangTranslator, standard_chain};
pub use lua_engine::LuaScriptEngine;
pub use sandbox::new_sandboxed_vm;
pub use settings::{LUA_ENGINE_SECTION, LuaEngineSettings};
pub use worker::{EVENT_QUEUE_CAPACITY, STARTUP_EVENT};
