//! `[LuaEngine]` settings.
//!
//! ```toml
//! [LuaEngine]
//! enabled = true
//! memory_limit_bytes = 16777216
//! instruction_interval = 1000
//! max_slice_ms = 50
//! lease_initial_ms = 0            # 0 = handles live until disposed
//! lease_renew_on_call = false
//! lease_sponsorship_ms = 120000
//! lease_sweep_interval_ms = 1000
//! service_timeout_ms = 2000
//! max_scripts = 1024              # one worker thread each
//! default_language = "lua"
//! capabilities.extended-country-lookup = false
//! ```

use std::time::Duration;

use sandscript_application::KeyValueConfig;
use sandscript_domain::{CapabilityFlagSet, LeasePolicy, ScriptLanguage};

pub const LUA_ENGINE_SECTION: &str = "LuaEngine";
const CAPABILITY_PREFIX: &str = "capabilities.";

const DEFAULT_MEMORY_LIMIT: u64 = 16 * 1024 * 1024;
const DEFAULT_INSTRUCTION_INTERVAL: u64 = 1000;
const DEFAULT_MAX_SLICE_MS: u64 = 50;
const DEFAULT_SPONSORSHIP_MS: u64 = 120_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;
const DEFAULT_SERVICE_TIMEOUT_MS: u64 = 2000;
const DEFAULT_MAX_SCRIPTS: u64 = 1024;

/// Typed view of the `[LuaEngine]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LuaEngineSettings {
    pub enabled: bool,
    /// Per-VM allocation cap; 0 disables the cap.
    pub memory_limit_bytes: usize,
    /// Instructions between budget checks.
    pub instruction_interval: u32,
    /// Wall-clock budget of one invocation (load or event).
    pub max_slice: Duration,
    pub lease: LeasePolicy,
    pub lease_sweep_interval: Duration,
    pub service_timeout: Duration,
    pub default_language: ScriptLanguage,
    /// Scripts with a live worker at once. Each holds one blocking thread.
    pub max_scripts: usize,
}

impl Default for LuaEngineSettings {
    fn default() -> Self {
        Self::from_section(&KeyValueConfig::new())
    }
}

impl LuaEngineSettings {
    /// Section written back when the configuration has none.
    pub fn defaults_section() -> KeyValueConfig {
        KeyValueConfig::new()
            .with("enabled", true)
            .with("memory_limit_bytes", DEFAULT_MEMORY_LIMIT)
            .with("instruction_interval", DEFAULT_INSTRUCTION_INTERVAL)
            .with("max_slice_ms", DEFAULT_MAX_SLICE_MS)
            .with("lease_initial_ms", 0)
            .with("lease_renew_on_call", false)
            .with("lease_sponsorship_ms", DEFAULT_SPONSORSHIP_MS)
            .with("lease_sweep_interval_ms", DEFAULT_SWEEP_INTERVAL_MS)
            .with("service_timeout_ms", DEFAULT_SERVICE_TIMEOUT_MS)
            .with("default_language", ScriptLanguage::Lua)
            .with("max_scripts", DEFAULT_MAX_SCRIPTS)
    }

    /// Read settings; missing or malformed entries take their defaults.
    pub fn from_section(section: &KeyValueConfig) -> Self {
        let ms = |key: &str, default: u64| Duration::from_millis(section.get_u64(key, default));

        let initial = ms("lease_initial_ms", 0);
        let lease = if initial.is_zero() {
            LeasePolicy::manual()
        } else {
            LeasePolicy::timed(initial, ms("lease_sponsorship_ms", DEFAULT_SPONSORSHIP_MS))
        };
        let lease = lease.with_renew_on_call(section.get_bool("lease_renew_on_call", false));

        let language = section.get_string("default_language", ScriptLanguage::Lua.as_str());
        let default_language = language.parse().unwrap_or_else(|_| {
            tracing::warn!(
                value = %language,
                "Unknown default_language in [{}]; using lua",
                LUA_ENGINE_SECTION
            );
            ScriptLanguage::Lua
        });

        Self {
            enabled: section.get_bool("enabled", true),
            memory_limit_bytes: usize::try_from(
                section.get_u64("memory_limit_bytes", DEFAULT_MEMORY_LIMIT),
            )
            .unwrap_or(usize::MAX),
            instruction_interval: u32::try_from(
                section.get_u64("instruction_interval", DEFAULT_INSTRUCTION_INTERVAL),
            )
            .unwrap_or(u32::MAX)
            .max(1),
            max_slice: ms("max_slice_ms", DEFAULT_MAX_SLICE_MS),
            lease,
            lease_sweep_interval: ms("lease_sweep_interval_ms", DEFAULT_SWEEP_INTERVAL_MS)
                .max(Duration::from_millis(10)),
            service_timeout: ms("service_timeout_ms", DEFAULT_SERVICE_TIMEOUT_MS),
            default_language,
            max_scripts: usize::try_from(section.get_u64("max_scripts", DEFAULT_MAX_SCRIPTS))
                .unwrap_or(usize::MAX)
                .max(1),
        }
    }
}

/// Capability flags for one engine instance.
///
/// Region-wide `[Capabilities]` entries come first; `capabilities.*` keys
/// in the engine's own section override them.
pub fn capabilities_from(
    engine_section: &KeyValueConfig,
    global: Option<&KeyValueConfig>,
) -> CapabilityFlagSet {
    let mut flags = CapabilityFlagSet::new();
    if let Some(global) = global {
        for key in global.keys() {
            flags = flags.with(key, global.get_bool(key, false));
        }
    }
    for (name, _) in engine_section.with_prefix(CAPABILITY_PREFIX) {
        let key = format!("{}{}", CAPABILITY_PREFIX, name);
        flags = flags.with(name, engine_section.get_bool(&key, false));
    }
    flags
}
