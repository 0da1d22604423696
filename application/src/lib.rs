//! Application layer for sandscript
//!
//! This crate contains the engine registry, the compiler chain, the sandbox
//! API surface, the region loader use case and the port definitions that
//! infrastructure adapters implement. It depends only on the domain layer.

pub mod compile;
pub mod ports;
pub mod registry;
pub mod sandbox;
pub mod use_cases;

// Re-export commonly used types
pub use compile::{
    BackendCompiler, CompileMetadata, CompilerChain, FrontEndCompiler, NativeCompiler,
    SourceTranslator, TranslateError, TranslatingCompiler,
};
pub use ports::{
    config_source::{ConfigSource, InMemoryConfigSource, KeyValueConfig},
    region::{DirectoryError, PermissionChecker, RegionContext, UserDirectory},
    script_engine::{EngineError, NoScriptEngine, ScriptEnginePort, ScriptLoadError, ScriptStatus},
};
pub use registry::{
    EngineFactory, EngineRegistry, FactoryError, RegistryError, engine_factory,
    panic_message,
};
pub use sandbox::{
    ApiCall, ApiDenial, ApiFunction, ApiModule, HandleArena, ProxyHandle, SandboxApiSurface,
    SandboxBuildError, SandboxError,
};
pub use use_cases::region_engine_loader::RegionEngineLoader;
