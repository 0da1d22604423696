//! Domain layer for sandscript
//!
//! This crate contains the value objects and invariants of the script
//! hosting subsystem. It has no dependencies on runtimes, configuration
//! files or I/O.
//!
//! # Core Concepts
//!
//! ## Engines
//!
//! Each region runs one script engine whose lifecycle is the
//! [`EngineState`] machine.
//!
//! ## Compilation
//!
//! Scripts are written in a [`ScriptLanguage`] and lowered to a
//! [`CompiledUnit`] or rejected with a [`CompileError`].
//!
//! ## Sandbox
//!
//! Running scripts are identified by a [`ScriptExecutionContext`]. Host
//! functionality is gated by a [`CapabilityFlagSet`] and script-visible
//! handles are bounded by a [`RemoteProxyLease`].

pub mod config;
pub mod core;
pub mod engine;
pub mod region;
pub mod sandbox;
pub mod scripting;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use core::{
    error::{IdParseError, LifecycleError},
    id::ObjectId,
};
pub use engine::EngineState;
pub use region::Account;
pub use sandbox::{
    CapabilityFlagSet, LeaseMode, LeasePolicy, LeaseState, RemoteProxyLease,
};
pub use scripting::{
    Artifact, CompileError, CompileStage, CompiledUnit, ScriptExecutionContext, ScriptItem,
    ScriptLanguage, ScriptValue,
};
