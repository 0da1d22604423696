//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod config_source;
pub mod region;
pub mod script_engine;
