//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod region_engine_loader;
