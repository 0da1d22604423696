//! Domain error types

use thiserror::Error;

use crate::engine::EngineState;

/// A caller-supplied key that is not a valid object id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid object id: '{0}'")]
pub struct IdParseError(pub String);

/// An engine lifecycle transition that the state machine does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal engine transition: {from} -> {to}")]
pub struct LifecycleError {
    pub from: EngineState,
    pub to: EngineState,
}
