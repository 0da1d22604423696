//! Sandbox API surface: the host functions scripts may call.
//!
//! Scripts never touch region services directly. Each running script holds
//! a [`ProxyHandle`] issued by the [`HandleArena`]; every call goes through
//! [`SandboxApiSurface::invoke`], which resolves the handle to the caller's
//! execution context, checks the capability gate and runs the function.
//!
//! Two kinds of failure exist and they are deliberately kept apart:
//!
//! - [`SandboxError`] means the *call itself* is invalid (expired lease,
//!   stale handle, no such function). It reaches the script as an error.
//! - [`ApiDenial`] means the call was valid but the host refuses or cannot
//!   answer. It never reaches the script: the function's neutral value is
//!   returned instead and the denial is logged at debug level.

mod handles;
pub mod modules;
mod surface;

pub use handles::{HandleArena, ProxyHandle};
pub use surface::{
    ApiCall, ApiFunction, ApiHandler, ApiModule, SandboxApiBuilder, SandboxApiSurface,
    SandboxBuildError,
};

use thiserror::Error;

/// Invalid sandbox call, surfaced to the script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("lease expired for handle {0}")]
    LeaseExpired(ProxyHandle),

    #[error("invalid handle {0}")]
    InvalidHandle(ProxyHandle),

    #[error("unknown host function '{0}'")]
    UnknownFunction(String),
}

/// Reason a valid call produced the neutral result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiDenial {
    #[error("capability '{0}' is disabled")]
    CapabilityDisabled(&'static str),

    #[error("caller lacks the required privilege")]
    PermissionDenied,

    #[error("malformed argument: {0}")]
    MalformedArgument(String),

    #[error("backing service unavailable: {0}")]
    BackingServiceUnavailable(String),
}
