//! Core domain concepts shared across all subdomains.
//!
//! - [`id::ObjectId`]: UUID keys for scripts, objects and accounts
//! - [`error`]: domain-level errors

pub mod error;
pub mod id;
