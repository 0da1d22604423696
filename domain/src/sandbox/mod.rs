//! Sandbox value objects: capability flags and handle leases.

pub mod capability;
pub mod lease;

pub use capability::{
    ACCOUNT_LOOKUP, CapabilityFlagSet, EXTENDED_COUNTRY_LOOKUP, KNOWN_CAPABILITIES,
    is_known_capability,
};
pub use lease::{LeaseMode, LeasePolicy, LeaseState, RemoteProxyLease};
