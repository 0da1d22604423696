//! Capability flags gating privileged host API functions.

use std::collections::BTreeMap;

/// Look up another agent's country/locale.
pub const EXTENDED_COUNTRY_LOOKUP: &str = "extended-country-lookup";
/// Look up another agent's display name.
pub const ACCOUNT_LOOKUP: &str = "account-lookup";

/// Every capability some host API function consults.
pub const KNOWN_CAPABILITIES: &[&str] = &[EXTENDED_COUNTRY_LOOKUP, ACCOUNT_LOOKUP];

pub fn is_known_capability(name: &str) -> bool {
    KNOWN_CAPABILITIES.contains(&name)
}

/// Immutable mapping from capability name to on/off.
///
/// Read once when an engine instance is created and never changed for the
/// lifetime of that instance. Names that were never set are disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityFlagSet {
    flags: BTreeMap<String, bool>,
}

impl CapabilityFlagSet {
    /// A set with every capability disabled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, bool)>,
        K: Into<String>,
    {
        Self {
            flags: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Builder-style toggle, only usable before the set is shared.
    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(name.into(), enabled);
        self
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Names of all enabled capabilities, sorted.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
