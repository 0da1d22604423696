//! Configuration source port.
//!
//! Engines and the region loader read their settings through named
//! sections of string key/value pairs. Typed getters always take a
//! default so that a missing or malformed entry never aborts startup.

use std::collections::BTreeMap;

/// One configuration section: string keys mapped to string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueConfig {
    values: BTreeMap<String, String>,
}

impl KeyValueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Boolean value; accepts true/false, 1/0, yes/no, on/off
    /// (case-insensitive). Anything else falls back to `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_raw(key).and_then(parse_bool).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get_raw(key)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get_raw(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Whether the key exists but cannot be read as a boolean.
    pub fn is_malformed_bool(&self, key: &str) -> bool {
        self.get_raw(key).is_some_and(|v| parse_bool(v).is_none())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Entries whose key starts with `prefix`, with the prefix removed.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.values.iter().filter_map(move |(k, v)| {
            k.strip_prefix(prefix).map(|rest| (rest, v.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for KeyValueConfig {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut cfg = Self::new();
        for (k, v) in iter {
            cfg.set(k, v);
        }
        cfg
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Port for reading (and seeding) configuration sections.
pub trait ConfigSource: Send + Sync {
    /// Return a copy of the named section, if present.
    fn section(&self, name: &str) -> Option<KeyValueConfig>;

    /// Create or replace a section. Used to seed defaults for sections
    /// that are absent.
    fn set_section(&mut self, name: &str, section: KeyValueConfig);

    /// Section names, sorted.
    fn section_names(&self) -> Vec<String>;
}

/// Map-backed config source for tests and embedding hosts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigSource {
    sections: BTreeMap<String, KeyValueConfig>,
}

impl InMemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, name: impl Into<String>, section: KeyValueConfig) -> Self {
        self.sections.insert(name.into(), section);
        self
    }
}

impl ConfigSource for InMemoryConfigSource {
    fn section(&self, name: &str) -> Option<KeyValueConfig> {
        self.sections.get(name).cloned()
    }

    fn set_section(&mut self, name: &str, section: KeyValueConfig) {
        self.sections.insert(name.to_string(), section);
    }

    fn section_names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bool_variants() {
        let cfg = KeyValueConfig::new()
            .with("a", "TRUE")
            .with("b", "off")
            .with("c", "1")
            .with("d", "maybe");
        assert!(cfg.get_bool("a", false));
        assert!(!cfg.get_bool("b", true));
        assert!(cfg.get_bool("c", false));
        assert!(cfg.get_bool("d", true));
        assert!(!cfg.get_bool("d", false));
        assert!(cfg.is_malformed_bool("d"));
        assert!(!cfg.is_malformed_bool("missing"));
    }

    #[test]
    fn test_defaults_for_missing_keys() {
        let cfg = KeyValueConfig::new();
        assert_eq!(cfg.get_string("engine", "lua"), "lua");
        assert_eq!(cfg.get_u64("limit", 7), 7);
        assert!(cfg.get_bool("enabled", true));
    }

    #[test]
    fn test_get_u64_ignores_garbage() {
        let cfg = KeyValueConfig::new().with("n", " 42 ").with("bad", "-1");
        assert_eq!(cfg.get_u64("n", 0), 42);
        assert_eq!(cfg.get_u64("bad", 9), 9);
    }

    #[test]
    fn test_with_prefix() {
        let cfg = KeyValueConfig::new()
            .with("capabilities.account-lookup", true)
            .with("capabilities.extended-country-lookup", false)
            .with("enabled", true);
        let caps: Vec<_> = cfg.with_prefix("capabilities.").collect();
        assert_eq!(
            caps,
            vec![("account-lookup", "true"), ("extended-country-lookup", "false")]
        );
    }

    #[test]
    fn test_in_memory_source_seeding() {
        let mut source = InMemoryConfigSource::new();
        assert!(source.section("LuaEngine").is_none());
        source.set_section("LuaEngine", KeyValueConfig::new().with("enabled", true));
        assert!(source.section("LuaEngine").unwrap().get_bool("enabled", false));
        assert_eq!(source.section_names(), vec!["LuaEngine".to_string()]);
    }
}
