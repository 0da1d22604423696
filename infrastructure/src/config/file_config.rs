//! Raw TOML configuration data types

use std::collections::BTreeMap;
use std::fmt;

use sandscript_application::KeyValueConfig;
use sandscript_application::ports::config_source::parse_bool;
use sandscript_application::use_cases::region_engine_loader::{
    DEFAULT_ENGINE, SCRIPT_ENGINE_KEY, SCRIPTING_ENABLED_KEY, STARTUP_SECTION,
};
use sandscript_domain::sandbox::is_known_capability;
use sandscript_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Section holding region-wide capability switches.
pub const CAPABILITIES_SECTION: &str = "Capabilities";

/// One scalar (or nested table of scalars) from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Table(BTreeMap<String, FileValue>),
}

impl fmt::Display for FileValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
            Self::Table(_) => write!(f, "<table>"),
        }
    }
}

/// Raw contents of one `[Section]`.
pub type FileSection = BTreeMap<String, FileValue>;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileConfig {
    pub sections: BTreeMap<String, FileSection>,
}

impl Default for FileConfig {
    fn default() -> Self {
        let mut startup = FileSection::new();
        startup.insert(
            SCRIPT_ENGINE_KEY.to_string(),
            FileValue::String(DEFAULT_ENGINE.to_string()),
        );
        startup.insert(SCRIPTING_ENABLED_KEY.to_string(), FileValue::Bool(true));

        let mut sections = BTreeMap::new();
        sections.insert(STARTUP_SECTION.to_string(), startup);
        Self { sections }
    }
}

impl FileConfig {
    /// Find a section by name. Environment overrides arrive lower-cased,
    /// so an exact match is preferred but not required.
    pub fn section(&self, name: &str) -> Option<&FileSection> {
        self.sections.get(name).or_else(|| {
            self.sections
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, section)| section)
        })
    }

    /// Fold sections that differ only by case into one, letting the
    /// lower-case spelling (environment overrides) win key by key.
    pub fn fold_case_duplicates(mut self) -> Self {
        let lowered: Vec<String> = self
            .sections
            .keys()
            .filter(|name| **name == name.to_ascii_lowercase())
            .cloned()
            .collect();
        for lower in lowered {
            let canonical = self
                .sections
                .keys()
                .find(|name| **name != lower && name.eq_ignore_ascii_case(&lower))
                .cloned();
            if let Some(canonical) = canonical
                && let Some(overrides) = self.sections.remove(&lower)
                && let Some(target) = self.sections.get_mut(&canonical)
            {
                target.extend(overrides);
            }
        }
        self
    }

    /// Flatten a section into string pairs; nested tables become dotted
    /// keys (`capabilities.account-lookup`).
    pub fn key_values(&self, name: &str) -> Option<KeyValueConfig> {
        let section = self.section(name)?;
        let mut out = KeyValueConfig::new();
        flatten_into(&mut out, "", section);
        Some(out)
    }

    /// Replace a section with string values.
    pub fn set_key_values(&mut self, name: &str, values: &KeyValueConfig) {
        let section = values
            .keys()
            .filter_map(|key| {
                values
                    .get_raw(key)
                    .map(|v| (key.to_string(), FileValue::String(v.to_string())))
            })
            .collect();
        let existing = self
            .sections
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned();
        self.sections
            .insert(existing.unwrap_or_else(|| name.to_string()), section);
    }

    /// Validate the configuration, returning all detected issues.
    ///
    /// Checks:
    /// 1. `[Startup] script_engine` names a known engine
    /// 2. `enabled` / `scripting_enabled` switches are booleans
    /// 3. `[Capabilities]` entries name real capabilities and are booleans
    pub fn validate(&self, known_engines: &[String]) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if let Some(startup) = self.key_values(STARTUP_SECTION) {
            let engine = startup.get_string(SCRIPT_ENGINE_KEY, DEFAULT_ENGINE);
            if !known_engines.iter().any(|known| *known == engine) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownEngine {
                        name: engine.clone(),
                    },
                    format!(
                        "[{}] {}: no engine named '{}' (available: {})",
                        STARTUP_SECTION,
                        SCRIPT_ENGINE_KEY,
                        engine,
                        known_engines.join(", ")
                    ),
                ));
            }
            if startup.is_malformed_bool(SCRIPTING_ENABLED_KEY) {
                issues.push(invalid_bool(STARTUP_SECTION, SCRIPTING_ENABLED_KEY));
            }
        }

        for (name, section) in &self.sections {
            if section.contains_key("enabled") {
                let values = self.key_values(name).unwrap_or_default();
                if values.is_malformed_bool("enabled") {
                    issues.push(invalid_bool(name, "enabled"));
                }
            }
        }

        let mut capability_entries: Vec<(String, String, String)> = Vec::new();
        for (name, section) in &self.sections {
            let Some(values) = self.key_values(name) else {
                continue;
            };
            if name.eq_ignore_ascii_case(CAPABILITIES_SECTION) {
                for key in values.keys() {
                    capability_entries.push((name.clone(), key.to_string(), key.to_string()));
                }
            } else if section.contains_key("capabilities") {
                for (key, _) in values.with_prefix("capabilities.") {
                    capability_entries.push((
                        name.clone(),
                        format!("capabilities.{}", key),
                        key.to_string(),
                    ));
                }
            }
        }

        for (section, key, capability) in capability_entries {
            let values = self.key_values(&section).unwrap_or_default();
            if values.get_raw(&key).is_some_and(|v| parse_bool(v).is_none()) {
                issues.push(invalid_bool(&section, &key));
            }
            if !is_known_capability(&capability) {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::UnknownCapability {
                        name: capability.clone(),
                    },
                    format!(
                        "[{}] {}: unknown capability '{}' has no effect",
                        section, key, capability
                    ),
                ));
            }
        }

        issues
    }
}

fn invalid_bool(section: &str, key: &str) -> ConfigIssue {
    ConfigIssue::error(
        ConfigIssueCode::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            expected: "boolean",
        },
        format!("[{}] {}: expected a boolean (true/false)", section, key),
    )
}

fn flatten_into(out: &mut KeyValueConfig, prefix: &str, section: &FileSection) {
    for (key, value) in section {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            FileValue::Table(inner) => flatten_into(out, &full, inner),
            scalar => out.set(full, scalar),
        }
    }
}
