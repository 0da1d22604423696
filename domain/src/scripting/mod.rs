//! Scripting domain types
//!
//! Value objects describing scripts as the engine sees them: which
//! language a source is written in, what a compile pass produces, and
//! which running instance a host API call belongs to. The actual runtime
//! lives in the infrastructure layer behind `ScriptEnginePort`.

mod compiled;
mod context;
mod language;

pub use compiled::{Artifact, CompileError, CompileStage, CompiledUnit};
pub use context::{ScriptExecutionContext, ScriptItem};
pub use language::ScriptLanguage;

/// A simple value type that can be passed to/from scripts.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Nil,
}

impl ScriptValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn empty_string() -> Self {
        Self::String(String::new())
    }
}

impl std::fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Nil => write!(f, "nil"),
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_value_display() {
        assert_eq!(ScriptValue::from("abc").to_string(), "abc");
        assert_eq!(ScriptValue::Integer(-3).to_string(), "-3");
        assert_eq!(ScriptValue::Boolean(true).to_string(), "true");
        assert_eq!(ScriptValue::Nil.to_string(), "nil");
    }

    #[test]
    fn test_as_str_only_for_strings() {
        assert_eq!(ScriptValue::from("x").as_str(), Some("x"));
        assert_eq!(ScriptValue::Integer(1).as_str(), None);
    }
}
