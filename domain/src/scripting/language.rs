use serde::{Deserialize, Serialize};

/// Front-end source languages understood by the compiler chain.
///
/// `Lua` is the canonical language accepted by the back-end compiler.
/// Every other language is lowered to it by one or more translation links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    /// Lua 5.4 source, compiled directly by the back end.
    Lua,
    /// Lua with C-style operators and comments (`!=`, `&&`, `||`, `!`, `//`).
    Slang,
}

impl ScriptLanguage {
    /// Tag used in `//<tag>` source headers and in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lua => "lua",
            Self::Slang => "slang",
        }
    }

    pub fn all() -> &'static [ScriptLanguage] {
        &[Self::Lua, Self::Slang]
    }
}

impl std::str::FromStr for ScriptLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lua" => Ok(Self::Lua),
            "slang" => Ok(Self::Slang),
            other => Err(format!("unsupported script language: '{}'", other)),
        }
    }
}

impl std::fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_tags_parse_case_insensitively() {
        assert_eq!("LUA".parse::<ScriptLanguage>(), Ok(ScriptLanguage::Lua));
        assert_eq!(" slang ".parse::<ScriptLanguage>(), Ok(ScriptLanguage::Slang));
    }

    #[test]
    fn test_unknown_language() {
        let err = "cobol".parse::<ScriptLanguage>().unwrap_err();
        assert!(err.contains("cobol"));
    }

    #[test]
    fn test_all_tags_parse_back() {
        for lang in ScriptLanguage::all() {
            assert_eq!(lang.as_str().parse::<ScriptLanguage>().unwrap(), *lang);
        }
    }
}
