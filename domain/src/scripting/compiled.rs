//! Output of a compilation pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::language::ScriptLanguage;
use crate::core::id::ObjectId;

/// Executable form produced by the back-end compiler.
///
/// The code has been accepted by the back end, so loading it into a
/// runtime cannot fail with a syntax error. Two artifacts built from the
/// same back-end source are equal regardless of which front end produced
/// that source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub backend_language: ScriptLanguage,
    pub code: String,
    /// blake3 hex digest of `code`
    pub digest: String,
}

impl Artifact {
    pub fn new(backend_language: ScriptLanguage, code: impl Into<String>) -> Self {
        let code = code.into();
        let digest = blake3::hash(code.as_bytes()).to_hex().to_string();
        Self {
            backend_language,
            code,
            digest,
        }
    }
}

/// A compiled script plus the metadata describing where it came from.
///
/// Immutable once produced. Recompiling a script yields a new unit that
/// supersedes the old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub script_id: ObjectId,
    /// Language the author wrote, not the back-end language.
    pub source_language: ScriptLanguage,
    pub artifact: Artifact,
    pub compiled_at: DateTime<Utc>,
}

impl CompiledUnit {
    pub fn new(script_id: ObjectId, source_language: ScriptLanguage, artifact: Artifact) -> Self {
        Self {
            script_id,
            source_language,
            artifact,
            compiled_at: Utc::now(),
        }
    }

    /// The same artifact attributed to a different source language.
    pub fn with_source_language(mut self, language: ScriptLanguage) -> Self {
        self.source_language = language;
        self
    }
}

/// Pipeline stage at which compilation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileStage {
    /// Language detection or source-to-source translation.
    Translate,
    /// The back-end compiler rejected the (translated) source.
    Backend,
}

impl std::fmt::Display for CompileStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Translate => write!(f, "translate"),
            Self::Backend => write!(f, "backend"),
        }
    }
}

/// Structured compile failure reported back to the script owner.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{language} {stage} error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
pub struct CompileError {
    pub language: ScriptLanguage,
    pub stage: CompileStage,
    pub line: Option<u32>,
    pub message: String,
}

impl CompileError {
    pub fn translate(language: ScriptLanguage, message: impl Into<String>) -> Self {
        Self {
            language,
            stage: CompileStage::Translate,
            line: None,
            message: message.into(),
        }
    }

    pub fn backend(language: ScriptLanguage, message: impl Into<String>) -> Self {
        Self {
            language,
            stage: CompileStage::Backend,
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }
}
