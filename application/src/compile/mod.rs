//! Compiler chain: lowers front-end script languages to the back end.
//!
//! A chain is built from links that all expose the same
//! [`FrontEndCompiler`] interface:
//!
//! ```text
//! CompilerChain::compile(source)
//!   └─ detect `//<lang>` header
//!        └─ TranslatingCompiler(slang)   pre_process → convert
//!             └─ NativeCompiler(lua)     pre_process → BackendCompiler::compile
//! ```
//!
//! Callers only ever talk to the top of the chain and get back either a
//! complete [`CompiledUnit`] or a [`CompileError`]; how many translation
//! links sit in between is invisible to them. Each stage consumes its
//! input whole and produces complete output or an error, never a partial
//! result.
//!
//! [`CompiledUnit`]: sandscript_domain::CompiledUnit
//! [`CompileError`]: sandscript_domain::CompileError

mod chain;
mod header;

pub use chain::{CompilerChain, NativeCompiler, TranslatingCompiler};
pub use header::{LanguageHeader, split_language_header};

use sandscript_domain::{Artifact, CompileError, CompiledUnit, ObjectId, ScriptLanguage};
use thiserror::Error;

/// Identity of the script being compiled, passed through every link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileMetadata {
    pub script_id: ObjectId,
    pub script_name: String,
}

impl CompileMetadata {
    pub fn new(script_id: ObjectId, script_name: impl Into<String>) -> Self {
        Self {
            script_id,
            script_name: script_name.into(),
        }
    }
}

/// Source-to-source translation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TranslateError {
    pub line: Option<u32>,
    pub message: String,
}

impl TranslateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(line: u32, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

/// Pure source-to-source transform from one language toward another.
pub trait SourceTranslator: Send + Sync {
    /// Language this translator reads.
    fn language(&self) -> ScriptLanguage;

    /// Front-end specific cleanup run before `convert`. Translators that
    /// need none must return the input unchanged.
    fn pre_process(&self, source: &str) -> String;

    fn convert(&self, source: &str) -> Result<String, TranslateError>;
}

/// Terminal compiler producing an executable artifact.
pub trait BackendCompiler: Send + Sync {
    fn language(&self) -> ScriptLanguage;

    fn compile(&self, meta: &CompileMetadata, source: &str) -> Result<Artifact, CompileError>;
}

/// Uniform interface of every link in the chain.
pub trait FrontEndCompiler: Send + Sync {
    /// Language accepted by `compile`.
    fn language(&self) -> ScriptLanguage;

    /// Identity for links that do all preprocessing inside translation.
    fn pre_process(&self, source: &str) -> String;

    /// Lower `source` all the way to a compiled unit.
    fn compile(&self, meta: &CompileMetadata, source: &str) -> Result<CompiledUnit, CompileError>;
}
