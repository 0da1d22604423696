use std::sync::LazyLock;

use mlua::prelude::*;
use regex::Regex;
use sandscript_application::{BackendCompiler, CompileMetadata};
use sandscript_domain::{Artifact, CompileError, ScriptLanguage};

/// `<chunk>:<line>: <message>` as produced by the Lua parser.
static SYNTAX_ERROR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:.*?):(\d+):\s*(.*)$").ok());

/// Terminal compiler for Lua 5.4.
///
/// Parses the source in a bare VM without running it. The artifact keeps
/// the validated source text; script VMs load it as text, never as
/// precompiled bytecode.
#[derive(Debug, Default)]
pub struct LuaBackendCompiler;

impl LuaBackendCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl BackendCompiler for LuaBackendCompiler {
    fn language(&self) -> ScriptLanguage {
        ScriptLanguage::Lua
    }

    fn compile(&self, meta: &CompileMetadata, source: &str) -> Result<Artifact, CompileError> {
        let lua = Lua::new_with(LuaStdLib::NONE, LuaOptions::default()).map_err(|e| {
            CompileError::backend(ScriptLanguage::Lua, format!("parser unavailable: {}", e))
        })?;

        match lua
            .load(source)
            .set_name(format!("={}", meta.script_name))
            .into_function()
        {
            Ok(_) => Ok(Artifact::new(ScriptLanguage::Lua, source)),
            Err(e) => Err(syntax_error(&e)),
        }
    }
}

/// Turn a parser error into a [`CompileError`] with a line when one can be
/// recovered from the message.
pub(crate) fn syntax_error(err: &LuaError) -> CompileError {
    let raw = match err {
        LuaError::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    let first = raw.lines().next().unwrap_or_default();

    let parsed = SYNTAX_ERROR.as_ref().and_then(|re| re.captures(first)).and_then(|caps| {
        let line = caps.get(1)?.as_str().parse::<u32>().ok()?;
        Some((line, caps.get(2)?.as_str().to_string()))
    });

    match parsed {
        Some((line, message)) => {
            CompileError::backend(ScriptLanguage::Lua, message).at_line(Some(line))
        }
        None => CompileError::backend(ScriptLanguage::Lua, first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandscript_domain::{CompileStage, ObjectId};

    fn compile(source: &str) -> Result<Artifact, CompileError> {
        LuaBackendCompiler::new().compile(&CompileMetadata::new(ObjectId::new_random(), "t"), source)
    }

    #[test]
    fn test_valid_source_yields_artifact() {
        let artifact = compile("local x = 1\nreturn x + 1").unwrap();
        assert_eq!(artifact.backend_language, ScriptLanguage::Lua);
        assert_eq!(artifact.code, "local x = 1\nreturn x + 1");
        assert_eq!(artifact.digest.len(), 64);
    }

    #[test]
    fn test_syntax_error_has_line() {
        let err = compile("local a = 1\nlocal b = 2\nlocal = 3\n").unwrap_err();
        assert_eq!(err.stage, CompileStage::Backend);
        assert_eq!(err.line, Some(3));
        assert!(!err.message.is_empty());
        assert!(!err.message.starts_with("t:"));
    }

    #[test]
    fn test_compiling_does_not_run_code() {
        // Would fail at run time (calling nil), but parses fine.
        assert!(compile("undefined_function()").is_ok());
    }
}
