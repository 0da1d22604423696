//! Concrete compiler chain links.
//!
//! - [`LuaBackendCompiler`]: terminal link; validates Lua 5.4 source
//! - [`SlangTranslator`]: C-operator dialect translated to Lua

mod lua_backend;
mod slang;

pub use lua_backend::LuaBackendCompiler;
pub use slang::SlangTranslator;

use std::sync::Arc;

use sandscript_application::{
    BackendCompiler, CompilerChain, FrontEndCompiler, NativeCompiler, TranslatingCompiler,
};
use sandscript_domain::ScriptLanguage;

/// Standard chain: Lua straight to the back end, Slang through translation.
pub fn standard_chain(
    backend: Arc<dyn BackendCompiler>,
    default_language: ScriptLanguage,
) -> CompilerChain {
    let native: Arc<dyn FrontEndCompiler> = Arc::new(NativeCompiler::new(backend));
    let slang: Arc<dyn FrontEndCompiler> = Arc::new(TranslatingCompiler::new(
        Box::new(SlangTranslator),
        Arc::clone(&native),
    ));
    CompilerChain::new(default_language)
        .with_front_end(native)
        .with_front_end(slang)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandscript_application::CompileMetadata;
    use sandscript_domain::{CompileStage, ObjectId};

    fn chain() -> CompilerChain {
        standard_chain(Arc::new(LuaBackendCompiler::new()), ScriptLanguage::Lua)
    }

    fn meta() -> CompileMetadata {
        CompileMetadata::new(ObjectId::new_random(), "door")
    }

    #[test]
    fn test_slang_and_lua_produce_equal_artifacts() {
        let chain = chain();
        let slang = chain
            .compile(&meta(), "//slang\nif a != b && !c then x = 1 end // done")
            .unwrap();
        let lua = chain
            .compile(&meta(), "\nif a ~= b and not c then x = 1 end -- done")
            .unwrap();
        assert_eq!(slang.artifact, lua.artifact);
        assert_eq!(slang.source_language, ScriptLanguage::Slang);
        assert_eq!(lua.source_language, ScriptLanguage::Lua);
    }

    #[test]
    fn test_slang_syntax_error_keeps_author_line_numbers() {
        let err = chain()
            .compile(&meta(), "//slang\n#pragma strict\nlocal x = 1\nlocal = 2\n")
            .unwrap_err();
        assert_eq!(err.stage, CompileStage::Backend);
        assert_eq!(err.language, ScriptLanguage::Lua);
        assert_eq!(err.line, Some(4));
    }

    #[test]
    fn test_slang_translation_error() {
        let err = chain()
            .compile(&meta(), "//slang\nlocal s = \"open\n")
            .unwrap_err();
        assert_eq!(err.stage, CompileStage::Translate);
        assert_eq!(err.language, ScriptLanguage::Slang);
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_default_language_slang() {
        let chain = standard_chain(Arc::new(LuaBackendCompiler::new()), ScriptLanguage::Slang);
        let unit = chain.compile(&meta(), "return 1 != 2").unwrap();
        assert_eq!(unit.source_language, ScriptLanguage::Slang);
        assert_eq!(unit.artifact.code, "return 1 ~= 2");
    }
}
