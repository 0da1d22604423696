use std::collections::HashMap;
use std::sync::Arc;

use sandscript_domain::{CompileError, CompileStage, CompiledUnit, ScriptLanguage};

use super::header::{LanguageHeader, split_language_header};
use super::{BackendCompiler, CompileMetadata, FrontEndCompiler, SourceTranslator};

/// Terminal link: hands source straight to a back-end compiler.
pub struct NativeCompiler {
    backend: Arc<dyn BackendCompiler>,
}

impl NativeCompiler {
    pub fn new(backend: Arc<dyn BackendCompiler>) -> Self {
        Self { backend }
    }
}

impl FrontEndCompiler for NativeCompiler {
    fn language(&self) -> ScriptLanguage {
        self.backend.language()
    }

    fn pre_process(&self, source: &str) -> String {
        source.to_string()
    }

    fn compile(&self, meta: &CompileMetadata, source: &str) -> Result<CompiledUnit, CompileError> {
        let source = self.pre_process(source);
        let artifact = self.backend.compile(meta, &source)?;
        Ok(CompiledUnit::new(meta.script_id, self.language(), artifact))
    }
}

/// Non-terminal link: translate, then delegate to the next link.
pub struct TranslatingCompiler {
    translator: Box<dyn SourceTranslator>,
    next: Arc<dyn FrontEndCompiler>,
}

impl TranslatingCompiler {
    pub fn new(translator: Box<dyn SourceTranslator>, next: Arc<dyn FrontEndCompiler>) -> Self {
        Self { translator, next }
    }

    /// Language the next link accepts.
    pub fn target_language(&self) -> ScriptLanguage {
        self.next.language()
    }
}

impl FrontEndCompiler for TranslatingCompiler {
    fn language(&self) -> ScriptLanguage {
        self.translator.language()
    }

    fn pre_process(&self, source: &str) -> String {
        self.translator.pre_process(source)
    }

    fn compile(&self, meta: &CompileMetadata, source: &str) -> Result<CompiledUnit, CompileError> {
        let prepared = self.pre_process(source);
        let translated = self.translator.convert(&prepared).map_err(|e| CompileError {
            language: self.language(),
            stage: CompileStage::Translate,
            line: e.line,
            message: e.message,
        })?;

        tracing::trace!(
            script = %meta.script_name,
            from = %self.language(),
            to = %self.target_language(),
            "Translated script source"
        );

        let unit = self.next.compile(meta, &translated)?;
        Ok(unit.with_source_language(self.language()))
    }
}

/// Per-engine set of front-end compilers keyed by source language.
pub struct CompilerChain {
    front_ends: HashMap<ScriptLanguage, Arc<dyn FrontEndCompiler>>,
    default_language: ScriptLanguage,
}

impl CompilerChain {
    pub fn new(default_language: ScriptLanguage) -> Self {
        Self {
            front_ends: HashMap::new(),
            default_language,
        }
    }

    /// Add (or replace) the top-of-chain compiler for its language.
    pub fn with_front_end(mut self, compiler: Arc<dyn FrontEndCompiler>) -> Self {
        self.front_ends.insert(compiler.language(), compiler);
        self
    }

    pub fn default_language(&self) -> ScriptLanguage {
        self.default_language
    }

    pub fn supports(&self, language: ScriptLanguage) -> bool {
        self.front_ends.contains_key(&language)
    }

    /// Supported languages, in tag order.
    pub fn languages(&self) -> Vec<ScriptLanguage> {
        let mut langs: Vec<_> = self.front_ends.keys().copied().collect();
        langs.sort_by_key(|l| l.as_str());
        langs
    }

    /// Work out which language `source` is written in and strip its header.
    pub fn resolve_language<'a>(
        &self,
        source: &'a str,
    ) -> (ScriptLanguage, std::borrow::Cow<'a, str>) {
        let (header, body) = split_language_header(source);
        let language = match header {
            LanguageHeader::Absent => self.default_language,
            LanguageHeader::Tag(language) => language,
        };
        (language, body)
    }

    /// Compile `source` with whichever front end its header selects.
    pub fn compile(
        &self,
        meta: &CompileMetadata,
        source: &str,
    ) -> Result<CompiledUnit, CompileError> {
        let (language, body) = self.resolve_language(source);
        let front_end = self.front_ends.get(&language).ok_or_else(|| {
            CompileError::translate(
                language,
                format!("no compiler configured for language '{}'", language),
            )
        })?;

        let result = front_end.compile(meta, &body);
        match &result {
            Ok(unit) => tracing::debug!(
                script = %meta.script_name,
                language = %language,
                digest = %unit.artifact.digest,
                "Compiled script"
            ),
            Err(e) => tracing::debug!(
                script = %meta.script_name,
                language = %language,
                error = %e,
                "Script failed to compile"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::TranslateError;
    use sandscript_domain::{Artifact, ObjectId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Back end that accepts anything without the word "broken".
    struct FakeBackend {
        calls: AtomicUsize,
    }

    impl BackendCompiler for FakeBackend {
        fn language(&self) -> ScriptLanguage {
            ScriptLanguage::Lua
        }

        fn compile(&self, _meta: &CompileMetadata, source: &str) -> Result<Artifact, CompileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(idx) = source.lines().position(|l| l.contains("broken")) {
                return Err(CompileError::backend(ScriptLanguage::Lua, "syntax error")
                    .at_line(Some(idx as u32 + 1)));
            }
            Ok(Artifact::new(ScriptLanguage::Lua, source))
        }
    }

    /// `!=` → `~=`; `@@` is untranslatable; `#pragma` lines are dropped.
    struct FakeTranslator;

    impl SourceTranslator for FakeTranslator {
        fn language(&self) -> ScriptLanguage {
            ScriptLanguage::Slang
        }

        fn pre_process(&self, source: &str) -> String {
            source
                .lines()
                .map(|l| if l.starts_with("#pragma") { "" } else { l })
                .collect::<Vec<_>>()
                .join("\n")
        }

        fn convert(&self, source: &str) -> Result<String, TranslateError> {
            if let Some(idx) = source.lines().position(|l| l.contains("@@")) {
                return Err(TranslateError::at_line(idx as u32 + 1, "unexpected '@@'"));
            }
            Ok(source.replace("!=", "~="))
        }
    }

    fn meta() -> CompileMetadata {
        CompileMetadata::new(ObjectId::new_random(), "test")
    }

    fn backend() -> Arc<FakeBackend> {
        Arc::new(FakeBackend {
            calls: AtomicUsize::new(0),
        })
    }

    fn chain_with(backend: Arc<FakeBackend>) -> CompilerChain {
        let native: Arc<dyn FrontEndCompiler> = Arc::new(NativeCompiler::new(backend));
        let slang: Arc<dyn FrontEndCompiler> = Arc::new(TranslatingCompiler::new(
            Box::new(FakeTranslator),
            Arc::clone(&native),
        ));
        CompilerChain::new(ScriptLanguage::Lua)
            .with_front_end(native)
            .with_front_end(slang)
    }

    #[test]
    fn test_default_language_goes_straight_to_backend() {
        let backend = backend();
        let chain = chain_with(Arc::clone(&backend));
        let unit = chain.compile(&meta(), "return 1").unwrap();
        assert_eq!(unit.source_language, ScriptLanguage::Lua);
        assert_eq!(unit.artifact.code, "return 1");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_chain_composition_is_transparent() {
        let backend = backend();
        let chain = chain_with(Arc::clone(&backend));
        let source = "//slang\n#pragma strict\nreturn a != b";

        let via_chain = chain.compile(&meta(), source).unwrap();

        let translator = FakeTranslator;
        let (_, body) = chain.resolve_language(source);
        let mapped = translator.convert(&translator.pre_process(&body)).unwrap();
        let direct = NativeCompiler::new(backend).compile(&meta(), &mapped).unwrap();

        assert_eq!(via_chain.artifact, direct.artifact);
        assert_eq!(via_chain.source_language, ScriptLanguage::Slang);
        assert_eq!(direct.source_language, ScriptLanguage::Lua);
    }

    #[test]
    fn test_translation_failure_reports_front_end_language() {
        let backend = backend();
        let chain = chain_with(Arc::clone(&backend));
        let err = chain
            .compile(&meta(), "//slang\nlocal x = 1\nlocal y = @@\n")
            .unwrap_err();

        assert_eq!(err.language, ScriptLanguage::Slang);
        assert_eq!(err.stage, CompileStage::Translate);
        assert_eq!(err.line, Some(3));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backend_failure_passes_through_chain() {
        let chain = chain_with(backend());
        let err = chain.compile(&meta(), "//slang\nthis is broken").unwrap_err();
        assert_eq!(err.language, ScriptLanguage::Lua);
        assert_eq!(err.stage, CompileStage::Backend);
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_unknown_tag_stays_in_source() {
        let native: Arc<dyn FrontEndCompiler> = Arc::new(NativeCompiler::new(backend()));
        let slang: Arc<dyn FrontEndCompiler> = Arc::new(TranslatingCompiler::new(
            Box::new(FakeTranslator),
            Arc::clone(&native),
        ));
        let chain = CompilerChain::new(ScriptLanguage::Slang)
            .with_front_end(native)
            .with_front_end(slang);

        let unit = chain.compile(&meta(), "//todo\nreturn a != b").unwrap();
        assert_eq!(unit.source_language, ScriptLanguage::Slang);
        assert_eq!(unit.artifact.code, "//todo\nreturn a ~= b");
    }

    #[test]
    fn test_language_without_front_end() {
        let native: Arc<dyn FrontEndCompiler> = Arc::new(NativeCompiler::new(backend()));
        let chain = CompilerChain::new(ScriptLanguage::Lua).with_front_end(native);
        let err = chain.compile(&meta(), "//slang\nreturn 1").unwrap_err();
        assert_eq!(err.language, ScriptLanguage::Slang);
        assert!(err.message.contains("no compiler configured"));
    }

    #[test]
    fn test_three_link_chain_needs_no_caller_changes() {
        let backend = backend();
        let native: Arc<dyn FrontEndCompiler> = Arc::new(NativeCompiler::new(backend));
        let inner: Arc<dyn FrontEndCompiler> =
            Arc::new(TranslatingCompiler::new(Box::new(FakeTranslator), native));
        let outer: Arc<dyn FrontEndCompiler> =
            Arc::new(TranslatingCompiler::new(Box::new(FakeTranslator), inner));
        let chain = CompilerChain::new(ScriptLanguage::Slang).with_front_end(outer);

        let unit = chain.compile(&meta(), "return 1 != 2").unwrap();
        assert_eq!(unit.artifact.code, "return 1 ~= 2");
        assert_eq!(unit.source_language, ScriptLanguage::Slang);
    }

    #[test]
    fn test_languages_listing() {
        let chain = chain_with(backend());
        assert_eq!(
            chain.languages(),
            vec![ScriptLanguage::Lua, ScriptLanguage::Slang]
        );
        assert!(chain.supports(ScriptLanguage::Slang));
    }
}
