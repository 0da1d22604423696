//! `//<lang>` source headers.
//!
//! A script may select its front-end language with a first line of the
//! form `//lua` or `//slang`. The tag is a single word directly after the
//! slashes and must name a known language; `// a comment` or `//todo` is
//! ordinary source.

use std::borrow::Cow;

use sandscript_domain::ScriptLanguage;

/// Result of inspecting the first line of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageHeader {
    /// No header; the chain's default language applies.
    Absent,
    /// Header naming this language.
    Tag(ScriptLanguage),
}

const MAX_TAG_LEN: usize = 16;

/// Split a header off `source`.
///
/// The header line is replaced by an empty line so that line numbers in
/// later diagnostics still match the author's file.
pub fn split_language_header(source: &str) -> (LanguageHeader, Cow<'_, str>) {
    let (first, rest) = match source.find('\n') {
        Some(pos) => (&source[..pos], &source[pos..]),
        None => (source, ""),
    };

    let Some(tag) = first.trim().strip_prefix("//") else {
        return (LanguageHeader::Absent, Cow::Borrowed(source));
    };

    let is_tag = !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '#');
    let language = match tag.parse::<ScriptLanguage>() {
        Ok(language) if is_tag => language,
        _ => return (LanguageHeader::Absent, Cow::Borrowed(source)),
    };

    (LanguageHeader::Tag(language), Cow::Owned(rest.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_detected_and_blanked() {
        let (header, body) = split_language_header("//slang\nx = 1 != 2\n");
        assert_eq!(header, LanguageHeader::Tag(ScriptLanguage::Slang));
        assert_eq!(body, "\nx = 1 != 2\n");
        assert_eq!(body.lines().count(), 2);
    }

    #[test]
    fn test_header_case_and_whitespace() {
        let (header, _) = split_language_header("  //LUA  \nreturn 1");
        assert_eq!(header, LanguageHeader::Tag(ScriptLanguage::Lua));
    }

    #[test]
    fn test_plain_comment_is_not_a_header() {
        let src = "// says hello\nprint('hi')";
        let (header, body) = split_language_header(src);
        assert_eq!(header, LanguageHeader::Absent);
        assert_eq!(body, src);
    }

    #[test]
    fn test_unknown_word_is_a_comment_not_a_header() {
        for src in ["//todo\nx = 1", "//main\nx = 1", "//cobol\nDISPLAY 'HI'"] {
            let (header, body) = split_language_header(src);
            assert_eq!(header, LanguageHeader::Absent);
            assert_eq!(body, src);
        }
    }

    #[test]
    fn test_no_header() {
        let (header, body) = split_language_header("return 1");
        assert_eq!(header, LanguageHeader::Absent);
        assert_eq!(body, "return 1");
    }

    #[test]
    fn test_header_only_source() {
        let (header, body) = split_language_header("//lua");
        assert_eq!(header, LanguageHeader::Tag(ScriptLanguage::Lua));
        assert_eq!(body, "");
    }
}
