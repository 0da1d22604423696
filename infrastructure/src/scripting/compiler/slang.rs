//! Slang: Lua with C-style operators and comments.
//!
//! | Slang        | Lua          |
//! |--------------|--------------|
//! | `// c`       | `-- c`       |
//! | `/* c */`    | `--[[ c ]]`  |
//! | `!=`         | `~=`         |
//! | `&&` / `\|\|` | `and` / `or` |
//! | `!x`         | `not x`      |
//! | `#pragma …`  | (blank line) |
//!
//! Everything else, including quoted and long-bracket strings, is passed
//! through. Translation never adds or removes
//! lines, so back-end diagnostics point at the author's line numbers.

use sandscript_application::{SourceTranslator, TranslateError};
use sandscript_domain::ScriptLanguage;

#[derive(Debug, Default, Clone, Copy)]
pub struct SlangTranslator;

impl SourceTranslator for SlangTranslator {
    fn language(&self) -> ScriptLanguage {
        ScriptLanguage::Slang
    }

    fn pre_process(&self, source: &str) -> String {
        source
            .split('\n')
            .map(|line| {
                if line.trim_start().starts_with("#pragma") {
                    ""
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn convert(&self, source: &str) -> Result<String, TranslateError> {
        Scanner::new(source).run()
    }
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    out: String,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            out: String::with_capacity(source.len()),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn run(mut self) -> Result<String, TranslateError> {
        while let Some(c) = self.peek(0) {
            match (c, self.peek(1)) {
                ('"', _) | ('\'', _) => self.string(c)?,
                ('/', Some('/')) => {
                    self.pos += 2;
                    self.out.push_str("--");
                }
                ('/', Some('*')) => self.block_comment()?,
                ('-', Some('-')) => self.lua_comment()?,
                ('[', Some('[' | '=')) => self.long_string()?,
                ('!', Some('=')) => {
                    self.pos += 2;
                    self.out.push_str("~=");
                }
                ('&', Some('&')) => {
                    self.pos += 2;
                    self.word("and");
                }
                ('|', Some('|')) => {
                    self.pos += 2;
                    self.word("or");
                }
                ('!', _) => {
                    self.pos += 1;
                    self.word("not");
                }
                _ => {
                    self.bump();
                    self.out.push(c);
                }
            }
        }
        Ok(self.out)
    }

    /// Emit a keyword operator, padding it only where the source did not.
    fn word(&mut self, keyword: &str) {
        if self.out.chars().last().is_some_and(|c| !c.is_whitespace() && c != '(') {
            self.out.push(' ');
        }
        self.out.push_str(keyword);
        if self.peek(0).is_some_and(|c| !c.is_whitespace() && c != ')') {
            self.out.push(' ');
        }
    }

    fn string(&mut self, quote: char) -> Result<(), TranslateError> {
        let start = self.line;
        self.bump();
        self.out.push(quote);
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(TranslateError::at_line(start, "unterminated string literal"));
                }
                Some('\\') => {
                    self.out.push('\\');
                    match self.bump() {
                        Some(escaped) => self.out.push(escaped),
                        None => {
                            return Err(TranslateError::at_line(
                                start,
                                "unterminated string literal",
                            ));
                        }
                    }
                }
                Some(c) if c == quote => {
                    self.out.push(c);
                    return Ok(());
                }
                Some(c) => self.out.push(c),
            }
        }
    }

    fn block_comment(&mut self) -> Result<(), TranslateError> {
        let start = self.line;
        self.pos += 2;
        let mut body = String::new();
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some('*'), Some('/')) => {
                    self.pos += 2;
                    break;
                }
                (Some(_), _) => {
                    if let Some(c) = self.bump() {
                        body.push(c);
                    }
                }
                (None, _) => {
                    return Err(TranslateError::at_line(start, "unterminated block comment"));
                }
            }
        }

        let mut level = String::new();
        while body.contains(&format!("]{}]", level)) {
            level.push('=');
        }
        self.out.push_str(&format!("--[{level}[{body}]{level}]"));
        Ok(())
    }

    /// Native Lua comments are copied untouched so their contents are not
    /// rewritten.
    fn lua_comment(&mut self) -> Result<(), TranslateError> {
        let start = self.line;
        self.pos += 2;
        self.out.push_str("--");

        if let Some(level) = self.long_bracket_level() {
            return self.long_body(level, start, "unterminated block comment");
        }

        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.bump();
            self.out.push(c);
        }
        Ok(())
    }

    /// `[[ ... ]]` and `[==[ ... ]==]` strings are copied verbatim.
    fn long_string(&mut self) -> Result<(), TranslateError> {
        let start = self.line;
        match self.long_bracket_level() {
            Some(level) => self.long_body(level, start, "unterminated long string"),
            None => {
                self.bump();
                self.out.push('[');
                Ok(())
            }
        }
    }

    /// Copy up to and including the `]=*]` closing a long bracket of `level`.
    fn long_body(
        &mut self,
        level: usize,
        start: u32,
        unterminated: &str,
    ) -> Result<(), TranslateError> {
        let close: Vec<char> = format!("]{}]", "=".repeat(level)).chars().collect();
        loop {
            if self.chars[self.pos..].starts_with(&close) {
                self.out.extend(close.iter());
                self.pos += close.len();
                return Ok(());
            }
            match self.bump() {
                Some(c) => self.out.push(c),
                None => return Err(TranslateError::at_line(start, unterminated)),
            }
        }
    }

    /// Consume `[`, `=`*, `[` if present and return the level.
    fn long_bracket_level(&mut self) -> Option<usize> {
        if self.peek(0) != Some('[') {
            return None;
        }
        let mut level = 0;
        while self.peek(1 + level) == Some('=') {
            level += 1;
        }
        if self.peek(1 + level) != Some('[') {
            return None;
        }
        for _ in 0..level + 2 {
            if let Some(c) = self.bump() {
                self.out.push(c);
            }
        }
        Some(level)
    }
}
