//! A small Lua lexer
//!
//! Only produces what `require` discovery needs: names, decoded string
//! literals, and the punctuation that decides whether a name is a call target.
//! Comments, whitespace, and numbers are consumed without interpretation.

use std::fmt;

/// Position of a token in its source file. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    /// `.`
    Dot,
    /// `..`
    Concat,
    /// `...`
    Ellipsis,
    /// `:`
    Colon,
    /// `::`
    DoubleColon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    /// Any operator that does not affect call detection
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword
    Name(String),
    /// String literal, quoted or long-bracket, with escapes decoded
    String(String),
    Number,
    Punct(Punct),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

impl Token {
    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Name(n) if n == name)
    }

    pub fn is_punct(&self, punct: Punct) -> bool {
        self.kind == TokenKind::Punct(punct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub location: SourceLocation,
    pub message: String,
}

impl LexError {
    fn new(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.location)
    }
}

impl std::error::Error for LexError {}

/// Tokenize a whole Lua chunk
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[derive(Debug)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            input: source.chars().collect(),
            position: 0,
            line: 1,
            column: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        self.skip_shebang();

        while let Some(ch) = self.current_char() {
            let location = self.location();
            if ch.is_whitespace() {
                self.advance();
                continue;
            }

            let kind = match ch {
                '-' if self.peek_char() == Some('-') => {
                    self.skip_comment()?;
                    continue;
                }
                '"' | '\'' => TokenKind::String(self.read_quoted_string(ch)?),
                '[' if matches!(self.peek_char(), Some('[' | '=')) => {
                    match self.long_bracket_level() {
                        Some(level) => TokenKind::String(self.read_long_bracket(level)?),
                        None => {
                            self.advance();
                            TokenKind::Punct(Punct::LBracket)
                        }
                    }
                }
                c if c.is_ascii_digit() => {
                    self.read_number();
                    TokenKind::Number
                }
                '.' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => {
                    self.read_number();
                    TokenKind::Number
                }
                c if c == '_' || c.is_alphabetic() => TokenKind::Name(self.read_name()),
                _ => TokenKind::Punct(self.read_punct()),
            };

            tokens.push(Token { kind, location });
        }

        log::trace!("Tokenized {} tokens", tokens.len());
        Ok(tokens)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Lua ignores a first line starting with `#`
    fn skip_shebang(&mut self) {
        if self.current_char() == Some('#') {
            while let Some(ch) = self.current_char() {
                if ch == '\n' {
                    break;
                }
                self.advance();
            }
        }
    }

    fn skip_comment(&mut self) -> Result<(), LexError> {
        self.advance(); // -
        self.advance(); // -

        if self.current_char() == Some('[')
            && let Some(level) = self.long_bracket_level()
        {
            self.read_long_bracket(level)?;
            return Ok(());
        }

        while let Some(ch) = self.current_char() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        Ok(())
    }

    /// If the cursor sits on `[`, `[=`, `[==`... followed by `[`, return the
    /// number of `=` signs without consuming anything
    fn long_bracket_level(&self) -> Option<usize> {
        if self.current_char() != Some('[') {
            return None;
        }
        let mut offset = 1;
        while self.input.get(self.position + offset) == Some(&'=') {
            offset += 1;
        }
        (self.input.get(self.position + offset) == Some(&'[')).then_some(offset - 1)
    }

    fn read_long_bracket(&mut self, level: usize) -> Result<String, LexError> {
        let start = self.location();
        for _ in 0..level + 2 {
            self.advance();
        }
        // A newline right after the opening bracket is not part of the string
        if self.current_char() == Some('\r') {
            self.advance();
        }
        if self.current_char() == Some('\n') {
            self.advance();
        }

        let mut content = String::new();
        while let Some(ch) = self.current_char() {
            if ch == ']' && self.closes_long_bracket(level) {
                for _ in 0..level + 2 {
                    self.advance();
                }
                return Ok(content);
            }
            content.push(ch);
            self.advance();
        }
        Err(LexError::new(start, "unfinished long string or comment"))
    }

    fn closes_long_bracket(&self, level: usize) -> bool {
        (1..=level).all(|i| self.input.get(self.position + i) == Some(&'='))
            && self.input.get(self.position + level + 1) == Some(&']')
    }

    fn read_quoted_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.location();
        self.advance(); // opening quote

        let mut string = String::new();
        loop {
            match self.current_char() {
                None | Some('\n') => {
                    return Err(LexError::new(start, "unfinished string"));
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(string);
                }
                Some('\\') => {
                    self.advance();
                    self.read_escape(&mut string)?;
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_escape(&mut self, string: &mut String) -> Result<(), LexError> {
        let location = self.location();
        let Some(escaped) = self.advance() else {
            return Err(LexError::new(location, "unfinished string"));
        };

        match escaped {
            'a' => string.push('\u{7}'),
            'b' => string.push('\u{8}'),
            'f' => string.push('\u{c}'),
            'n' | '\n' => string.push('\n'),
            'r' => string.push('\r'),
            't' => string.push('\t'),
            'v' => string.push('\u{b}'),
            '\\' | '"' | '\'' => string.push(escaped),
            'z' => {
                while self.current_char().is_some_and(char::is_whitespace) {
                    self.advance();
                }
            }
            'x' => {
                let value = self.read_digits(16, 2, 2, location)?;
                string.push(char::from(value as u8));
            }
            'u' => {
                if self.advance() != Some('{') {
                    return Err(LexError::new(location, "missing '{' in \\u{xxxx}"));
                }
                let value = self.read_digits(16, 1, 8, location)?;
                if self.advance() != Some('}') {
                    return Err(LexError::new(location, "missing '}' in \\u{xxxx}"));
                }
                let ch = char::from_u32(value)
                    .ok_or_else(|| LexError::new(location, "UTF-8 value too large"))?;
                string.push(ch);
            }
            d if d.is_ascii_digit() => {
                let mut value = d.to_digit(10).unwrap_or_default();
                for _ in 0..2 {
                    match self.current_char().and_then(|c| c.to_digit(10)) {
                        Some(digit) => {
                            value = value * 10 + digit;
                            self.advance();
                        }
                        None => break,
                    }
                }
                if value > 255 {
                    return Err(LexError::new(location, "decimal escape too large"));
                }
                string.push(char::from(value as u8));
            }
            _ => return Err(LexError::new(location, "invalid escape sequence")),
        }
        Ok(())
    }

    fn read_digits(
        &mut self,
        radix: u32,
        min: usize,
        max: usize,
        location: SourceLocation,
    ) -> Result<u32, LexError> {
        let mut value: u32 = 0;
        let mut count = 0;
        while count < max {
            let Some(digit) = self.current_char().and_then(|c| c.to_digit(radix)) else {
                break;
            };
            value = value
                .checked_mul(radix)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| LexError::new(location, "escape value too large"))?;
            self.advance();
            count += 1;
        }
        if count < min {
            return Err(LexError::new(location, "hexadecimal digit expected"));
        }
        Ok(value)
    }

    fn read_number(&mut self) {
        while let Some(ch) = self.current_char() {
            if matches!(ch, 'e' | 'E' | 'p' | 'P') && matches!(self.peek_char(), Some('+' | '-')) {
                self.advance();
                self.advance();
            } else if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.current_char() {
            if ch == '_' || ch.is_alphanumeric() {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn read_punct(&mut self) -> Punct {
        let Some(ch) = self.advance() else {
            return Punct::Operator;
        };
        match ch {
            '.' => {
                if self.current_char() != Some('.') {
                    return Punct::Dot;
                }
                self.advance();
                if self.current_char() == Some('.') {
                    self.advance();
                    Punct::Ellipsis
                } else {
                    Punct::Concat
                }
            }
            ':' => {
                if self.current_char() == Some(':') {
                    self.advance();
                    Punct::DoubleColon
                } else {
                    Punct::Colon
                }
            }
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '{' => Punct::LBrace,
            '}' => Punct::RBrace,
            '[' => Punct::LBracket,
            ']' => Punct::RBracket,
            ',' => Punct::Comma,
            ';' => Punct::Semicolon,
            _ => Punct::Operator,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("source should tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_names_strings_and_calls() {
        assert_eq!(
            kinds(r#"local x = require("a.b")"#),
            vec![
                TokenKind::Name("local".to_string()),
                TokenKind::Name("x".to_string()),
                TokenKind::Punct(Punct::Operator),
                TokenKind::Name("require".to_string()),
                TokenKind::Punct(Punct::LParen),
                TokenKind::String("a.b".to_string()),
                TokenKind::Punct(Punct::RParen),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let source = "-- require('a')\n--[[ require('b')\n]] --[==[ ]] ]==] x";
        assert_eq!(kinds(source), vec![TokenKind::Name("x".to_string())]);
    }

    #[test]
    fn test_long_strings() {
        assert_eq!(
            kinds("[[\nhello]] [==[a]]b]==]"),
            vec![
                TokenKind::String("hello".to_string()),
                TokenKind::String("a]]b".to_string()),
            ]
        );
    }

    #[test]
    fn test_index_bracket_is_not_long_string() {
        assert_eq!(
            kinds("t[1]"),
            vec![
                TokenKind::Name("t".to_string()),
                TokenKind::Punct(Punct::LBracket),
                TokenKind::Number,
                TokenKind::Punct(Punct::RBracket),
            ]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            kinds(r#""a\tb\65\x42\u{43}\"""#),
            vec![TokenKind::String("a\tbABC\"".to_string())]
        );
        assert_eq!(
            kinds("'x\\z\n    y'"),
            vec![TokenKind::String("xy".to_string())]
        );
    }

    #[test]
    fn test_dots() {
        assert_eq!(
            kinds("a.b .. c ..."),
            vec![
                TokenKind::Name("a".to_string()),
                TokenKind::Punct(Punct::Dot),
                TokenKind::Name("b".to_string()),
                TokenKind::Punct(Punct::Concat),
                TokenKind::Name("c".to_string()),
                TokenKind::Punct(Punct::Ellipsis),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1e-3 0x1p+4 .5 3.0"),
            vec![TokenKind::Number; 4]
        );
    }

    #[test]
    fn test_locations() {
        let tokens = tokenize("local a\n  require 'x'").expect("tokenize");
        assert_eq!(tokens[2].location, SourceLocation::new(2, 2));
        assert_eq!(tokens[3].location, SourceLocation::new(2, 10));
    }

    #[test]
    fn test_shebang_is_ignored() {
        assert_eq!(
            kinds("#!/usr/bin/env lua\nx"),
            vec![TokenKind::Name("x".to_string())]
        );
    }

    #[test]
    fn test_unfinished_string() {
        let err = tokenize("local s = 'abc\nx").expect_err("should fail");
        assert_eq!(err.location, SourceLocation::new(1, 10));
        assert_eq!(err.message, "unfinished string");
    }

    #[test]
    fn test_unfinished_long_comment() {
        let err = tokenize("x --[[ never closed").expect_err("should fail");
        assert_eq!(err.location, SourceLocation::new(1, 4));
    }
}
