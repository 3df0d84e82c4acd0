//! The lexer: source text → `Vec<Token>` (§4.3).
//!
//! Tokenization here is at the token level, not at the byte-for-byte
//! escape-handling level (out of scope per §1) — the standard escape set
//! is implemented, but edge cases of exotic encodings are not a concern.

use std::rc::Rc;

use crate::error::RResult;
use crate::intern::hash;
use crate::number::Number;
use crate::token::{Token, TokenKind};

/// Multi-character operators, longest first so the scanner prefers the
/// longest match (mirrors the precedence table of §4.3).
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&&=", "||=", "===", "!==",
    "->", "**", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "++", "<>", "..", "|>",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", ":=",
    "+", "-", "*", "/", "%", "<", ">", "&", "|", "^", "!", "~", "=", "$",
];

fn keyword_kind(word: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match word {
        "if" => If,
        "else" => Else,
        "elif" => Elif,
        "while" => While,
        "for" => For,
        "do" => Do,
        "then" => Then,
        "in" => In,
        "of" => Of,
        "def" => Def,
        "return" => Return,
        "refer" => Refer,
        "break" => Break,
        "continue" => Continue,
        "throw" => Throw,
        "try" => Try,
        "catch" => Catch,
        "switch" => Switch,
        "case" => Case,
        "new" => New,
        "struct" => Struct,
        "static" => Static,
        "virtual" => Virtual,
        "load" => Load,
        "extern" => Extern,
        "ref" => Ref,
        "const" => Const,
        "var" => Var,
        "where" => Where,
        "each" => Each,
        "delete" => Delete,
        "lambda" => Lambda,
        "len" => Len,
        "alloc" => Alloc,
        "codes" => Codes,
        "chars" => Chars,
        "parse" => ParseKw,
        "true" => Boolean,
        "false" => Boolean,
        "nil" => Nil,
        "Number" => TypeNumber,
        "String" => TypeString,
        "Boolean" => TypeBoolean,
        "Array" => TypeArray,
        "Dictionary" => TypeDictionary,
        "Object" => TypeObject,
        "Function" => TypeFunction,
        "Type" => TypeType,
        "Pointer" => TypePointer,
        "Nil" => TypeNil,
        "Any" => TypeAny,
        _ => return None,
    })
}

pub struct Lexer<'a> {
    filename: Rc<str>,
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(filename: &str, source: &'a str) -> Self {
        Lexer { filename: Rc::from(filename), source, bytes: source.as_bytes(), pos: 0, line: 1, line_start: 0 }
    }

    pub fn lex(mut self) -> RResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.pos >= self.bytes.len() {
                tokens.push(self.make_token(self.pos, TokenKind::Eof, String::new()));
                break;
            }
            tokens.push(self.next_token()?);
        }
        Ok(tokens)
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.pos < self.bytes.len() {
                let c = self.bytes[self.pos];
                if c == b'\n' {
                    self.pos += 1;
                    self.line += 1;
                    self.line_start = self.pos;
                } else if c.is_ascii_whitespace() {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if self.pos < self.bytes.len() && self.bytes[self.pos] == b'#' {
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn current_line_text(&self) -> Rc<str> {
        let end = self.source[self.line_start..]
            .find('\n')
            .map_or(self.source.len(), |i| self.line_start + i);
        let raw = &self.source[self.line_start..end];
        Rc::from(raw.trim_start())
    }

    fn column(&self, start: usize) -> usize {
        let raw_line = &self.source[self.line_start..];
        let trimmed_len = raw_line.len() - raw_line.trim_start().len();
        (start - self.line_start).saturating_sub(trimmed_len) + 1
    }

    fn make_token(&self, start: usize, kind: TokenKind, literal: String) -> Token {
        Token::new(self.filename.clone(), self.current_line_text(), self.line, self.column(start), literal, kind)
    }

    fn error(&self, start: usize, message: impl Into<String>) -> crate::error::RuntimeError {
        crate::error::RuntimeError::new(message, self.make_token(start, TokenKind::Null, String::new()))
    }

    fn next_token(&mut self) -> RResult<Token> {
        let start = self.pos;
        let c = self.bytes[start];

        if c == b'`' {
            return self.lex_backtick_identifier(start);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return Ok(self.lex_identifier(start));
        }
        if c.is_ascii_digit() {
            return self.lex_number(start);
        }
        if c == b'"' {
            return self.lex_string(start);
        }
        if c == b'\'' {
            return self.lex_char(start);
        }
        if let Some(kind) = self.match_punct(c) {
            self.pos += 1;
            return Ok(self.make_token(start, kind, (c as char).to_string()));
        }
        self.lex_operator(start)
    }

    fn match_punct(&self, c: u8) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match c {
            b'(' => LParen,
            b')' => RParen,
            b'{' => LBrace,
            b'}' => RBrace,
            b'[' => LBracket,
            b']' => RBracket,
            b';' => Semicolon,
            b',' => Comma,
            b':' => Colon,
            b'.' if !self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) => Dot,
            b'@' => At,
            b'?' => Question,
            _ => return None,
        })
    }

    fn lex_identifier(&mut self, start: usize) -> Token {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word = &self.source[start..self.pos];
        if let Some(kind) = keyword_kind(word) {
            return self.make_token(start, kind, word.to_string());
        }
        let _ = hash(word);
        self.make_token(start, TokenKind::Identifier, word.to_string())
    }

    /// Backtick identifiers allow arbitrary non-backtick characters (§4.3).
    fn lex_backtick_identifier(&mut self, start: usize) -> RResult<Token> {
        self.pos += 1;
        let inner_start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'`' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(self.error(start, "unterminated backtick identifier"));
        }
        let word = self.source[inner_start..self.pos].to_string();
        self.pos += 1;
        let _ = hash(&word);
        Ok(self.make_token(start, TokenKind::Identifier, word))
    }

    fn lex_number(&mut self, start: usize) -> RResult<Token> {
        if self.bytes[start] == b'0' && self.pos + 1 < self.bytes.len() {
            let next = self.bytes[self.pos + 1];
            if next == b'b' || next == b'B' {
                self.pos += 2;
                let digits_start = self.pos;
                while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b'0' | b'1') {
                    self.pos += 1;
                }
                let text = &self.source[digits_start..self.pos];
                let value = i64::from_str_radix(text, 2)
                    .map_err(|_| self.error(start, "malformed binary literal"))?;
                return Ok(self.make_token(start, TokenKind::Number, self.source[start..self.pos].to_string())
                    .with_number(Number::Integer(value)));
            }
            if next == b'x' || next == b'X' {
                self.pos += 2;
                let digits_start = self.pos;
                while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_hexdigit() {
                    self.pos += 1;
                }
                let text = &self.source[digits_start..self.pos];
                let value = i64::from_str_radix(text, 16)
                    .map_err(|_| self.error(start, "malformed hex literal"))?;
                return Ok(self.make_token(start, TokenKind::Number, self.source[start..self.pos].to_string())
                    .with_number(Number::Integer(value)));
            }
        }

        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let mut is_double = false;
        if self.pos < self.bytes.len()
            && self.bytes[self.pos] == b'.'
            && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
        {
            is_double = true;
            self.pos += 1;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        if self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b'e' | b'E') {
            is_double = true;
            self.pos += 1;
            if self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b'+' | b'-') {
                self.pos += 1;
            }
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        let text = &self.source[start..self.pos];
        let number = if is_double {
            Number::Double(text.parse().map_err(|_| self.error(start, "malformed number literal"))?)
        } else {
            Number::Integer(text.parse().map_err(|_| self.error(start, "malformed number literal"))?)
        };
        Ok(self.make_token(start, TokenKind::Number, text.to_string()).with_number(number))
    }

    fn lex_char(&mut self, start: usize) -> RResult<Token> {
        self.pos += 1;
        if self.pos >= self.bytes.len() {
            return Err(self.error(start, "unterminated character literal"));
        }
        let (value, consumed) = if self.bytes[self.pos] == b'\\' {
            self.read_escape(self.pos)?
        } else {
            (self.bytes[self.pos] as i64, 1)
        };
        self.pos += consumed;
        if self.pos >= self.bytes.len() || self.bytes[self.pos] != b'\'' {
            return Err(self.error(start, "unterminated character literal"));
        }
        self.pos += 1;
        Ok(self
            .make_token(start, TokenKind::Number, self.source[start..self.pos].to_string())
            .with_number(Number::Integer(value)))
    }

    fn lex_string(&mut self, start: usize) -> RResult<Token> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            if self.pos >= self.bytes.len() {
                return Err(self.error(start, "unterminated string literal"));
            }
            let c = self.bytes[self.pos];
            if c == b'"' {
                self.pos += 1;
                break;
            }
            if c == b'\n' {
                return Err(self.error(start, "unterminated string literal"));
            }
            if c == b'\\' {
                let (value, consumed) = self.read_escape(self.pos)?;
                self.pos += consumed;
                if let Some(ch) = char::from_u32(value as u32) {
                    out.push(ch);
                }
                continue;
            }
            // Advance by full UTF-8 char, not just one byte.
            let ch_len = utf8_len(c);
            out.push_str(&self.source[self.pos..self.pos + ch_len]);
            self.pos += ch_len;
        }
        Ok(self.make_token(start, TokenKind::String, out))
    }

    /// Reads one `\…` escape starting at `pos` (which must point at the
    /// backslash). Returns the decoded code point and the number of bytes
    /// consumed *from* `pos` (including the backslash).
    fn read_escape(&self, pos: usize) -> RResult<(i64, usize)> {
        let next = *self.bytes.get(pos + 1).ok_or_else(|| self.error(pos, "unterminated escape sequence"))?;
        Ok(match next {
            b'n' => (b'\n' as i64, 2),
            b't' => (b'\t' as i64, 2),
            b'r' => (b'\r' as i64, 2),
            b'0' => (0, 2),
            b'\\' => (b'\\' as i64, 2),
            b'"' => (b'"' as i64, 2),
            b'\'' => (b'\'' as i64, 2),
            b'x' => {
                let hex = self
                    .source
                    .get(pos + 2..pos + 4)
                    .ok_or_else(|| self.error(pos, "malformed \\x escape"))?;
                let value =
                    i64::from_str_radix(hex, 16).map_err(|_| self.error(pos, "malformed \\x escape"))?;
                (value, 4)
            }
            b'u' => {
                let hex = self
                    .source
                    .get(pos + 2..pos + 6)
                    .ok_or_else(|| self.error(pos, "malformed \\u escape"))?;
                let value =
                    i64::from_str_radix(hex, 16).map_err(|_| self.error(pos, "malformed \\u escape"))?;
                (value, 6)
            }
            other => (other as i64, 2),
        })
    }

    fn lex_operator(&mut self, start: usize) -> RResult<Token> {
        let remaining = &self.source[start..];
        for op in OPERATORS {
            if remaining.starts_with(op) {
                self.pos += op.len();
                let kind = punct_like_kind(op).unwrap_or_else(|| TokenKind::Operator((*op).to_string()));
                return Ok(self.make_token(start, kind, (*op).to_string()));
            }
        }
        Err(self.error(start, format!("unexpected character `{}`", self.bytes[start] as char)))
    }
}

/// A few operator spellings double as dedicated punctuation kinds the
/// parser matches on directly rather than as generic `Operator` tokens.
fn punct_like_kind(op: &str) -> Option<TokenKind> {
    match op {
        "->" => Some(TokenKind::Arrow),
        "|>" => Some(TokenKind::Pipe),
        _ => None,
    }
}

fn utf8_len(byte: u8) -> usize {
    if byte & 0x80 == 0 {
        1
    } else if byte & 0xE0 == 0xC0 {
        2
    } else if byte & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new("test", src).lex().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_fib_def() {
        let ks = kinds("def fib(0) -> 0;");
        assert_eq!(
            ks,
            vec![
                TokenKind::Def,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::Number,
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn hex_and_binary_literals() {
        let toks = Lexer::new("t", "0xFF; 0b101;").lex().unwrap();
        assert_eq!(toks[0].number, Some(Number::Integer(255)));
        assert_eq!(toks[2].number, Some(Number::Integer(5)));
    }

    #[test]
    fn string_escapes() {
        let toks = Lexer::new("t", r#""a\nb""#).lex().unwrap();
        assert_eq!(toks[0].literal, "a\nb");
    }

    #[test]
    fn char_literal_is_a_number() {
        let toks = Lexer::new("t", "'a';").lex().unwrap();
        assert_eq!(toks[0].number, Some(Number::Integer(b'a' as i64)));
    }

    #[test]
    fn line_comment_is_skipped() {
        let ks = kinds("1 # comment\n2");
        assert_eq!(ks, vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]);
    }

    #[test]
    fn backtick_identifier_allows_arbitrary_characters() {
        let toks = Lexer::new("t", "`hello world!`").lex().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Identifier);
        assert_eq!(toks[0].literal, "hello world!");
    }
}
