//! Tokens (§3.6, §4.3).

use std::fmt;
use std::rc::Rc;

use crate::number::Number;

/// The lexical category of a [`Token`].
///
/// Keywords, builtin type names, literals, operators and grouping
/// punctuation are all represented as distinct kinds rather than as bare
/// strings, matching the spec's "kind code" wording (§3.6). `Null` is used
/// by the parser to mean "reuse the previous token" when reporting an
/// error that has no token of its own (§7).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TokenKind {
    // Literals
    Number,
    String,
    Identifier,
    Boolean,
    Nil,

    // Keywords
    If,
    Else,
    Elif,
    While,
    For,
    Do,
    Then,
    In,
    Of,
    Def,
    Return,
    Refer,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Switch,
    Case,
    New,
    Struct,
    Static,
    Virtual,
    Load,
    Extern,
    Ref,
    Const,
    Var,
    Where,
    Each,
    Delete,
    Lambda,

    /// `len(x)` (§4.5 `Length`).
    Len,
    /// `alloc(n)` (§4.5 `Alloc`).
    Alloc,
    /// `codes(s)` (§4.5 `CharN`).
    Codes,
    /// `chars(v)` (§4.5 `CharS`).
    Chars,
    /// `parse(s)` (§4.5 `Parse`).
    ParseKw,

    // Builtin type names, also usable as Type values.
    TypeNumber,
    TypeString,
    TypeBoolean,
    TypeArray,
    TypeDictionary,
    TypeObject,
    TypeFunction,
    TypeType,
    TypePointer,
    TypeNil,
    TypeAny,

    // Operators (binary/unary, see the precedence table in §4.3)
    Operator(String),

    // Grouping / punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,
    At,
    Question,
    Arrow,
    Pipe,

    Eof,
    /// "use the previous token" marker for parse errors (§7).
    Null,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Operator(op) => write!(f, "operator `{op}`"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A single lexed token (§3.6).
///
/// `line_text` is the full source line the token was found on, with
/// leading whitespace trimmed and `column` adjusted to match (§4.3) — this
/// is purely for error rendering and carries no semantic weight.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Token {
    pub filename: Rc<str>,
    pub line_text: Rc<str>,
    pub line: usize,
    pub column: usize,
    pub literal: String,
    pub number: Option<Number>,
    pub kind: TokenKind,
}

impl Token {
    #[must_use]
    pub fn new(
        filename: Rc<str>,
        line_text: Rc<str>,
        line: usize,
        column: usize,
        literal: impl Into<String>,
        kind: TokenKind,
    ) -> Self {
        Token { filename, line_text, line, column, literal: literal.into(), number: None, kind }
    }

    #[must_use]
    pub fn with_number(mut self, n: Number) -> Self {
        self.number = Some(n);
        self
    }

    /// A synthetic EOF token, used as the tail sentinel by the lexer and
    /// as a placeholder token by folded constant nodes.
    #[must_use]
    pub fn eof(filename: Rc<str>) -> Self {
        Token::new(filename, Rc::from(""), 0, 0, "", TokenKind::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}
