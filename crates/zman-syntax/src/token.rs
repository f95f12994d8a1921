//! Token definitions for the formula language.
//!
//! A token carries its kind, the literal text it was built from and the
//! position of its first character. Identifier-like words are classified by
//! the tables in [`crate::vocab`], so `sunrise` arrives at the parser as a
//! [`TokenKind::Primitive`] and `gra` as a [`TokenKind::Base`].
//!
//! ```rust
//! use zman_syntax::{Position, Token, TokenKind};
//!
//! let tok = Token::new(TokenKind::Duration, "1h 30min", Position::new(1, 11));
//! assert_eq!(tok.literal, "1h 30min");
//! assert_eq!(tok.pos.column, 11);
//! ```

use std::fmt;

/// A 1-based line/column location in formula text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // === Special ===
    /// End of input.
    Eof,
    /// A character (or malformed literal) the lexer does not understand.
    Illegal,

    // === Words ===
    /// A word that matched no vocabulary table.
    Ident,
    /// `sunrise`, `civil_dawn`, ...
    Primitive,
    /// `solar`, `proportional_hours`, `shaos`, `midpoint`
    Function,
    If,
    Else,
    /// `before_sunrise`, `after_sunset`, `before_noon`, `after_noon`
    Direction,
    /// `gra`, `mga`, `mga_90`, `mga_120`, `custom`
    Base,
    /// `latitude`, `longitude`, `elevation`, `day_length`, `month`, `season`
    ConditionVar,

    // === Literals ===
    Number,
    /// `72min`, `1hr`, `2h`, `1h 30min`; the literal keeps the full text.
    Duration,
    String,
    /// `@key`; the literal is the key without the `@`.
    Reference,

    // === Punctuation ===
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,

    // === Operators ===
    Plus,
    Minus,
    Star,
    Slash,
    Greater,
    Less,
    GreaterEq,
    LessEq,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
}

impl TokenKind {
    /// Short description used in "expected ..., found ..." messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Eof => "end of formula",
            TokenKind::Illegal => "illegal character",
            TokenKind::Ident => "identifier",
            TokenKind::Primitive => "primitive",
            TokenKind::Function => "function name",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::Direction => "direction",
            TokenKind::Base => "base",
            TokenKind::ConditionVar => "condition variable",
            TokenKind::Number => "number",
            TokenKind::Duration => "duration",
            TokenKind::String => "string",
            TokenKind::Reference => "reference",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Greater => "'>'",
            TokenKind::Less => "'<'",
            TokenKind::GreaterEq => "'>='",
            TokenKind::LessEq => "'<='",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
        }
    }

    pub fn is_comparator(self) -> bool {
        matches!(
            self,
            TokenKind::Greater
                | TokenKind::Less
                | TokenKind::GreaterEq
                | TokenKind::LessEq
                | TokenKind::EqEq
                | TokenKind::NotEq
        )
    }
}

/// A token with its literal text and source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, pos: Position) -> Self {
        Self {
            kind,
            literal: literal.into(),
            pos,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => f.write_str("end of formula"),
            TokenKind::Reference => write!(f, "'@{}'", self.literal),
            TokenKind::String => write!(f, "\"{}\"", self.literal),
            _ => write!(f, "'{}'", self.literal),
        }
    }
}
