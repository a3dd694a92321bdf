//! # WIQL Tokens
//!
//! The lexical vocabulary shared by the tokenizer, the parser and the
//! formatter: [`TokenKind`] enumerates every class of lexical unit and
//! [`Token`] pairs a kind with its source [`Span`] and text.

use crate::Span;
use serde::Serialize;
use smartstring::alias::String;
use std::fmt;

/// Every class of lexical unit.
///
/// Keyword classes are matched case-insensitively. The last three variants
/// are error classes: they stay in the stream so later stages can report
/// them without stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // Keywords:
    Select,
    From,
    Where,
    Order,
    By,
    Asc,
    Desc,
    Asof,
    Not,
    Ever,
    In,
    Like,
    Under,
    WorkItems,
    WorkItemLinks,
    And,
    Or,
    Contains,
    Words,

    // Punctuation:
    LParen,
    RParen,
    LSqBracket,
    RSqBracket,
    Comma,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEq,
    LessOrEq,

    // Literals:
    Identifier,
    Number,
    String,
    /// A macro such as `@project` or `@today`.
    Variable,

    // Errors:
    UnexpectedToken,
    NonterminatingString,
    Eof,
}

/// Keywords with their canonical (upper-case) spelling.
pub const KEYWORDS: &[(TokenKind, &str)] = &[
    (TokenKind::Select, "SELECT"),
    (TokenKind::From, "FROM"),
    (TokenKind::Where, "WHERE"),
    (TokenKind::Order, "ORDER"),
    (TokenKind::By, "BY"),
    (TokenKind::Asc, "ASC"),
    (TokenKind::Desc, "DESC"),
    (TokenKind::Asof, "ASOF"),
    (TokenKind::Not, "NOT"),
    (TokenKind::Ever, "EVER"),
    (TokenKind::In, "IN"),
    (TokenKind::Like, "LIKE"),
    (TokenKind::Under, "UNDER"),
    (TokenKind::WorkItems, "WORKITEMS"),
    (TokenKind::WorkItemLinks, "WORKITEMLINKS"),
    (TokenKind::And, "AND"),
    (TokenKind::Or, "OR"),
    (TokenKind::Contains, "CONTAINS"),
    (TokenKind::Words, "WORDS"),
];

/// Operators in match order: two-character operators come first.
pub const OPERATORS: &[(&str, TokenKind)] = &[
    ("<>", TokenKind::NotEquals),
    ("<=", TokenKind::LessOrEq),
    (">=", TokenKind::GreaterOrEq),
    ("<", TokenKind::LessThan),
    (">", TokenKind::GreaterThan),
    ("=", TokenKind::Equals),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LSqBracket),
    ("]", TokenKind::RSqBracket),
    (",", TokenKind::Comma),
];

impl TokenKind {
    /// Keyword class of `word`, ignoring case.
    pub fn keyword(word: &str) -> Option<Self> {
        KEYWORDS
            .iter()
            .find_map(|&(kind, text)| text.eq_ignore_ascii_case(word).then_some(kind))
    }

    /// Canonical spelling of a keyword or punctuation kind.
    pub fn text(self) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .find_map(|&(kind, text)| (kind == self).then_some(text))
            .or_else(|| {
                OPERATORS
                    .iter()
                    .find_map(|&(text, kind)| (kind == self).then_some(text))
            })
    }

    pub fn is_keyword(self) -> bool {
        KEYWORDS.iter().any(|&(kind, _)| kind == self)
    }

    /// `UnexpectedToken` and `NonterminatingString`.
    pub fn is_lexical_error(self) -> bool {
        matches!(self, Self::UnexpectedToken | Self::NonterminatingString)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Some(text) => write!(f, "`{text}`"),
            None => f.write_str(match self {
                Self::Identifier => "identifier",
                Self::Number => "number",
                Self::String => "string",
                Self::Variable => "variable",
                Self::UnexpectedToken => "unexpected character",
                Self::NonterminatingString => "unterminated string",
                _ => "end of query",
            }),
        }
    }
}

/// A lexical unit with its position and source text.
///
/// `lexeme` holds the text exactly as written (quotes included for strings);
/// only the end-of-input token has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub lexeme: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            lexeme: Some(lexeme.into()),
        }
    }

    pub fn eof(span: Span) -> Self {
        Self {
            kind: TokenKind::Eof,
            span,
            lexeme: None,
        }
    }

    pub fn text(&self) -> &str {
        self.lexeme.as_deref().unwrap_or_default()
    }

    /// Value of a string literal: quotes removed, doubled quotes collapsed.
    ///
    /// An unterminated string keeps everything after its opening quote.
    pub fn string_value(&self) -> String {
        unquote(self.text())
    }
}

/// Strips the surrounding quotes of a string lexeme and collapses doubled
/// quote characters.
pub fn unquote(lexeme: &str) -> String {
    let mut chars = lexeme.chars();
    let Some(quote) = chars.next() else {
        return String::new();
    };
    let body = chars.as_str();
    let body = body.strip_suffix(quote).unwrap_or(body);
    let mut out = String::new();
    let mut pending_quote = false;
    for ch in body.chars() {
        if ch == quote && !pending_quote {
            pending_quote = true;
            out.push(ch);
        } else if ch == quote {
            pending_quote = false;
        } else {
            pending_quote = false;
            out.push(ch);
        }
    }
    out
}

/// Quotes `value` with single quotes, doubling embedded ones.
pub fn quote(value: &str) -> String {
    let mut out = String::from("'");
    for ch in value.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}
