//! # Tokenizer
//!
//! Converts document lines into the token stream consumed by the parser and
//! the formatter. Lines are scanned independently, character by character:
//!
//! - whitespace separates tokens and is never part of one,
//! - words are keywords (any case) or identifiers (case preserved),
//! - numbers follow `-?\d+(\.\d*)?([eE]-?\d+)?`,
//! - operators match longest-first, and `[` switches to bracketed-identifier
//!   mode where everything up to a terminator character is one identifier,
//! - `'` and `"` open strings with doubled-quote escapes,
//! - `@name` is a macro variable.
//!
//! Lexical errors become [`TokenKind::UnexpectedToken`] or
//! [`TokenKind::NonterminatingString`] tokens; tokenizing never fails. The
//! stream always ends with exactly one [`TokenKind::Eof`].

use crate::token::{OPERATORS, Token, TokenKind};
use crate::{Position, Span};
use serde::{Deserialize, Serialize};
use smartstring::alias::String;

/// Characters that end a bracketed identifier.
///
/// This is the editor's punctuation exclusion set without `.`, so reference
/// names such as `[System.Title]` stay a single identifier.
pub const DEFAULT_BRACKET_TERMINATORS: &str = ",;'`:~\\/*|?\"&%$!+=()[]{}<>-";

/// Tokenizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Characters that end a bracketed identifier.
    pub bracket_terminators: std::string::String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            bracket_terminators: DEFAULT_BRACKET_TERMINATORS.to_owned(),
        }
    }
}

impl TokenizerConfig {
    /// The editor's original exclusion set, which also stops at `.`.
    pub fn editor() -> Self {
        Self {
            bracket_terminators: format!(".{DEFAULT_BRACKET_TERMINATORS}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    terminators: Vec<char>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

fn is_word_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'
}

fn is_space(ch: char) -> bool {
    matches!(ch, ' ' | '\r' | '\t' | '\n')
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect::<std::string::String>().into()
}

fn scan_while(chars: &[char], start: usize, pred: impl Fn(char) -> bool) -> usize {
    chars[start..]
        .iter()
        .position(|&c| !pred(c))
        .map_or(chars.len(), |n| start + n)
}

/// End of the number starting at `start`, or `None` for a bare `-`.
fn scan_number(chars: &[char], start: usize) -> Option<usize> {
    let digit = |c: char| c.is_ascii_digit();
    let mut i = start;
    if chars[i] == '-' {
        i += 1;
    }
    let int_end = scan_while(chars, i, digit);
    if int_end == i {
        return None;
    }
    i = int_end;
    if chars.get(i) == Some(&'.') {
        i = scan_while(chars, i + 1, digit);
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut k = i + 1;
        if chars.get(k) == Some(&'-') {
            k += 1;
        }
        let exp_end = scan_while(chars, k, digit);
        if exp_end > k {
            i = exp_end;
        }
    }
    Some(i)
}

/// End of the string opened at `start` and whether it was closed.
fn scan_string(chars: &[char], start: usize) -> (usize, bool) {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return (i + 1, true);
        }
        i += 1;
    }
    (chars.len(), false)
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            terminators: config.bracket_terminators.chars().collect(),
        }
    }

    /// Tokenizes a document given as lines (0-indexed).
    pub fn tokenize<S: AsRef<str>>(&self, lines: &[S]) -> Vec<Token> {
        let mut out = Vec::new();
        for (line_no, line) in lines.iter().enumerate() {
            self.tokenize_line(line_no, line.as_ref(), &mut out);
        }
        let eof = out
            .last()
            .map_or(Span::default(), |t: &Token| Span::at(t.span.end));
        out.push(Token::eof(eof));
        log::trace!("tokenized {} lines into {} tokens", lines.len(), out.len());
        out
    }

    fn tokenize_line(&self, line_no: usize, line: &str, out: &mut Vec<Token>) {
        let chars: Vec<char> = line.chars().collect();
        let span = |a: usize, b: usize| Span::new(Position::new(line_no, a), Position::new(line_no, b));
        let mut j = 0;
        while j < chars.len() {
            let ch = chars[j];
            if is_space(ch) {
                j += 1;
            } else if is_word_start(ch) {
                let end = scan_while(&chars, j, is_word_char);
                let word = collect(&chars[j..end]);
                let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Identifier);
                out.push(Token::new(kind, span(j, end), word));
                j = end;
            } else if ch == '-' || ch.is_ascii_digit() {
                match scan_number(&chars, j) {
                    Some(end) => {
                        out.push(Token::new(TokenKind::Number, span(j, end), collect(&chars[j..end])));
                        j = end;
                    }
                    None => {
                        out.push(Token::new(TokenKind::UnexpectedToken, span(j, j + 1), collect(&chars[j..j + 1])));
                        j += 1;
                    }
                }
            } else if ch == '\'' || ch == '"' {
                let (end, closed) = scan_string(&chars, j);
                let kind = if closed {
                    TokenKind::String
                } else {
                    TokenKind::NonterminatingString
                };
                out.push(Token::new(kind, span(j, end), collect(&chars[j..end])));
                j = end;
            } else if ch == '@' && chars.get(j + 1).is_some_and(|&c| is_word_start(c)) {
                let end = scan_while(&chars, j + 1, is_word_char);
                out.push(Token::new(TokenKind::Variable, span(j, end), collect(&chars[j..end])));
                j = end;
            } else if let Some((text, kind)) = self.operator_at(&chars, j) {
                let end = j + text.chars().count();
                out.push(Token::new(kind, span(j, end), text));
                j = end;
                if kind == TokenKind::LSqBracket {
                    j = self.bracketed_identifier(&chars, j, line_no, out);
                }
            } else {
                out.push(Token::new(TokenKind::UnexpectedToken, span(j, j + 1), collect(&chars[j..j + 1])));
                j += 1;
            }
        }
    }

    fn operator_at(&self, chars: &[char], j: usize) -> Option<(&'static str, TokenKind)> {
        OPERATORS.iter().copied().find(|(text, _)| {
            text.chars()
                .enumerate()
                .all(|(k, c)| chars.get(j + k) == Some(&c))
        })
    }

    /// Consumes the text after `[` up to a terminator and pushes it as one
    /// identifier (trimmed). Returns the index of the terminator.
    fn bracketed_identifier(&self, chars: &[char], start: usize, line_no: usize, out: &mut Vec<Token>) -> usize {
        let end = scan_while(chars, start, |c| !self.terminators.contains(&c));
        let first = scan_while(chars, start, is_space).min(end);
        let mut last = end;
        while last > first && is_space(chars[last - 1]) {
            last -= 1;
        }
        if last > first {
            out.push(Token::new(
                TokenKind::Identifier,
                Span::new(Position::new(line_no, first), Position::new(line_no, last)),
                collect(&chars[first..last]),
            ));
        }
        end
    }
}

/// Tokenizes with the default configuration.
pub fn tokenize<S: AsRef<str>>(lines: &[S]) -> Vec<Token> {
    Tokenizer::default().tokenize(lines)
}

/// Splits document text into lines the way editors number them: a trailing
/// line break starts a final empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}
