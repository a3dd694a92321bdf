//! Diagnostics produced by the parser (lexical and syntax problems) and by
//! the [`ErrorChecker`](crate::ErrorChecker) (semantic problems).
//!
//! Every pass returns a complete replacement set; nothing is carried over from
//! a previous pass.

use crate::Span;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
        })
    }
}

/// Diagnostic kinds, grouped by the pass that reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DiagnosticKind {
    // Lexical, reported by the parser for error tokens
    UnexpectedCharacter,
    UnterminatedString,

    // Syntax
    UnexpectedToken,

    // Semantic
    UnknownField,
    InvalidOperator,
    LiteralMismatch,
    MissingClause,
    InvalidAsOf,

    /// The parse table and the tree builder disagree.
    Internal,
}

impl DiagnosticKind {
    /// Lexical problems are low severity: the parser keeps going and the
    /// syntax error they usually cause is reported separately.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::UnexpectedCharacter | Self::UnterminatedString => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::UnexpectedCharacter => "unexpected character",
            Self::UnterminatedString => "unterminated string literal",
            Self::UnexpectedToken => "unexpected token",
            Self::UnknownField => "unknown field",
            Self::InvalidOperator => "invalid operator for field type",
            Self::LiteralMismatch => "literal does not match field type",
            Self::MissingClause => "missing required clause",
            Self::InvalidAsOf => "ASOF value must be a date",
            Self::Internal => "internal parser error",
        }
    }

    pub fn is_lexical(&self) -> bool {
        matches!(self, Self::UnexpectedCharacter | Self::UnterminatedString)
    }

    /// Lexical and syntax kinds, i.e. everything the parser reports.
    pub fn is_syntactic(&self) -> bool {
        self.is_lexical() || matches!(self, Self::UnexpectedToken | Self::Internal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub range: Span,
    pub message: String,
    pub severity: Severity,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// A diagnostic with the kind's default message and severity.
    pub fn new(kind: DiagnosticKind, range: Span) -> Self {
        Self {
            range,
            message: kind.fallback_message().to_owned(),
            severity: kind.default_severity(),
            kind,
        }
    }

    /// Appends `detail` to the default message: `"unknown field: `Bogus`"`.
    pub fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.message = format!("{}: {detail}", self.message);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.range, self.message)
    }
}

/// Orders diagnostics by start position; ties keep their reporting order.
pub fn sort_by_position(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.range.start);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span;

    #[test]
    fn lexical_kinds_are_warnings() {
        assert_eq!(
            DiagnosticKind::UnterminatedString.default_severity(),
            Severity::Warning
        );
        assert_eq!(DiagnosticKind::UnknownField.default_severity(), Severity::Error);
        assert!(DiagnosticKind::UnexpectedToken.is_syntactic());
        assert!(!DiagnosticKind::MissingClause.is_syntactic());
    }

    #[test]
    fn details_extend_the_fallback_message() {
        let d = Diagnostic::new(DiagnosticKind::UnknownField, span!(0, 1, 0, 6)).with_detail("`Bogus`");
        assert_eq!(d.message, "unknown field: `Bogus`");
        assert!(d.is_error());
        assert_eq!(d.to_string(), "error at 0:1-0:6: unknown field: `Bogus`");
    }

    #[test]
    fn sorting_is_stable_by_start() {
        let mut ds = vec![
            Diagnostic::new(DiagnosticKind::LiteralMismatch, span!(1, 0, 1, 2)),
            Diagnostic::new(DiagnosticKind::UnknownField, span!(0, 4, 0, 9)),
            Diagnostic::new(DiagnosticKind::InvalidOperator, span!(0, 4, 0, 9)),
        ];
        sort_by_position(&mut ds);
        let kinds: Vec<_> = ds.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::UnknownField,
                DiagnosticKind::InvalidOperator,
                DiagnosticKind::LiteralMismatch,
            ]
        );
    }
}
