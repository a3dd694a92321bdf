//! # Formatter
//!
//! Re-renders a parsed statement as canonical text:
//!
//! ```text
//! SELECT [ID], [Title]
//! FROM WORKITEMS
//! WHERE [State] = 'Active'
//!     AND ([A] = 1
//!         OR [B] = 2)
//! ORDER BY [ID] DESC
//! ASOF '2020-01-01'
//! ```
//!
//! The output depends only on the tree, never on the original layout, so
//! formatting canonical text reproduces it. Documents with lexical or syntax
//! problems are refused with [`FormatError::Malformed`] instead of being
//! rewritten with parts missing.

use crate::ast::{
    BooleanExpression, ComparisonOperator, FieldRef, Literal, LiteralKind, SelectStatement,
    SortDirection, Source,
};
use crate::diagnostics::Diagnostic;
use crate::fields::FieldSet;
use crate::parser::{ParseResult, parse};
use crate::token::quote;
use crate::tokenizer::tokenize;
use crate::{Position, Span};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordCase {
    #[default]
    Upper,
    Lower,
}

/// Formatter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatOptions {
    /// Spaces per nesting level of a boolean chain.
    pub indent_width: usize,
    pub keyword_case: KeywordCase,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_width: 4,
            keyword_case: KeywordCase::Upper,
        }
    }
}

/// Replacement of `range` by `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub range: Span,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// The document has lexical or syntax problems.
    #[error("cannot format a query with {} lexical or syntax problem(s)", .0.len())]
    Malformed(Vec<Diagnostic>),
}

struct Renderer<'a> {
    options: &'a FormatOptions,
    fields: Option<&'a FieldSet>,
    out: String,
}

impl Renderer<'_> {
    fn keyword(&mut self, keyword: &str) {
        match self.options.keyword_case {
            KeywordCase::Upper => self.out.push_str(keyword),
            KeywordCase::Lower => self.out.push_str(&keyword.to_lowercase()),
        }
    }

    fn newline(&mut self, depth: usize) {
        self.out.push('\n');
        self.out
            .extend(std::iter::repeat_n(' ', depth * self.options.indent_width));
    }

    fn field(&mut self, field: &FieldRef) {
        let name = self
            .fields
            .and_then(|fields| fields.resolve_spelling(&field.name))
            .map_or(field.name.as_str(), |(_, spelling)| spelling);
        self.out.push('[');
        self.out.push_str(name);
        self.out.push(']');
    }

    fn literal(&mut self, literal: &Literal) {
        match &literal.kind {
            LiteralKind::Number(text) | LiteralKind::Variable(text) => self.out.push_str(text),
            LiteralKind::String(value) => self.out.push_str(&quote(value)),
            LiteralKind::Error => {}
        }
    }

    fn operator(&mut self, op: ComparisonOperator) {
        match op {
            ComparisonOperator::Like => self.keyword("LIKE"),
            ComparisonOperator::NotLike => self.keyword("NOT LIKE"),
            _ => self.out.push_str(op.as_str()),
        }
    }

    fn statement(&mut self, statement: &SelectStatement) {
        self.keyword("SELECT");
        for (i, field) in statement.fields.fields.iter().enumerate() {
            self.out.push_str(if i == 0 { " " } else { ", " });
            self.field(field);
        }
        self.newline(0);
        self.keyword("FROM");
        self.out.push(' ');
        match statement.source {
            Source::WorkItems(_) => self.keyword("WORKITEMS"),
            Source::WorkItemLinks(_) => self.keyword("WORKITEMLINKS"),
            Source::Missing(_) => {}
        }
        if let Some(expr) = &statement.where_clause {
            self.newline(0);
            self.keyword("WHERE");
            self.out.push(' ');
            self.expr(expr, 0);
        }
        if let Some(order_by) = &statement.order_by {
            self.newline(0);
            self.keyword("ORDER BY");
            for (i, item) in order_by.items.iter().enumerate() {
                self.out.push_str(if i == 0 { " " } else { ", " });
                self.field(&item.field);
                match item.direction {
                    Some(SortDirection::Asc) => {
                        self.out.push(' ');
                        self.keyword("ASC");
                    }
                    Some(SortDirection::Desc) => {
                        self.out.push(' ');
                        self.keyword("DESC");
                    }
                    None => {}
                }
            }
        }
        if let Some(as_of) = &statement.as_of {
            self.newline(0);
            self.keyword("ASOF");
            self.out.push(' ');
            self.literal(&as_of.literal);
        }
    }

    /// Renders `expr` whose continuation lines start at `depth + 1`.
    fn expr(&mut self, expr: &BooleanExpression, depth: usize) {
        use BooleanExpression as E;
        match expr {
            E::And { .. } | E::Or { .. } => self.chain(expr, depth),
            E::Not { operand, .. } => {
                self.keyword("NOT");
                self.out.push(' ');
                self.operand(operand, depth);
            }
            E::Comparison {
                field,
                operator,
                literal,
                ..
            } => {
                self.field(field);
                self.out.push(' ');
                self.operator(*operator);
                self.out.push(' ');
                self.literal(literal);
            }
            E::Ever {
                field,
                operator,
                literal,
                ..
            } => {
                self.keyword("EVER");
                self.out.push(' ');
                self.field(field);
                self.out.push(' ');
                self.operator(*operator);
                self.out.push(' ');
                self.literal(literal);
            }
            E::In {
                field,
                negated,
                literals,
                ..
            } => {
                self.field(field);
                self.out.push(' ');
                self.keyword(if *negated { "NOT IN" } else { "IN" });
                self.out.push_str(" (");
                for (i, literal) in literals.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.literal(literal);
                }
                self.out.push(')');
            }
            E::Contains {
                field,
                negated,
                literal,
                ..
            }
            | E::ContainsWords {
                field,
                negated,
                literal,
                ..
            }
            | E::Under {
                field,
                negated,
                literal,
                ..
            } => {
                self.field(field);
                self.out.push(' ');
                if *negated {
                    self.keyword("NOT");
                    self.out.push(' ');
                }
                self.keyword(match expr {
                    E::Contains { .. } => "CONTAINS",
                    E::ContainsWords { .. } => "CONTAINS WORDS",
                    _ => "UNDER",
                });
                self.out.push(' ');
                self.literal(literal);
            }
            E::Error(_) => {}
        }
    }

    /// An operand of `AND`, `OR` or `NOT`: nested chains get parentheses and
    /// one more level of indentation.
    fn operand(&mut self, expr: &BooleanExpression, depth: usize) {
        if matches!(expr, BooleanExpression::And { .. } | BooleanExpression::Or { .. }) {
            self.out.push('(');
            self.chain(expr, depth + 1);
            self.out.push(')');
        } else {
            self.expr(expr, depth);
        }
    }

    /// A left-nested run of one operator, one operand per line.
    fn chain(&mut self, expr: &BooleanExpression, depth: usize) {
        let is_and = matches!(expr, BooleanExpression::And { .. });
        let mut operands = Vec::new();
        let mut node = expr;
        loop {
            match node {
                BooleanExpression::And { left, right, .. } if is_and => {
                    operands.push(right.as_ref());
                    node = left;
                }
                BooleanExpression::Or { left, right, .. } if !is_and => {
                    operands.push(right.as_ref());
                    node = left;
                }
                _ => break,
            }
        }
        operands.push(node);
        operands.reverse();
        let keyword = if is_and { "AND" } else { "OR" };
        for (i, operand) in operands.into_iter().enumerate() {
            if i > 0 {
                self.newline(depth + 1);
                self.keyword(keyword);
                self.out.push(' ');
            }
            self.operand(operand, depth);
        }
    }
}

/// Canonical text of a statement. `fields`, when given, supplies the
/// canonical spelling of resolved field names.
pub fn format_statement(
    statement: &SelectStatement,
    fields: Option<&FieldSet>,
    options: &FormatOptions,
) -> String {
    let mut renderer = Renderer {
        options,
        fields,
        out: String::new(),
    };
    renderer.statement(statement);
    renderer.out
}

/// Canonical text of a parse result, refused when the parser reported
/// anything.
pub fn format_parsed(
    parsed: &ParseResult,
    fields: Option<&FieldSet>,
    options: &FormatOptions,
) -> Result<String, FormatError> {
    match &parsed.statement {
        Some(statement) if parsed.diagnostics.is_empty() => {
            Ok(format_statement(statement, fields, options))
        }
        _ => Err(FormatError::Malformed(parsed.diagnostics.clone())),
    }
}

/// Span covering every character of `lines`.
pub fn document_range<S: AsRef<str>>(lines: &[S]) -> Span {
    let end = lines.last().map_or(Position::default(), |line| {
        Position::new(lines.len() - 1, line.as_ref().chars().count())
    });
    Span::new(Position::default(), end)
}

/// Formats a whole document into a single edit replacing all of it.
pub fn format_document<S: AsRef<str>>(
    lines: &[S],
    fields: Option<&FieldSet>,
    options: &FormatOptions,
) -> Result<TextEdit, FormatError> {
    let parsed = parse(&tokenize(lines));
    let text = format_parsed(&parsed, fields, options)?;
    log::debug!("formatted {} lines into {} bytes", lines.len(), text.len());
    Ok(TextEdit {
        range: document_range(lines),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldMetadata, FieldType};
    use crate::span;
    use crate::tokenizer::split_lines;

    fn fmt(text: &str) -> String {
        fmt_with(text, &FormatOptions::default())
    }

    fn fmt_with(text: &str, options: &FormatOptions) -> String {
        format_document(&split_lines(text), None, options).unwrap().text
    }

    #[test]
    fn canonical_layout() {
        assert_eq!(
            fmt("select id,title from workitems where state='Active' and (a=1 or b=2) \
                 order by id desc, title asof '2020-01-01'"),
            "SELECT [id], [title]\n\
             FROM WORKITEMS\n\
             WHERE [state] = 'Active'\n    \
             AND ([a] = 1\n        \
             OR [b] = 2)\n\
             ORDER BY [id] DESC, [title]\n\
             ASOF '2020-01-01'"
        );
    }

    #[test]
    fn flat_chains_and_negation() {
        assert_eq!(
            fmt("select a from workitemlinks where a = 1 or not (b = 2 and c = 3) or d in (1,'x')"),
            "SELECT [a]\n\
             FROM WORKITEMLINKS\n\
             WHERE [a] = 1\n    \
             OR NOT ([b] = 2\n        \
             AND [c] = 3)\n    \
             OR [d] IN (1, 'x')"
        );
    }

    #[test]
    fn right_nested_chain_keeps_its_parentheses() {
        assert_eq!(
            fmt("select a from workitems where a = 1 and (b = 2 and c = 3)"),
            "SELECT [a]\n\
             FROM WORKITEMS\n\
             WHERE [a] = 1\n    \
             AND ([b] = 2\n        \
             AND [c] = 3)"
        );
    }

    #[test]
    fn predicates_and_literals() {
        assert_eq!(
            fmt("select a from workitems where ever [H] = \"it's\" and b not contains words 'x' \
                 and c not under 'p' and d not like 'q%' and e <> -1.5e3 and f = @me"),
            "SELECT [a]\n\
             FROM WORKITEMS\n\
             WHERE EVER [H] = 'it''s'\n    \
             AND [b] NOT CONTAINS WORDS 'x'\n    \
             AND [c] NOT UNDER 'p'\n    \
             AND [d] NOT LIKE 'q%'\n    \
             AND [e] <> -1.5e3\n    \
             AND [f] = @me"
        );
    }

    #[test]
    fn lower_case_and_custom_indent() {
        let options = FormatOptions {
            indent_width: 2,
            keyword_case: KeywordCase::Lower,
        };
        assert_eq!(
            fmt_with("SELECT a FROM workitems WHERE a = 1 AND b CONTAINS 'x'", &options),
            "select [a]\nfrom workitems\nwhere [a] = 1\n  and [b] contains 'x'"
        );
    }

    #[test]
    fn metadata_supplies_canonical_casing() {
        let fields = FieldSet::new([
            FieldMetadata::new("System.Title", "Title", FieldType::String),
            FieldMetadata::new("System.WorkItemType", "Work Item Type", FieldType::String),
        ]);
        let edit = format_document(
            &["select system.title, [work item type], [Other] from workitems"],
            Some(&fields),
            &FormatOptions::default(),
        )
        .unwrap();
        assert_eq!(
            edit.text,
            "SELECT [System.Title], [Work Item Type], [Other]\nFROM WORKITEMS"
        );
    }

    #[test]
    fn formatting_is_idempotent() {
        let once = fmt("select [a] , b from workitems where not not a = 1 or (b > 2 and (c < 3 or d >= 4)) order by a asc");
        assert_eq!(fmt(&once), once);
    }

    #[test]
    fn edit_replaces_the_whole_document() {
        let edit = format_document(
            &["select a", "from workitems", "  "],
            None,
            &FormatOptions::default(),
        )
        .unwrap();
        assert_eq!(edit.range, span!(0, 0, 2, 2));
        assert_eq!(edit.text, "SELECT [a]\nFROM WORKITEMS");
    }

    #[test]
    fn malformed_documents_are_refused() {
        let options = FormatOptions::default();
        let err = format_document(&["select from workitems"], None, &options).unwrap_err();
        let FormatError::Malformed(diagnostics) = &err;
        assert_eq!(diagnostics.len(), 1);
        assert!(err.to_string().starts_with("cannot format"));
        assert!(format_document(&["select a from workitems where a = 'x"], None, &options).is_err());
        assert!(format_document(&["select a # from workitems"], None, &options).is_err());
        assert!(format_document::<&str>(&[], None, &options).is_err());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: FormatOptions = serde_json::from_str(r#"{"keyword_case": "lower"}"#).unwrap();
        assert_eq!(options.indent_width, 4);
        assert_eq!(options.keyword_case, KeywordCase::Lower);
    }
}
