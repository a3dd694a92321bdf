//! # Error Checker
//!
//! A read-only walk over a parsed statement that validates it against a
//! [`FieldSet`] snapshot. Each check is independent and every failure is
//! reported; the result is the union of the parser's diagnostics and the
//! semantic ones, ordered by position.
//!
//! ## Checks
//!
//! - **Field references** resolve by reference or display name, ignoring
//!   case. An unresolved field is reported once per reference and its
//!   predicate is not checked further.
//! - **Operators** must suit the field type: `CONTAINS`, `CONTAINS WORDS` and
//!   `LIKE` need a text field, `UNDER` a tree path, `EVER` a history field,
//!   `< <= > >=` an ordinal type, and `IN` anything but history.
//! - **Literals** must parse as the field type. Macro variables and error
//!   placeholders are not checked.
//! - **Clauses**: a field list and a source must be present, and `ASOF` takes
//!   a date.

use crate::ast::{
    BooleanExpression, ComparisonOperator, FieldRef, Literal, LiteralKind, SelectStatement, Source,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, sort_by_position};
use crate::fields::{FieldMetadata, FieldSet, FieldType};
use crate::parser::{ParseResult, parse};
use crate::tokenizer::tokenize;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Layouts accepted for date literals besides RFC 3339.
const DATE_TIME_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Whether `text` is a date or date-time literal.
pub fn is_date(text: &str) -> bool {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text).is_ok()
        || DATE_TIME_LAYOUTS
            .iter()
            .any(|layout| NaiveDateTime::parse_from_str(text, layout).is_ok())
        || DATE_LAYOUTS
            .iter()
            .any(|layout| NaiveDate::parse_from_str(text, layout).is_ok())
}

/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, optionally in braces.
pub fn is_guid(text: &str) -> bool {
    let text = text.trim();
    let text = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(text);
    let groups: Vec<&str> = text.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Whether `literal` is a valid value for a field of type `ty`.
pub fn literal_matches(ty: FieldType, literal: &Literal) -> bool {
    match &literal.kind {
        LiteralKind::Variable(_) | LiteralKind::Error => true,
        LiteralKind::Number(n) => match ty {
            FieldType::Integer => n.parse::<i64>().is_ok(),
            FieldType::Double => n.parse::<f64>().is_ok(),
            FieldType::Boolean => n == "0" || n == "1",
            _ => false,
        },
        LiteralKind::String(s) => match ty {
            FieldType::Integer | FieldType::Double => false,
            FieldType::DateTime => is_date(s),
            FieldType::Boolean => {
                s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
            }
            FieldType::Guid => is_guid(s),
            FieldType::String
            | FieldType::PlainText
            | FieldType::Html
            | FieldType::TreePath
            | FieldType::History => true,
        },
    }
}

fn comparison_allowed(op: ComparisonOperator, ty: FieldType) -> bool {
    if op.is_like() {
        ty.is_text()
    } else if op.is_ordering() {
        ty.is_ordinal()
    } else {
        true
    }
}

/// Validates parse results against one field metadata snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ErrorChecker<'f> {
    fields: &'f FieldSet,
}

impl<'f> ErrorChecker<'f> {
    pub fn new(fields: &'f FieldSet) -> Self {
        Self { fields }
    }

    /// Full diagnostic set for one pass: the parser's lexical and syntax
    /// diagnostics plus every semantic problem, sorted by position.
    pub fn check(&self, parsed: &ParseResult) -> Vec<Diagnostic> {
        let mut diagnostics = parsed.diagnostics.clone();
        if let Some(statement) = &parsed.statement {
            diagnostics.extend(self.check_statement(statement));
        }
        let mut pass = CheckPass {
            fields: self.fields,
            diagnostics: Vec::new(),
        };
        for field in &parsed.dropped_fields {
            pass.resolve(field);
        }
        diagnostics.extend(pass.diagnostics);
        sort_by_position(&mut diagnostics);
        diagnostics
    }

    /// Semantic diagnostics of one statement, in traversal order.
    pub fn check_statement(&self, statement: &SelectStatement) -> Vec<Diagnostic> {
        let mut pass = CheckPass {
            fields: self.fields,
            diagnostics: Vec::new(),
        };
        pass.visit_statement(statement);
        pass.diagnostics
    }
}

/// Mutable state of a single check.
struct CheckPass<'f> {
    fields: &'f FieldSet,
    diagnostics: Vec<Diagnostic>,
}

impl<'f> CheckPass<'f> {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::debug!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn visit_statement(&mut self, statement: &SelectStatement) {
        if statement.fields.fields.is_empty() {
            self.report(
                Diagnostic::new(DiagnosticKind::MissingClause, statement.fields.span)
                    .with_detail("field list"),
            );
        }
        for field in &statement.fields.fields {
            self.resolve(field);
        }
        if let Source::Missing(span) = statement.source {
            self.report(
                Diagnostic::new(DiagnosticKind::MissingClause, span)
                    .with_detail("`WORKITEMS` or `WORKITEMLINKS` source"),
            );
        }
        if let Some(expr) = &statement.where_clause {
            self.visit_expr(expr);
        }
        if let Some(order_by) = &statement.order_by {
            for item in &order_by.items {
                self.resolve(&item.field);
            }
        }
        if let Some(as_of) = &statement.as_of {
            let valid = match &as_of.literal.kind {
                LiteralKind::String(s) => is_date(s),
                LiteralKind::Variable(_) | LiteralKind::Error => true,
                LiteralKind::Number(_) => false,
            };
            if !valid {
                self.report(
                    Diagnostic::new(DiagnosticKind::InvalidAsOf, as_of.literal.span)
                        .with_detail(format!("found {}", as_of.literal.describe())),
                );
            }
        }
    }

    fn resolve(&mut self, field: &FieldRef) -> Option<&'f FieldMetadata> {
        let fields = self.fields;
        match fields.resolve(&field.name) {
            Some(meta) => {
                log::debug!("`{}` resolved to {}", field.name, meta.reference_name);
                Some(meta)
            }
            None => {
                self.report(
                    Diagnostic::new(DiagnosticKind::UnknownField, field.span)
                        .with_detail(format!("`{}`", field.name)),
                );
                None
            }
        }
    }

    fn invalid_operator(&mut self, expr: &BooleanExpression, op: &str, meta: &FieldMetadata) {
        self.report(
            Diagnostic::new(DiagnosticKind::InvalidOperator, expr.span()).with_detail(format!(
                "`{op}` on {} field `{}`",
                meta.field_type, meta.reference_name
            )),
        );
    }

    fn check_literal(&mut self, literal: &Literal, meta: &FieldMetadata) {
        if !literal_matches(meta.field_type, literal) {
            self.report(
                Diagnostic::new(DiagnosticKind::LiteralMismatch, literal.span).with_detail(
                    format!("expected {}, found {}", meta.field_type, literal.describe()),
                ),
            );
        }
    }

    fn visit_expr(&mut self, expr: &BooleanExpression) {
        use BooleanExpression as E;
        match expr {
            E::And { left, right, .. } | E::Or { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            E::Not { operand, .. } => self.visit_expr(operand),
            E::Error(_) => {}
            E::Comparison {
                field,
                operator,
                literal,
                ..
            } => {
                let Some(meta) = self.resolve(field) else {
                    return;
                };
                if !comparison_allowed(*operator, meta.field_type) {
                    self.invalid_operator(expr, operator.as_str(), meta);
                }
                self.check_literal(literal, meta);
            }
            E::Ever {
                field,
                operator,
                literal,
                ..
            } => {
                let Some(meta) = self.resolve(field) else {
                    return;
                };
                if meta.field_type != FieldType::History {
                    self.invalid_operator(expr, "EVER", meta);
                } else if !comparison_allowed(*operator, meta.field_type) {
                    self.invalid_operator(expr, operator.as_str(), meta);
                }
                self.check_literal(literal, meta);
            }
            E::In {
                field, literals, ..
            } => {
                let Some(meta) = self.resolve(field) else {
                    return;
                };
                if meta.field_type == FieldType::History {
                    self.invalid_operator(expr, "IN", meta);
                }
                for literal in literals {
                    self.check_literal(literal, meta);
                }
            }
            E::Contains { field, literal, .. }
            | E::ContainsWords { field, literal, .. }
            | E::Under { field, literal, .. } => {
                let Some(meta) = self.resolve(field) else {
                    return;
                };
                let (op, allowed) = match expr {
                    E::Contains { .. } => ("CONTAINS", meta.field_type.is_text()),
                    E::ContainsWords { .. } => ("CONTAINS WORDS", meta.field_type.is_text()),
                    _ => ("UNDER", meta.field_type == FieldType::TreePath),
                };
                if !allowed {
                    self.invalid_operator(expr, op, meta);
                }
                self.check_literal(literal, meta);
            }
        }
    }
}

/// Tokenizes, parses and checks a document in one call.
pub fn check_document<S: AsRef<str>>(lines: &[S], fields: &FieldSet) -> Vec<Diagnostic> {
    let parsed = parse(&tokenize(lines));
    ErrorChecker::new(fields).check(&parsed)
}
