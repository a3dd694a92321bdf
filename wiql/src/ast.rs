//! # Syntax Tree
//!
//! Nodes built by the parser's reductions. Every node owns the [`Span`] of
//! the tokens it was built from. Parts that could not be parsed are kept as
//! explicit placeholders (an empty [`FieldList`], [`Source::Missing`],
//! [`BooleanExpression::Error`], [`LiteralKind::Error`]) so later passes still
//! see a complete statement.
//!
//! [`SelectStatement::to_sexpr`] renders a tree without positions; two trees
//! are structurally equal exactly when their renderings are.

use crate::Span;
use crate::token::quote;
use serde::Serialize;
use smartstring::alias::String;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectStatement {
    pub fields: FieldList,
    pub source: Source,
    pub where_clause: Option<BooleanExpression>,
    pub order_by: Option<OrderByClause>,
    pub as_of: Option<AsOfClause>,
    pub span: Span,
}

/// The `SELECT` list. Empty when the list could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldList {
    pub fields: Vec<FieldRef>,
    pub span: Span,
}

/// A field reference, bare (`System.Title`) or bracketed (`[Work Item Type]`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRef {
    /// Name as written, without brackets or surrounding blanks.
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Source {
    WorkItems(Span),
    WorkItemLinks(Span),
    /// Placeholder for an unparsable `FROM` target.
    Missing(Span),
}

impl Source {
    pub fn span(&self) -> Span {
        match *self {
            Self::WorkItems(span) | Self::WorkItemLinks(span) | Self::Missing(span) => span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEq,
    LessOrEq,
    Like,
    NotLike,
}

impl ComparisonOperator {
    /// `< <= > >=`
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::LessThan | Self::GreaterOrEq | Self::LessOrEq
        )
    }

    pub fn is_like(self) -> bool {
        matches!(self, Self::Like | Self::NotLike)
    }

    /// Canonical upper-case spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "<>",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEq => ">=",
            Self::LessOrEq => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LiteralKind {
    /// Number lexeme as written.
    Number(String),
    /// Unquoted string value.
    String(String),
    /// Macro such as `@today`, as written.
    Variable(String),
    /// Placeholder for an unparsable value.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Literal {
    pub kind: LiteralKind,
    pub span: Span,
}

impl Literal {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self.kind {
            LiteralKind::Number(_) => "a number",
            LiteralKind::String(_) => "a string",
            LiteralKind::Variable(_) => "a variable",
            LiteralKind::Error => "malformed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BooleanExpression {
    And {
        left: Box<BooleanExpression>,
        right: Box<BooleanExpression>,
        span: Span,
    },
    Or {
        left: Box<BooleanExpression>,
        right: Box<BooleanExpression>,
        span: Span,
    },
    Not {
        operand: Box<BooleanExpression>,
        span: Span,
    },
    Comparison {
        field: FieldRef,
        operator: ComparisonOperator,
        literal: Literal,
        span: Span,
    },
    In {
        field: FieldRef,
        negated: bool,
        literals: Vec<Literal>,
        span: Span,
    },
    Contains {
        field: FieldRef,
        negated: bool,
        literal: Literal,
        span: Span,
    },
    ContainsWords {
        field: FieldRef,
        negated: bool,
        literal: Literal,
        span: Span,
    },
    Under {
        field: FieldRef,
        negated: bool,
        literal: Literal,
        span: Span,
    },
    /// `EVER [Field] op value`: the field ever held a matching value.
    Ever {
        field: FieldRef,
        operator: ComparisonOperator,
        literal: Literal,
        span: Span,
    },
    /// Placeholder for an unparsable condition.
    Error(Span),
}

impl BooleanExpression {
    pub fn span(&self) -> Span {
        match self {
            Self::And { span, .. }
            | Self::Or { span, .. }
            | Self::Not { span, .. }
            | Self::Comparison { span, .. }
            | Self::In { span, .. }
            | Self::Contains { span, .. }
            | Self::ContainsWords { span, .. }
            | Self::Under { span, .. }
            | Self::Ever { span, .. }
            | Self::Error(span) => *span,
        }
    }

    /// Replaces the node's own span, e.g. to include enclosing parentheses.
    pub fn with_span(mut self, new: Span) -> Self {
        match &mut self {
            Self::And { span, .. }
            | Self::Or { span, .. }
            | Self::Not { span, .. }
            | Self::Comparison { span, .. }
            | Self::In { span, .. }
            | Self::Contains { span, .. }
            | Self::ContainsWords { span, .. }
            | Self::Under { span, .. }
            | Self::Ever { span, .. }
            | Self::Error(span) => *span = new,
        }
        self
    }

    /// Field reference of a predicate node.
    pub fn field(&self) -> Option<&FieldRef> {
        match self {
            Self::Comparison { field, .. }
            | Self::In { field, .. }
            | Self::Contains { field, .. }
            | Self::ContainsWords { field, .. }
            | Self::Under { field, .. }
            | Self::Ever { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Every field reference in the expression, left to right.
    pub fn fields(&self) -> Vec<&FieldRef> {
        fn walk<'e>(expr: &'e BooleanExpression, out: &mut Vec<&'e FieldRef>) {
            match expr {
                BooleanExpression::And { left, right, .. }
                | BooleanExpression::Or { left, right, .. } => {
                    walk(left, out);
                    walk(right, out);
                }
                BooleanExpression::Not { operand, .. } => walk(operand, out),
                other => out.extend(other.field()),
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortItem {
    pub field: FieldRef,
    /// `None` when no direction was written.
    pub direction: Option<SortDirection>,
    pub span: Span,
}

/// `ORDER BY` items. Empty when the list could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderByClause {
    pub items: Vec<SortItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsOfClause {
    pub literal: Literal,
    pub span: Span,
}

fn sexpr_literal(out: &mut std::string::String, literal: &Literal) {
    match &literal.kind {
        LiteralKind::Number(n) => out.push_str(n),
        LiteralKind::String(s) => out.push_str(&quote(s)),
        LiteralKind::Variable(v) => out.push_str(v),
        LiteralKind::Error => out.push_str("<error>"),
    }
}

fn sexpr_field(out: &mut std::string::String, field: &FieldRef) {
    let _ = write!(out, "[{}]", field.name);
}

fn sexpr_expr(out: &mut std::string::String, expr: &BooleanExpression) {
    let neg = |negated: bool| if negated { "not-" } else { "" };
    match expr {
        BooleanExpression::And { left, right, .. } | BooleanExpression::Or { left, right, .. } => {
            let op = if matches!(expr, BooleanExpression::And { .. }) {
                "and"
            } else {
                "or"
            };
            let _ = write!(out, "({op} ");
            sexpr_expr(out, left);
            out.push(' ');
            sexpr_expr(out, right);
            out.push(')');
        }
        BooleanExpression::Not { operand, .. } => {
            out.push_str("(not ");
            sexpr_expr(out, operand);
            out.push(')');
        }
        BooleanExpression::Comparison {
            field,
            operator,
            literal,
            ..
        }
        | BooleanExpression::Ever {
            field,
            operator,
            literal,
            ..
        } => {
            let ever = if matches!(expr, BooleanExpression::Ever { .. }) {
                "ever "
            } else {
                ""
            };
            let _ = write!(out, "({ever}{} ", operator.as_str().to_lowercase());
            sexpr_field(out, field);
            out.push(' ');
            sexpr_literal(out, literal);
            out.push(')');
        }
        BooleanExpression::In {
            field,
            negated,
            literals,
            ..
        } => {
            let _ = write!(out, "({}in ", neg(*negated));
            sexpr_field(out, field);
            for literal in literals {
                out.push(' ');
                sexpr_literal(out, literal);
            }
            out.push(')');
        }
        BooleanExpression::Contains {
            field,
            negated,
            literal,
            ..
        }
        | BooleanExpression::ContainsWords {
            field,
            negated,
            literal,
            ..
        }
        | BooleanExpression::Under {
            field,
            negated,
            literal,
            ..
        } => {
            let name = match expr {
                BooleanExpression::Contains { .. } => "contains",
                BooleanExpression::ContainsWords { .. } => "contains-words",
                _ => "under",
            };
            let _ = write!(out, "({}{name} ", neg(*negated));
            sexpr_field(out, field);
            out.push(' ');
            sexpr_literal(out, literal);
            out.push(')');
        }
        BooleanExpression::Error(_) => out.push_str("<error>"),
    }
}

impl SelectStatement {
    /// Position-free rendering of the tree, e.g.
    /// `(select ([ID]) workitems (where (= [ID] 1)))`.
    pub fn to_sexpr(&self) -> std::string::String {
        let mut out = std::string::String::from("(select (");
        for (i, field) in self.fields.fields.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            sexpr_field(&mut out, field);
        }
        out.push_str(") ");
        out.push_str(match self.source {
            Source::WorkItems(_) => "workitems",
            Source::WorkItemLinks(_) => "workitemlinks",
            Source::Missing(_) => "<error>",
        });
        if let Some(expr) = &self.where_clause {
            out.push_str(" (where ");
            sexpr_expr(&mut out, expr);
            out.push(')');
        }
        if let Some(order) = &self.order_by {
            out.push_str(" (order");
            for item in &order.items {
                out.push(' ');
                sexpr_field(&mut out, &item.field);
                match item.direction {
                    Some(SortDirection::Asc) => out.push_str(":asc"),
                    Some(SortDirection::Desc) => out.push_str(":desc"),
                    None => {}
                }
            }
            out.push(')');
        }
        if let Some(as_of) = &self.as_of {
            out.push_str(" (asof ");
            sexpr_literal(&mut out, &as_of.literal);
            out.push(')');
        }
        out.push(')');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span;

    fn field(name: &str) -> FieldRef {
        FieldRef {
            name: name.into(),
            span: Span::default(),
        }
    }

    fn number(n: &str) -> Literal {
        Literal {
            kind: LiteralKind::Number(n.into()),
            span: Span::default(),
        }
    }

    #[test]
    fn sexpr_ignores_positions() {
        let cmp = |span| BooleanExpression::Comparison {
            field: field("ID"),
            operator: ComparisonOperator::GreaterOrEq,
            literal: number("3"),
            span,
        };
        let stmt = |span| SelectStatement {
            fields: FieldList {
                fields: vec![field("ID"), field("Title")],
                span,
            },
            source: Source::WorkItems(span),
            where_clause: Some(BooleanExpression::Not {
                operand: Box::new(cmp(span)),
                span,
            }),
            order_by: Some(OrderByClause {
                items: vec![SortItem {
                    field: field("ID"),
                    direction: Some(SortDirection::Desc),
                    span,
                }],
                span,
            }),
            as_of: None,
            span,
        };
        let a = stmt(span!(0, 0, 0, 5));
        let b = stmt(span!(3, 1, 4, 2));
        assert_ne!(a, b);
        assert_eq!(a.to_sexpr(), b.to_sexpr());
        assert_eq!(
            a.to_sexpr(),
            "(select ([ID] [Title]) workitems (where (not (>= [ID] 3))) (order [ID]:desc))"
        );
    }

    #[test]
    fn with_span_replaces_only_the_outer_span() {
        let inner = BooleanExpression::Error(span!(0, 4, 0, 4));
        let outer = BooleanExpression::Not {
            operand: Box::new(inner.clone()),
            span: span!(0, 0, 0, 4),
        }
        .with_span(span!(0, 0, 0, 9));
        assert_eq!(outer.span(), span!(0, 0, 0, 9));
        let BooleanExpression::Not { operand, .. } = outer else {
            unreachable!();
        };
        assert_eq!(*operand, inner);
    }

    #[test]
    fn strings_are_requoted_in_sexpr() {
        let lit = Literal {
            kind: LiteralKind::String("it's".into()),
            span: Span::default(),
        };
        let mut out = std::string::String::new();
        sexpr_literal(&mut out, &lit);
        assert_eq!(out, "'it''s'");
    }
}
