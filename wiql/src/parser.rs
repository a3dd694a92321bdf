//! # WIQL Parser
//!
//! A shift/reduce automaton driven by the SLR(1) table that `wiql-gen`
//! compiles from `wiql.g` at build time ([`parser_data`]). Reductions build
//! the [`SelectStatement`] tree directly; there is no intermediate parse tree.
//!
//! ## Error recovery
//!
//! The grammar marks recovery points with the `error` terminal (a missing
//! field list, source, condition, sort list or value). When the table has no
//! action for the current token the parser:
//!
//! 1. reports a syntax [`Diagnostic`] at that token, listing what the state
//!    would have accepted, unless no token has been shifted since the last
//!    report (one diagnostic per burst of errors);
//! 2. pops states until one can shift `error`, pushes an error placeholder
//!    and continues; the popped input goes to [`ParseResult::skipped`] and
//!    its field references to [`ParseResult::dropped_fields`];
//! 3. while still resynchronizing, drops tokens the restored state cannot
//!    use, recording their spans in [`ParseResult::skipped`].
//!
//! A second failure on the same token must recover strictly deeper in the
//! stack, so recovery always terminates. Lexical error tokens never reach the
//! automaton: unexpected characters are skipped and unterminated strings are
//! parsed as strings, each with a low-severity diagnostic.

use crate::Span;
use crate::ast::{
    AsOfClause, BooleanExpression, ComparisonOperator, FieldList, FieldRef, Literal, LiteralKind,
    OrderByClause, SelectStatement, SortDirection, SortItem, Source,
};
use crate::diagnostics::{self, Diagnostic, DiagnosticKind};
use crate::token::{Token, TokenKind};
use parser_data::{
    Action, N_PRODUCTIONS, N_STATES, PRODS, Prod, ProdID, START_STATE, TAB, TERMINALS, TokenID,
};
use serde::Serialize;
use thiserror::Error;

/// Includes the generated SLR tables.
///
/// `parser_data.rs` is written by `wiql_gen::generate` from `src/wiql.g`
/// during the build. It defines the automaton, the production metadata and
/// the [`ProdID`]/[`TokenID`] enums.
pub mod parser_data {
    include!(concat!(env!("OUT_DIR"), "/parser_data.rs"));
}

/// Inconsistencies between the table and the tree builder.
///
/// These indicate a bug, not bad input; the parser turns them into an
/// [`DiagnosticKind::Internal`] diagnostic for the current pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParserError {
    #[error("no goto from state {state} on {lhs:?}")]
    MissingGoto { state: usize, lhs: TokenID },

    #[error("stack underflow while reducing {0:?}")]
    StackUnderflow(ProdID),

    #[error("reduction {prod:?} expected {expected} but found {found}")]
    UnexpectedNode {
        prod: ProdID,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid production index {0}")]
    InvalidProduction(usize),

    #[error("goto action on a terminal in state {0}")]
    UnexpectedGoto(usize),

    #[error("accepted without a statement on the stack")]
    EmptyAccept,
}

/// Counters collected during a parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
    pub recoveries: usize,
    pub discarded: usize,
}

/// Everything a parse pass produces.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// `None` only when not even a `SELECT` could be recognised.
    pub statement: Option<SelectStatement>,
    /// Lexical and syntax diagnostics, ordered by position.
    pub diagnostics: Vec<Diagnostic>,
    /// Spans of input dropped during recovery or for being unrecognisable,
    /// ordered by position. Together with the tree they account for every
    /// token.
    pub skipped: Vec<Span>,
    /// Field references inside input that recovery popped off the stack.
    /// They are not part of the tree but are still resolved by the checker.
    pub dropped_fields: Vec<FieldRef>,
    pub stats: ParserStats,
}

impl ParseResult {
    /// Whether the input had lexical or syntax problems of any severity.
    pub fn is_malformed(&self) -> bool {
        self.statement.is_none() || !self.diagnostics.is_empty()
    }
}

/// A value on the parser stack.
#[derive(Debug, Clone)]
enum Node {
    Token(Token),
    /// The `error` pseudo-token, positioned where recovery started.
    Error(Span),
    Query(Option<SelectStatement>),
    Fields(FieldList),
    Field(FieldRef),
    Source(Source),
    Where(Option<BooleanExpression>),
    Order(Option<OrderByClause>),
    AsOf(Option<AsOfClause>),
    Expr(BooleanExpression),
    Sorts(OrderByClause),
    Sort(SortItem),
    Op((ComparisonOperator, Span)),
    Value(Literal),
    Values((Vec<Literal>, Span)),
}

impl Node {
    fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "Token",
            Self::Error(_) => "Error",
            Self::Query(_) => "Query",
            Self::Fields(_) => "Fields",
            Self::Field(_) => "Field",
            Self::Source(_) => "Source",
            Self::Where(_) => "Where",
            Self::Order(_) => "Order",
            Self::AsOf(_) => "AsOf",
            Self::Expr(_) => "Expr",
            Self::Sorts(_) => "Sorts",
            Self::Sort(_) => "Sort",
            Self::Op(_) => "Op",
            Self::Value(_) => "Value",
            Self::Values(_) => "Values",
        }
    }

    /// Source range the node was built from; `None` for empty clauses.
    fn span(&self) -> Option<Span> {
        Some(match self {
            Self::Token(token) => token.span,
            Self::Error(span) | Self::Op((_, span)) | Self::Values((_, span)) => *span,
            Self::Query(statement) => statement.as_ref()?.span,
            Self::Fields(list) => list.span,
            Self::Field(field) => field.span,
            Self::Source(source) => source.span(),
            Self::Where(expr) => expr.as_ref()?.span(),
            Self::Order(order) => order.as_ref()?.span,
            Self::AsOf(as_of) => as_of.as_ref()?.span,
            Self::Expr(expr) => expr.span(),
            Self::Sorts(list) => list.span,
            Self::Sort(item) => item.span,
            Self::Value(literal) => literal.span,
        })
    }

    /// Field references held by the node. A bare identifier token can only
    /// ever become a field, so it counts as one.
    fn collect_fields(&self, out: &mut Vec<FieldRef>) {
        match self {
            Self::Token(token) if token.kind == TokenKind::Identifier => {
                out.push(field_from(token, token.span));
            }
            Self::Field(field) => out.push(field.clone()),
            Self::Fields(list) => out.extend(list.fields.iter().cloned()),
            Self::Sort(item) => out.push(item.field.clone()),
            Self::Sorts(list) | Self::Order(Some(list)) => {
                out.extend(list.items.iter().map(|item| item.field.clone()));
            }
            Self::Expr(expr) | Self::Where(Some(expr)) => {
                out.extend(expr.fields().into_iter().cloned());
            }
            Self::Query(Some(statement)) => {
                out.extend(statement.fields.fields.iter().cloned());
                if let Some(expr) = &statement.where_clause {
                    out.extend(expr.fields().into_iter().cloned());
                }
                if let Some(order) = &statement.order_by {
                    out.extend(order.items.iter().map(|item| item.field.clone()));
                }
            }
            _ => {}
        }
    }
}

/// Right-hand side values of a reduction, consumed left to right.
struct Args {
    prod: ProdID,
    items: std::vec::IntoIter<Node>,
}

macro_rules! take {
    ($args:ident, $variant:ident) => {
        match $args.next()? {
            Node::$variant(value) => value,
            other => {
                return Err(ParserError::UnexpectedNode {
                    prod: $args.prod,
                    expected: stringify!($variant),
                    found: other.name(),
                });
            }
        }
    };
}

impl Args {
    fn next(&mut self) -> Result<Node, ParserError> {
        self.items
            .next()
            .ok_or(ParserError::StackUnderflow(self.prod))
    }

    fn token(&mut self) -> Result<Token, ParserError> {
        let args = self;
        Ok(take!(args, Token))
    }
}

fn field_from(token: &Token, span: Span) -> FieldRef {
    FieldRef {
        name: token.text().trim().into(),
        span,
    }
}

fn comparison_operator(prod: ProdID) -> ComparisonOperator {
    match prod {
        ProdID::CompOp1 => ComparisonOperator::Equals,
        ProdID::CompOp2 => ComparisonOperator::NotEquals,
        ProdID::CompOp3 => ComparisonOperator::GreaterThan,
        ProdID::CompOp4 => ComparisonOperator::LessThan,
        ProdID::CompOp5 => ComparisonOperator::GreaterOrEq,
        ProdID::CompOp6 => ComparisonOperator::LessOrEq,
        _ => ComparisonOperator::Like,
    }
}

/// Builds the tree node for one reduction.
fn build(prod: ProdID, nodes: Vec<Node>) -> Result<Node, ParserError> {
    use BooleanExpression as E;
    let mut a = Args {
        prod,
        items: nodes.into_iter(),
    };
    let node = match prod {
        ProdID::Start => return Err(ParserError::InvalidProduction(prod.into())),

        ProdID::Query1 => {
            let select = a.token()?;
            let fields = take!(a, Fields);
            a.token()?;
            let source = take!(a, Source);
            let where_clause = take!(a, Where);
            let order_by = take!(a, Order);
            let as_of = take!(a, AsOf);
            let span = [
                Some(source.span()),
                where_clause.as_ref().map(BooleanExpression::span),
                order_by.as_ref().map(|o| o.span),
                as_of.as_ref().map(|c| c.span),
            ]
            .into_iter()
            .flatten()
            .fold(select.span, |acc, s| acc.merge(&s));
            Node::Query(Some(SelectStatement {
                fields,
                source,
                where_clause,
                order_by,
                as_of,
                span,
            }))
        }
        ProdID::Query2 => {
            take!(a, Error);
            Node::Query(None)
        }

        ProdID::Columns1 => {
            let field = take!(a, Field);
            Node::Fields(FieldList {
                span: field.span,
                fields: vec![field],
            })
        }
        ProdID::Columns2 => {
            let mut list = take!(a, Fields);
            a.token()?;
            let field = take!(a, Field);
            list.span = list.span.merge(&field.span);
            list.fields.push(field);
            Node::Fields(list)
        }
        ProdID::Columns3 => Node::Fields(FieldList {
            fields: Vec::new(),
            span: take!(a, Error),
        }),

        ProdID::Field1 => {
            let ident = a.token()?;
            Node::Field(field_from(&ident, ident.span))
        }
        ProdID::Field2 => {
            let open = a.token()?;
            let ident = a.token()?;
            let close = a.token()?;
            Node::Field(field_from(&ident, open.span.merge(&close.span)))
        }

        ProdID::Source1 => Node::Source(Source::WorkItems(a.token()?.span)),
        ProdID::Source2 => Node::Source(Source::WorkItemLinks(a.token()?.span)),
        ProdID::Source3 => Node::Source(Source::Missing(take!(a, Error))),

        ProdID::WhereClause1 => Node::Where(None),
        ProdID::WhereClause2 => {
            a.token()?;
            Node::Where(Some(take!(a, Expr)))
        }

        ProdID::OrderClause1 => Node::Order(None),
        ProdID::OrderClause2 => {
            let order = a.token()?;
            a.token()?;
            let mut list = take!(a, Sorts);
            list.span = order.span.merge(&list.span);
            Node::Order(Some(list))
        }

        ProdID::SortList1 => {
            let item = take!(a, Sort);
            Node::Sorts(OrderByClause {
                span: item.span,
                items: vec![item],
            })
        }
        ProdID::SortList2 => {
            let mut list = take!(a, Sorts);
            a.token()?;
            let item = take!(a, Sort);
            list.span = list.span.merge(&item.span);
            list.items.push(item);
            Node::Sorts(list)
        }
        ProdID::SortList3 => Node::Sorts(OrderByClause {
            items: Vec::new(),
            span: take!(a, Error),
        }),

        ProdID::SortItem1 => {
            let field = take!(a, Field);
            Node::Sort(SortItem {
                span: field.span,
                field,
                direction: None,
            })
        }
        ProdID::SortItem2 | ProdID::SortItem3 => {
            let field = take!(a, Field);
            let dir = a.token()?;
            let direction = if prod == ProdID::SortItem2 {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            };
            Node::Sort(SortItem {
                span: field.span.merge(&dir.span),
                field,
                direction: Some(direction),
            })
        }

        ProdID::AsofClause1 => Node::AsOf(None),
        ProdID::AsofClause2 => {
            let asof = a.token()?;
            let literal = take!(a, Value);
            Node::AsOf(Some(AsOfClause {
                span: asof.span.merge(&literal.span),
                literal,
            }))
        }

        ProdID::Expr1 | ProdID::Term1 => {
            let left = take!(a, Expr);
            a.token()?;
            let right = take!(a, Expr);
            let span = left.span().merge(&right.span());
            let (left, right) = (Box::new(left), Box::new(right));
            Node::Expr(if prod == ProdID::Expr1 {
                E::Or { left, right, span }
            } else {
                E::And { left, right, span }
            })
        }
        ProdID::Expr2 | ProdID::Term2 | ProdID::Factor3 => Node::Expr(take!(a, Expr)),

        ProdID::Factor1 => {
            let not = a.token()?;
            let operand = take!(a, Expr);
            Node::Expr(E::Not {
                span: not.span.merge(&operand.span()),
                operand: Box::new(operand),
            })
        }
        ProdID::Factor2 => {
            let open = a.token()?;
            let inner = take!(a, Expr);
            let close = a.token()?;
            Node::Expr(inner.with_span(open.span.merge(&close.span)))
        }
        ProdID::Factor4 => {
            let ever = a.token()?;
            let field = take!(a, Field);
            let (operator, _) = take!(a, Op);
            let literal = take!(a, Value);
            Node::Expr(E::Ever {
                span: ever.span.merge(&literal.span),
                field,
                operator,
                literal,
            })
        }

        ProdID::Predicate1 => {
            let field = take!(a, Field);
            let (operator, _) = take!(a, Op);
            let literal = take!(a, Value);
            Node::Expr(E::Comparison {
                span: field.span.merge(&literal.span),
                field,
                operator,
                literal,
            })
        }
        ProdID::Predicate2 => {
            let field = take!(a, Field);
            a.token()?;
            a.token()?;
            let literal = take!(a, Value);
            Node::Expr(E::Comparison {
                span: field.span.merge(&literal.span),
                field,
                operator: ComparisonOperator::NotLike,
                literal,
            })
        }
        ProdID::Predicate3 | ProdID::Predicate4 => {
            let negated = prod == ProdID::Predicate4;
            let field = take!(a, Field);
            if negated {
                a.token()?;
            }
            a.token()?;
            a.token()?;
            let (literals, _) = take!(a, Values);
            let close = a.token()?;
            Node::Expr(E::In {
                span: field.span.merge(&close.span),
                field,
                negated,
                literals,
            })
        }
        ProdID::Predicate5
        | ProdID::Predicate6
        | ProdID::Predicate7
        | ProdID::Predicate8
        | ProdID::Predicate9
        | ProdID::Predicate10 => {
            let negated = matches!(
                prod,
                ProdID::Predicate6 | ProdID::Predicate8 | ProdID::Predicate10
            );
            let field = take!(a, Field);
            if negated {
                a.token()?;
            }
            a.token()?;
            if matches!(prod, ProdID::Predicate7 | ProdID::Predicate8) {
                a.token()?;
            }
            let literal = take!(a, Value);
            let span = field.span.merge(&literal.span);
            Node::Expr(match prod {
                ProdID::Predicate5 | ProdID::Predicate6 => E::Contains {
                    field,
                    negated,
                    literal,
                    span,
                },
                ProdID::Predicate7 | ProdID::Predicate8 => E::ContainsWords {
                    field,
                    negated,
                    literal,
                    span,
                },
                _ => E::Under {
                    field,
                    negated,
                    literal,
                    span,
                },
            })
        }
        ProdID::Predicate11 => Node::Expr(E::Error(take!(a, Error))),

        ProdID::CompOp1
        | ProdID::CompOp2
        | ProdID::CompOp3
        | ProdID::CompOp4
        | ProdID::CompOp5
        | ProdID::CompOp6
        | ProdID::CompOp7 => Node::Op((comparison_operator(prod), a.token()?.span)),

        ProdID::Value1 | ProdID::Value2 | ProdID::Value3 => {
            let token = a.token()?;
            let kind = match prod {
                ProdID::Value1 => LiteralKind::Number(token.text().into()),
                ProdID::Value2 => LiteralKind::String(token.string_value()),
                _ => LiteralKind::Variable(token.text().into()),
            };
            Node::Value(Literal {
                kind,
                span: token.span,
            })
        }
        ProdID::Value4 => Node::Value(Literal {
            kind: LiteralKind::Error,
            span: take!(a, Error),
        }),

        ProdID::ValueList1 => {
            let value = take!(a, Value);
            let span = value.span;
            Node::Values((vec![value], span))
        }
        ProdID::ValueList2 => {
            let (mut values, span) = take!(a, Values);
            a.token()?;
            let value = take!(a, Value);
            let span = span.merge(&value.span);
            values.push(value);
            Node::Values((values, span))
        }
    };
    Ok(node)
}

/// Grammar terminal for a token kind; `None` for kinds the automaton never
/// sees.
fn terminal(kind: TokenKind) -> Option<TokenID> {
    use TokenKind as K;
    Some(match kind {
        K::Select => TokenID::Select,
        K::From => TokenID::From,
        K::Where => TokenID::Where,
        K::Order => TokenID::Order,
        K::By => TokenID::By,
        K::Asc => TokenID::Asc,
        K::Desc => TokenID::Desc,
        K::Asof => TokenID::Asof,
        K::Not => TokenID::Not,
        K::Ever => TokenID::Ever,
        K::In => TokenID::In,
        K::Like => TokenID::Like,
        K::Under => TokenID::Under,
        K::WorkItems => TokenID::Workitems,
        K::WorkItemLinks => TokenID::Workitemlinks,
        K::And => TokenID::And,
        K::Or => TokenID::Or,
        K::Contains => TokenID::Contains,
        K::Words => TokenID::Words,
        K::LParen => TokenID::LeftParen,
        K::RParen => TokenID::RightParen,
        K::LSqBracket => TokenID::LeftBrack,
        K::RSqBracket => TokenID::RightBrack,
        K::Comma => TokenID::Comma,
        K::Equals => TokenID::Equals,
        K::NotEquals => TokenID::NotEquals,
        K::GreaterThan => TokenID::GreaterThan,
        K::LessThan => TokenID::LessThan,
        K::GreaterOrEq => TokenID::GreaterOrEq,
        K::LessOrEq => TokenID::LessOrEq,
        K::Identifier => TokenID::Ident,
        K::Number => TokenID::Number,
        K::String | K::NonterminatingString => TokenID::String,
        K::Variable => TokenID::Variable,
        K::Eof => TokenID::End,
        K::UnexpectedToken => return None,
    })
}

/// Token kind a terminal stands for; `None` for the `error` pseudo-terminal
/// and for nonterminals.
fn token_kind(id: TokenID) -> Option<TokenKind> {
    use TokenKind as K;
    Some(match id {
        TokenID::Error => return None,
        TokenID::Select => K::Select,
        TokenID::From => K::From,
        TokenID::Where => K::Where,
        TokenID::Order => K::Order,
        TokenID::By => K::By,
        TokenID::Asc => K::Asc,
        TokenID::Desc => K::Desc,
        TokenID::Asof => K::Asof,
        TokenID::Not => K::Not,
        TokenID::Ever => K::Ever,
        TokenID::In => K::In,
        TokenID::Like => K::Like,
        TokenID::Under => K::Under,
        TokenID::Workitems => K::WorkItems,
        TokenID::Workitemlinks => K::WorkItemLinks,
        TokenID::And => K::And,
        TokenID::Or => K::Or,
        TokenID::Contains => K::Contains,
        TokenID::Words => K::Words,
        TokenID::LeftParen => K::LParen,
        TokenID::RightParen => K::RParen,
        TokenID::LeftBrack => K::LSqBracket,
        TokenID::RightBrack => K::RSqBracket,
        TokenID::Comma => K::Comma,
        TokenID::Equals => K::Equals,
        TokenID::NotEquals => K::NotEquals,
        TokenID::GreaterThan => K::GreaterThan,
        TokenID::LessThan => K::LessThan,
        TokenID::GreaterOrEq => K::GreaterOrEq,
        TokenID::LessOrEq => K::LessOrEq,
        TokenID::Ident => K::Identifier,
        TokenID::Number => K::Number,
        TokenID::String => K::String,
        TokenID::Variable => K::Variable,
        TokenID::End => K::Eof,
        _ => return None,
    })
}

/// Whether `term` would eventually be shifted (or accepted) from the stack
/// `states`, following the reductions the table makes on it.
fn viable(states: &[usize], term: TokenID) -> bool {
    let mut stack = states.to_vec();
    for _ in 0..=N_STATES + N_PRODUCTIONS {
        let state = stack.last().copied().unwrap_or(START_STATE);
        match TAB[state][usize::from(term)] {
            Action::Shift(_) | Action::Accept => return true,
            Action::Reduce(prod) => {
                let Prod(lhs, len) = PRODS[usize::from(prod)];
                if len >= stack.len() {
                    return false;
                }
                stack.truncate(stack.len() - len);
                let top = stack.last().copied().unwrap_or(START_STATE);
                let Action::Goto(next) = TAB[top][usize::from(lhs)] else {
                    return false;
                };
                stack.push(usize::from(next));
            }
            Action::Error | Action::Goto(_) => return false,
        }
    }
    false
}

/// Terminals the parser could continue with from `states`, described for a
/// diagnostic.
///
/// SLR reduce entries cover the whole FOLLOW set of a nonterminal, so each
/// candidate is checked by running the reductions it would trigger.
fn expected_in(states: &[usize]) -> Vec<String> {
    TERMINALS
        .iter()
        .filter(|&&t| viable(states, t))
        .filter_map(|&t| token_kind(t).map(|kind| kind.to_string()))
        .collect()
}

fn join_alternatives(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} or {last}", init.join(", ")),
    }
}

fn describe_found(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier | TokenKind::Number | TokenKind::String | TokenKind::Variable => {
            format!("{} `{}`", token.kind, token.text())
        }
        kind => kind.to_string(),
    }
}

fn syntax_error(states: &[usize], token: &Token) -> Diagnostic {
    let expected = expected_in(states);
    let mut message = format!("unexpected {}", describe_found(token));
    if !expected.is_empty() {
        message.push_str("; expected ");
        message.push_str(&join_alternatives(&expected));
    }
    Diagnostic::new(DiagnosticKind::UnexpectedToken, token.span).with_message(message)
}

/// Parser stack: `states` always holds one more entry than `nodes`.
struct ParserCtx {
    states: Vec<usize>,
    nodes: Vec<Node>,
    stats: ParserStats,
}

impl ParserCtx {
    fn new() -> Self {
        Self {
            states: vec![START_STATE],
            nodes: Vec::new(),
            stats: ParserStats::default(),
        }
    }

    fn state(&self) -> usize {
        self.states.last().copied().unwrap_or(START_STATE)
    }

    fn push(&mut self, state: usize, node: Node) {
        self.states.push(state);
        self.nodes.push(node);
    }

    fn pop(&mut self) -> Option<Node> {
        self.states.pop();
        self.nodes.pop()
    }

    fn dump_state(&self, incoming: &Token) {
        let mut output = String::new();
        for (state, node) in self.states.iter().zip(self.nodes.iter()) {
            output.push_str(&format!("<{state}> {}  ", node.name()));
        }
        output.push_str(&format!("<{}>  <-  {:?}", self.state(), incoming.kind));
        log::trace!("{}", output);
    }
}

/// One parse pass over a token stream.
///
/// All mutable state lives here, so concurrent parses never interact; the
/// table is a shared constant.
pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    eof: Token,
    ctx: ParserCtx,
    diagnostics: Vec<Diagnostic>,
    skipped: Vec<Span>,
    dropped_fields: Vec<FieldRef>,
    shifted_since_error: bool,
    last_recovery: Option<(usize, usize)>,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        let end = tokens
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::Eof)
            .map_or(Span::default(), |t| Span::at(t.span.end));
        Self {
            tokens,
            pos: 0,
            eof: Token::eof(end),
            ctx: ParserCtx::new(),
            diagnostics: Vec::new(),
            skipped: Vec::new(),
            dropped_fields: Vec::new(),
            shifted_since_error: true,
            last_recovery: None,
        }
    }

    /// Current token; a missing end marker is supplied past the last token.
    fn current(&self) -> Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof).clone()
    }

    fn report_lexical_errors(&mut self) {
        for token in self.tokens.iter().take_while(|t| t.kind != TokenKind::Eof) {
            let kind = match token.kind {
                TokenKind::UnexpectedToken => DiagnosticKind::UnexpectedCharacter,
                TokenKind::NonterminatingString => DiagnosticKind::UnterminatedString,
                _ => continue,
            };
            self.diagnostics
                .push(Diagnostic::new(kind, token.span).with_detail(format!("`{}`", token.text())));
        }
    }

    pub fn parse(mut self) -> ParseResult {
        self.report_lexical_errors();
        let statement = match self.run() {
            Ok(statement) => statement,
            Err(err) => {
                log::error!("parser table inconsistency: {err}");
                let span = self.current().span;
                self.diagnostics
                    .push(Diagnostic::new(DiagnosticKind::Internal, span).with_detail(err));
                None
            }
        };
        diagnostics::sort_by_position(&mut self.diagnostics);
        self.skipped.sort_by_key(|span| span.start);
        log::debug!("parse finished: {:?}", self.ctx.stats);
        ParseResult {
            statement,
            diagnostics: self.diagnostics,
            skipped: self.skipped,
            dropped_fields: self.dropped_fields,
            stats: self.ctx.stats,
        }
    }

    fn run(&mut self) -> Result<Option<SelectStatement>, ParserError> {
        let mut seen = usize::MAX;
        loop {
            let token = self.current();
            if seen != self.pos {
                seen = self.pos;
                self.ctx.stats.tokens += 1;
            }
            let Some(term) = terminal(token.kind) else {
                self.skipped.push(token.span);
                self.pos += 1;
                continue;
            };
            if log::log_enabled!(log::Level::Trace) {
                self.ctx.dump_state(&token);
            }
            let state = self.ctx.state();
            match TAB[state][usize::from(term)] {
                Action::Shift(next) => {
                    log::trace!("Shift {next}");
                    self.ctx.push(usize::from(next), Node::Token(token));
                    self.ctx.stats.shifts += 1;
                    self.shifted_since_error = true;
                    self.pos += 1;
                }
                Action::Reduce(prod) => {
                    self.reduce(usize::from(prod))?;
                }
                Action::Accept => {
                    log::trace!("Accept");
                    return match self.ctx.nodes.pop() {
                        Some(Node::Query(statement)) => Ok(statement),
                        _ => Err(ParserError::EmptyAccept),
                    };
                }
                Action::Error => {
                    if !self.recover(&token, term) {
                        self.skip_rest();
                        return Ok(None);
                    }
                }
                Action::Goto(_) => return Err(ParserError::UnexpectedGoto(state)),
            }
        }
    }

    fn reduce(&mut self, idx: usize) -> Result<(), ParserError> {
        let prod = ProdID::try_from(idx).map_err(|_| ParserError::InvalidProduction(idx))?;
        let Prod(lhs, len) = PRODS[idx];
        log::trace!("Reduce {prod:?}({idx})");
        let Some(split) = self.ctx.nodes.len().checked_sub(len) else {
            return Err(ParserError::StackUnderflow(prod));
        };
        let nodes = self.ctx.nodes.split_off(split);
        self.ctx.states.truncate(split + 1);
        let node = build(prod, nodes)?;
        let state = self.ctx.state();
        let Action::Goto(next) = TAB[state][usize::from(lhs)] else {
            return Err(ParserError::MissingGoto { state, lhs });
        };
        self.ctx.push(usize::from(next), node);
        self.ctx.stats.reductions += 1;
        Ok(())
    }

    /// Handles a table error on `token`. Returns `false` when the stack has
    /// nothing left to recover into.
    fn recover(&mut self, token: &Token, term: TokenID) -> bool {
        let at_end = term == TokenID::End;
        if !self.shifted_since_error && !at_end {
            log::debug!("discarding {} at {}", token.kind, token.span);
            self.skipped.push(token.span);
            self.ctx.stats.discarded += 1;
            self.pos += 1;
            return true;
        }
        if self.shifted_since_error {
            let diagnostic = syntax_error(&self.ctx.states, token);
            log::debug!("{diagnostic}");
            self.diagnostics.push(diagnostic);
        }
        self.shifted_since_error = false;
        self.ctx.stats.recoveries += 1;

        let limit = match self.last_recovery {
            Some((pos, depth)) if pos == self.pos => Some(depth),
            _ => None,
        };
        let mut popped = Vec::new();
        while !self.ctx.states.is_empty() {
            let depth = self.ctx.states.len();
            if limit.is_none_or(|limit| depth < limit) {
                if let Action::Shift(next) = TAB[self.ctx.state()][usize::from(TokenID::Error)] {
                    log::debug!("recovering in state {} at depth {depth}", self.ctx.state());
                    self.drop_nodes(popped);
                    self.ctx
                        .push(usize::from(next), Node::Error(Span::at(token.span.start)));
                    self.last_recovery = Some((self.pos, depth));
                    return true;
                }
            }
            popped.extend(self.ctx.pop());
        }
        self.drop_nodes(popped);
        false
    }

    /// Records what recovery popped off the stack, given top first.
    fn drop_nodes(&mut self, popped: Vec<Node>) {
        for node in popped.iter().rev() {
            node.collect_fields(&mut self.dropped_fields);
            if let Some(span) = node.span().filter(|span| !span.is_empty()) {
                log::debug!("dropping {} at {span}", node.name());
                self.skipped.push(span);
            }
        }
    }

    /// Skips everything left once no recovery point remains.
    fn skip_rest(&mut self) {
        let rest = self.tokens.iter().skip(self.pos);
        self.skipped.extend(
            rest.filter(|t| t.kind != TokenKind::Eof)
                .map(|t| t.span),
        );
        self.pos = self.tokens.len();
    }
}

/// Parses a token stream produced by the tokenizer.
pub fn parse(tokens: &[Token]) -> ParseResult {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span;
    use crate::tokenizer::tokenize;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn parse_text(text: &str) -> ParseResult {
        init_logger();
        parse(&tokenize(&text.lines().collect::<Vec<_>>()))
    }

    fn sexpr(text: &str) -> std::string::String {
        let result = parse_text(text);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        result.statement.map(|s| s.to_sexpr()).unwrap_or_default()
    }

    #[test]
    fn full_query() {
        assert_eq!(
            sexpr(
                "SELECT [ID], [Work Item Type], System.Title FROM workitems \
                 WHERE [Team Project] = @project AND [State] <> 'Closed' \
                 ORDER BY [System.ChangedDate] DESC, [ID] ASOF '2020-01-01'"
            ),
            "(select ([ID] [Work Item Type] [System.Title]) workitems \
             (where (and (= [Team Project] @project) (<> [State] 'Closed'))) \
             (order [System.ChangedDate]:desc [ID]) (asof '2020-01-01'))"
        );
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            sexpr("select a from workitems where a = 1 or b = 2 and c = 3 or d = 4"),
            "(select ([a]) workitems (where (or (or (= [a] 1) (and (= [b] 2) (= [c] 3))) (= [d] 4))))"
        );
        assert_eq!(
            sexpr("select a from workitems where not a = 1 and (b = 2 or c = 3)"),
            "(select ([a]) workitems (where (and (not (= [a] 1)) (or (= [b] 2) (= [c] 3)))))"
        );
    }

    #[test]
    fn every_predicate_form() {
        assert_eq!(
            sexpr(
                "select a from workitemlinks where a in (1, 'x', @me) and b not in (2) \
                 and c contains 'x' and d not contains 'y' and e contains words 'z' \
                 and f not contains words 'w' and g under 'p' and h not under 'q' \
                 and i like 'k%' and j not like 'l%' and ever k = 'm' and l >= 1.5"
            ),
            "(select ([a]) workitemlinks (where (and (and (and (and (and (and (and (and (and (and (and \
             (in [a] 1 'x' @me) (not-in [b] 2)) (contains [c] 'x')) (not-contains [d] 'y')) \
             (contains-words [e] 'z')) (not-contains-words [f] 'w')) (under [g] 'p')) \
             (not-under [h] 'q')) (like [i] 'k%')) (not like [j] 'l%')) (ever = [k] 'm')) \
             (>= [l] 1.5))))"
        );
    }

    #[test]
    fn spans_cover_the_source() {
        let result = parse_text("SELECT [ID]\nFROM workitems\nWHERE ([ID] = 1)");
        let stmt = result.statement.unwrap();
        assert_eq!(stmt.span, span!(0, 0, 2, 16));
        assert_eq!(stmt.fields.fields[0].span, span!(0, 7, 0, 11));
        let cond = stmt.where_clause.unwrap();
        assert_eq!(cond.span(), span!(2, 6, 2, 16));
        assert_eq!(cond.field().map(|f| f.span), Some(span!(2, 7, 2, 11)));
    }

    #[test]
    fn missing_field_list_reports_once_and_continues() {
        let result = parse_text("SELECT FROM workitems");
        assert_eq!(result.diagnostics.len(), 1);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.kind, DiagnosticKind::UnexpectedToken);
        assert_eq!(diag.range, span!(0, 7, 0, 11));
        assert!(diag.message.starts_with("unexpected `FROM`; expected"), "{}", diag.message);
        let stmt = result.statement.unwrap();
        assert!(stmt.fields.fields.is_empty());
        assert!(stmt.fields.span.is_empty());
        assert!(matches!(stmt.source, Source::WorkItems(_)));
    }

    #[test]
    fn separate_errors_are_all_reported() {
        let result = parse_text("select [A], from workitems order by");
        let ranges: Vec<_> = result.diagnostics.iter().map(|d| d.range).collect();
        assert_eq!(ranges, vec![span!(0, 12, 0, 16), span!(0, 35, 0, 35)]);
        assert!(result.diagnostics[1].message.starts_with("unexpected end of query"));
        let stmt = result.statement.unwrap();
        assert_eq!(stmt.order_by.map(|o| o.items.len()), Some(0));
    }

    #[test]
    fn stray_parenthesis_is_skipped() {
        let result = parse_text("select [A] from workitems where [A] = 1 ) order by [A]");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].range, span!(0, 40, 0, 41));
        assert_eq!(result.skipped, vec![span!(0, 32, 0, 39), span!(0, 40, 0, 41)]);
        let stmt = result.statement.unwrap();
        assert!(matches!(stmt.where_clause, Some(BooleanExpression::Error(_))));
        assert_eq!(stmt.order_by.map(|o| o.items.len()), Some(1));
    }

    #[test]
    fn popped_condition_is_skipped_with_its_fields() {
        let result = parse_text("select [ID] from workitems where [Bogus] = 1 )");
        assert_eq!(result.skipped, vec![span!(0, 33, 0, 44), span!(0, 45, 0, 46)]);
        let dropped: Vec<_> = result.dropped_fields.iter().map(|f| (f.name.as_str(), f.span)).collect();
        assert_eq!(dropped, vec![("Bogus", span!(0, 33, 0, 40))]);
        let stmt = result.statement.unwrap();
        assert_eq!(stmt.to_sexpr(), "(select ([ID]) workitems (where <error>))");
    }

    #[test]
    fn popped_sort_item_is_skipped_with_its_field() {
        let result = parse_text("select [ID] from workitems order by [Bogus] )");
        assert_eq!(
            result.skipped,
            vec![span!(0, 36, 0, 37), span!(0, 37, 0, 42), span!(0, 42, 0, 43), span!(0, 44, 0, 45)]
        );
        let dropped: Vec<_> = result.dropped_fields.iter().map(|f| (f.name.as_str(), f.span)).collect();
        assert_eq!(dropped, vec![("Bogus", span!(0, 37, 0, 42))]);
        assert_eq!(result.statement.unwrap().order_by.map(|o| o.items.len()), Some(0));
    }

    #[test]
    fn hints_only_list_tokens_that_can_follow() {
        let result = parse_text("select [ID] from workitems order by [x] )");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(
            result.diagnostics[0].message,
            "unexpected `)`; expected `,`, `ASC`, `DESC`, `ASOF` or end of query"
        );
    }

    #[test]
    fn every_token_is_in_the_tree_or_skipped() {
        for text in [
            "select [A], from workitems order by",
            "select [A] from workitems where ([A] = 1 and not",
            "select [A] from workitems where [A] = = 1 ) and [B] in (1, ) order by [C] ( desc",
            "select [A] [B] from workitems where [A] contains words ) asof",
            "hello select [A] from workitems",
        ] {
            let result = parse_text(text);
            let mut ranges = result.skipped.clone();
            let mut keywords = Vec::new();
            if let Some(stmt) = &result.statement {
                keywords = vec![TokenKind::Select, TokenKind::From, TokenKind::Where];
                ranges.push(stmt.fields.span);
                ranges.push(stmt.source.span());
                ranges.extend(stmt.where_clause.as_ref().map(BooleanExpression::span));
                ranges.extend(stmt.order_by.as_ref().map(|o| o.span));
                ranges.extend(stmt.as_of.as_ref().map(|c| c.span));
            }
            for token in tokenize(&[text]).iter().filter(|t| t.kind != TokenKind::Eof) {
                assert!(
                    keywords.contains(&token.kind) || ranges.iter().any(|r| r.contains(&token.span)),
                    "{token:?} lost in {text:?}"
                );
            }
        }
    }

    #[test]
    fn bad_value_keeps_later_conditions() {
        let result = parse_text("select a from workitems where a = = 1 and b under 'x' order by a desc");
        assert_eq!(result.diagnostics.len(), 1);
        let stmt = result.statement.unwrap();
        let sexpr = stmt.to_sexpr();
        assert!(sexpr.contains("(under [b] 'x')"), "{sexpr}");
        assert!(sexpr.ends_with("(order [a]:desc))"), "{sexpr}");
    }

    #[test]
    fn not_a_query_at_all() {
        let result = parse_text("hello world");
        assert!(result.statement.is_none());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].range, span!(0, 0, 0, 5));
        assert_eq!(result.skipped, vec![span!(0, 0, 0, 5), span!(0, 6, 0, 11)]);
    }

    #[test]
    fn empty_input() {
        let result = parse_text("");
        assert!(result.statement.is_none());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].range, Span::default());
        assert!(result.diagnostics[0].message.starts_with("unexpected end of query; expected `SELECT`"));
    }

    #[test]
    fn lexical_errors_do_not_stop_parsing() {
        let result = parse_text("select [A] # from workitems where [Title] = 'abc");
        let kinds: Vec<_> = result.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::UnexpectedCharacter, DiagnosticKind::UnterminatedString]
        );
        assert!(result.diagnostics.iter().all(|d| !d.is_error()));
        assert_eq!(result.skipped, vec![span!(0, 11, 0, 12)]);
        let stmt = result.statement.unwrap();
        assert_eq!(
            stmt.to_sexpr(),
            "(select ([A]) workitems (where (= [Title] 'abc')))"
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = "select [A], from workitemlinks where (a = 1 or and b in ( order by";
        let a = parse_text(text);
        let b = parse_text(text);
        assert_eq!(a.statement, b.statement);
        assert_eq!(a.diagnostics, b.diagnostics);
        assert_eq!(a.skipped, b.skipped);
        assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn stats_count_the_work() {
        let result = parse_text("select a from workitems");
        assert_eq!(result.stats.shifts, 4);
        assert_eq!(result.stats.tokens, 5);
        assert_eq!(result.stats.recoveries, 0);
        assert!(result.stats.reductions >= 6);
    }

    #[test]
    fn missing_end_marker_is_tolerated() {
        let mut tokens = tokenize(&["select a from workitems"]);
        tokens.pop();
        let result = parse(&tokens);
        assert!(result.diagnostics.is_empty());
        assert!(result.statement.is_some());
    }
}
