//! Production parser over grammar tokens, built with [`chumsky`].

use super::lexer::Token;
use chumsky::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Term(usize),
    NonTerm(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Production {
    pub label: Option<usize>,
    pub lhs: usize,
    pub rhs: Vec<Symbol>,
}

/// One line of the grammar: a production, or `None` for a blank line.
pub fn line<'a>() -> impl Parser<'a, &'a [Token], Option<Production>> + Clone {
    let symbol = select! {
        Token::Term(t) => Symbol::Term(t),
        Token::NonTerm(n) => Symbol::NonTerm(n),
    }
    .labelled("symbol");

    let lhs = select! { Token::NonTerm(n) => n }.labelled("lhs");
    let arrow = select! { Token::Arrow => () }.labelled("->");
    let newline = select! { Token::Newline => () }.labelled("newline");
    let label = select! { Token::Label(l) => l }.labelled("label");

    let production = label
        .or_not()
        .then(lhs)
        .then_ignore(arrow)
        .then(symbol.repeated().collect::<Vec<_>>())
        .then_ignore(newline.clone())
        .map(|((label, lhs), rhs)| Some(Production { label, lhs, rhs }));

    production.or(newline.to(None))
}

/// The whole grammar: any number of lines.
pub fn parser<'a>() -> impl Parser<'a, &'a [Token], Vec<Production>> {
    line()
        .repeated()
        .collect::<Vec<_>>()
        .map(|lines| lines.into_iter().flatten().collect())
}

/// 1-based number of the first line that does not parse on its own.
pub fn first_bad_line(tokens: &[Token]) -> usize {
    let parser = line();
    tokens
        .split_inclusive(|t| *t == Token::Newline)
        .position(|chunk| parser.parse(chunk).into_result().is_err())
        .map_or(1, |idx| idx + 1)
}
