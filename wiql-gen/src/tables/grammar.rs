//! Augmented grammar in the flat encoding the table builder works on.

use super::error::GrammarError;
use super::lexer::{self, SymbolContext};
use super::parser::{self, Production, Symbol};
use chumsky::Parser;
use std::collections::HashMap;

/// Name of the augmented start nonterminal and its production label.
pub const START: &str = "Start";
/// Name of the end-of-input terminal appended after all grammar terminals.
pub const END: &str = "end";

/// A grammar ready for table construction.
///
/// Symbols are numbered with nonterminals first (`0` is the augmented
/// `Start`) followed by terminals (the last one is [`END`]). Each production
/// is stored as `[lhs, rhs...]` over those numbers.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub nonterminals: Vec<String>,
    pub terminals: Vec<String>,
    pub labels: Vec<String>,
    pub prods: Vec<Vec<usize>>,
}

pub fn capitalize_first(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
    }
}

impl Grammar {
    /// Parses and validates grammar text, adding `Start -> <first lhs>`.
    pub fn parse(source: &str) -> Result<Self, GrammarError> {
        let mut ctx = SymbolContext::default();
        ctx.labels.intern("start");
        ctx.nonterms.intern(START);
        let tokens = lexer::tokenize(source, &mut ctx)?;
        let mut prods = parser::parser()
            .parse(tokens.as_slice())
            .into_result()
            .map_err(|_| GrammarError::Syntax {
                line: parser::first_bad_line(&tokens),
            })?;
        let Some(first) = prods.first() else {
            return Err(GrammarError::Empty);
        };
        prods.insert(
            0,
            Production {
                label: Some(0),
                lhs: 0,
                rhs: vec![Symbol::NonTerm(first.lhs)],
            },
        );
        ctx.terms.intern(END);

        let nonterminals = ctx.nonterms.names().to_vec();
        let terminals = ctx.terms.names().to_vec();
        let n_nonterms = nonterminals.len();

        let mut defined = vec![false; n_nonterms];
        for p in &prods {
            defined[p.lhs] = true;
        }
        if let Some(idx) = defined.iter().position(|d| !d) {
            return Err(GrammarError::UndefinedNonterminal(nonterminals[idx].clone()));
        }

        let mut labels = Vec::with_capacity(prods.len());
        let mut used = vec![false; ctx.labels.len()];
        for (i, p) in prods.iter().enumerate() {
            match p.label {
                Some(l) if used[l] => {
                    let name = ctx.labels.name(l).unwrap_or_default();
                    return Err(GrammarError::DuplicateLabel(name.to_owned()));
                }
                Some(l) => {
                    used[l] = true;
                    labels.push(ctx.labels.name(l).unwrap_or_default().to_owned());
                }
                None => labels.push(format!("rule{i}")),
            }
        }

        check_identifiers(nonterminals.iter().chain(terminals.iter()))?;
        check_identifiers(labels.iter())?;

        let prods = prods
            .iter()
            .map(|p| {
                std::iter::once(p.lhs)
                    .chain(p.rhs.iter().map(|sym| match *sym {
                        Symbol::NonTerm(i) => i,
                        Symbol::Term(i) => i + n_nonterms,
                    }))
                    .collect()
            })
            .collect();

        Ok(Self {
            nonterminals,
            terminals,
            labels,
            prods,
        })
    }

    pub fn n_nonterminals(&self) -> usize {
        self.nonterminals.len()
    }

    pub fn n_terminals(&self) -> usize {
        self.terminals.len()
    }

    pub fn n_symbols(&self) -> usize {
        self.nonterminals.len() + self.terminals.len()
    }

    pub fn is_nonterminal(&self, sym: usize) -> bool {
        sym < self.nonterminals.len()
    }

    /// Symbol number of [`END`].
    pub fn end(&self) -> usize {
        self.n_symbols() - 1
    }

    pub fn symbol_name(&self, sym: usize) -> &str {
        match sym.checked_sub(self.nonterminals.len()) {
            None => &self.nonterminals[sym],
            Some(t) => &self.terminals[t],
        }
    }

    /// All symbol names in symbol-number order.
    pub fn symbol_names(&self) -> Vec<&str> {
        self.nonterminals
            .iter()
            .chain(self.terminals.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn lhs(&self, prod: usize) -> usize {
        self.prods[prod][0]
    }

    pub fn rhs(&self, prod: usize) -> &[usize] {
        &self.prods[prod][1..]
    }
}

fn check_identifiers<'a>(names: impl Iterator<Item = &'a String>) -> Result<(), GrammarError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for name in names {
        let ident = capitalize_first(name);
        if let Some(first) = seen.insert(ident.clone(), name) {
            return Err(GrammarError::IdentifierClash {
                first: first.to_owned(),
                second: name.clone(),
                ident,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn augments_with_start_and_end() {
        let g = Grammar::parse("list: List -> item\nlist2: List -> List comma item\n").unwrap();
        assert_eq!(g.nonterminals, ["Start", "List"]);
        assert_eq!(g.terminals, ["item", "comma", "end"]);
        assert_eq!(g.labels, ["start", "list", "list2"]);
        assert_eq!(g.prods[0], vec![0, 1]);
        assert_eq!(g.prods[2], vec![1, 1, 3, 2]);
        assert_eq!(g.symbol_name(g.end()), "end");
        assert_eq!(g.rhs(2), &[1, 3, 2]);
    }

    #[test]
    fn unlabelled_rules_are_numbered() {
        let g = Grammar::parse("A -> b\nA -> c").unwrap();
        assert_eq!(g.labels, ["start", "rule1", "rule2"]);
    }

    #[test]
    fn rejects_undefined_nonterminal() {
        let err = Grammar::parse("a: A -> B c\n").unwrap_err();
        assert_eq!(err, GrammarError::UndefinedNonterminal("B".to_owned()));
    }

    #[test]
    fn rejects_reused_label() {
        let err = Grammar::parse("a: A -> b\na: A -> c\n").unwrap_err();
        assert_eq!(err, GrammarError::DuplicateLabel("a".to_owned()));
    }

    #[test]
    fn rejects_terminal_shadowing_nonterminal() {
        let err = Grammar::parse("q: Query -> query\n").unwrap_err();
        assert!(matches!(err, GrammarError::IdentifierClash { ident, .. } if ident == "Query"));
    }

    #[test]
    fn rejects_empty_and_malformed_text() {
        assert_eq!(Grammar::parse("-- nothing\n").unwrap_err(), GrammarError::Empty);
        assert_eq!(
            Grammar::parse("A -> b\nc -> d\n").unwrap_err(),
            GrammarError::Syntax { line: 2 }
        );
    }
}
