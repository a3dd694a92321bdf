use std::fmt;
use thiserror::Error;

/// A table cell that received more than one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Automaton state whose row holds the conflict.
    pub state: usize,
    /// Name of the lookahead terminal.
    pub lookahead: String,
    /// The competing actions, e.g. `shift 14` and `reduce columns1`.
    pub actions: Vec<String>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state {}, lookahead `{}`: {}",
            self.state,
            self.lookahead,
            self.actions.join(" / ")
        )
    }
}

fn list_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("\n  {c}"))
        .collect()
}

/// Reasons a grammar cannot be compiled into a parse table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// A character sequence that is not part of the grammar notation.
    #[error("line {line}: unexpected text {text:?}")]
    Lex { line: usize, text: String },

    /// A line that is neither blank, a comment, nor `label: Lhs -> rhs`.
    #[error("line {line}: malformed production")]
    Syntax { line: usize },

    #[error("grammar defines no productions")]
    Empty,

    #[error("nonterminal `{0}` is used but never defined")]
    UndefinedNonterminal(String),

    #[error("production label `{0}` is used more than once")]
    DuplicateLabel(String),

    /// Two distinct names would produce the same generated enum variant.
    #[error("`{first}` and `{second}` both generate the identifier `{ident}`")]
    IdentifierClash {
        first: String,
        second: String,
        ident: String,
    },

    #[error("grammar is not SLR(1), {} conflicting table entries:{}", .0.len(), list_conflicts(.0))]
    Conflicts(Vec<Conflict>),
}
