//! Tokenizer for `.g` grammar files.
//!
//! Built on [`logos`]. Lowercase atoms are terminals, capitalized names are
//! nonterminals, `name:` is a production label and single punctuation
//! characters are terminals named through [`SYM_NAMES`]. Each symbol is
//! interned into the matching table of [`SymbolContext`] as it is seen, so
//! symbol indices follow first appearance in the file.

use super::error::GrammarError;
use super::symtab::Symtab;
use logos::Logos;

/// Symbol tables filled while lexing a grammar.
#[derive(Default, Debug)]
pub struct SymbolContext {
    pub terms: Symtab,
    pub nonterms: Symtab,
    pub labels: Symtab,
}

/// Grammar tokens handed to the production parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `name:` (index into the label table).
    Label(usize),
    NonTerm(usize),
    /// `->`
    Arrow,
    Term(usize),
    Newline,
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
enum RawToken {
    #[token("\n")]
    Newline,

    #[regex(r"--[^\n]*")]
    Comment,

    #[token("->")]
    Arrow,

    #[regex(r"[a-z][a-zA-Z0-9_]*:")]
    Label,

    #[regex(r"[a-z][a-zA-Z0-9_]*")]
    Atom,

    #[regex(r"[A-Z][a-zA-Z0-9_]*")]
    Var,

    #[regex(r###"[-~`!@#$%^&*+=|\\<>?/;\(\)\[\]{},\.'":]"###)]
    Sym,
}

/// Names given to single-character terminals.
pub const SYM_NAMES: &[(char, &str)] = &[
    ('.', "dot"),
    ('-', "minus"),
    ('~', "tilde"),
    ('`', "backtick"),
    ('!', "exclamation"),
    ('@', "at"),
    ('#', "hash"),
    ('$', "dollar"),
    ('%', "percent"),
    ('^', "caret"),
    ('&', "ampersand"),
    ('*', "asterisk"),
    ('+', "plus"),
    ('=', "equals"),
    ('|', "pipe"),
    ('\\', "backslash"),
    ('<', "lessThan"),
    ('>', "greaterThan"),
    ('?', "question"),
    ('/', "slash"),
    (';', "semicolon"),
    ('(', "leftParen"),
    (')', "rightParen"),
    ('[', "leftBrack"),
    (']', "rightBrack"),
    ('{', "leftBrace"),
    ('}', "rightBrace"),
    (',', "comma"),
    ('\'', "singleQuote"),
    ('"', "doubleQuote"),
    (':', "colon"),
];

fn sym_name(ch: char) -> Option<&'static str> {
    SYM_NAMES
        .iter()
        .find_map(|&(c, name)| (c == ch).then_some(name))
}

/// Splits grammar text into tokens, interning every symbol into `ctx`.
///
/// The returned stream always ends with [`Token::Newline`], so the last rule
/// does not need a trailing line break.
pub fn tokenize(input: &str, ctx: &mut SymbolContext) -> Result<Vec<Token>, GrammarError> {
    let mut lex = RawToken::lexer(input);
    let mut line = 1;
    let mut out = Vec::new();
    while let Some(raw) = lex.next() {
        let slice = lex.slice();
        let tok = match raw {
            Ok(RawToken::Newline) => {
                line += 1;
                Token::Newline
            }
            Ok(RawToken::Comment) => continue,
            Ok(RawToken::Arrow) => Token::Arrow,
            Ok(RawToken::Label) => Token::Label(ctx.labels.intern(&slice[..slice.len() - 1])),
            Ok(RawToken::Atom) => Token::Term(ctx.terms.intern(slice)),
            Ok(RawToken::Var) => Token::NonTerm(ctx.nonterms.intern(slice)),
            Ok(RawToken::Sym) => match slice.chars().next().and_then(sym_name) {
                Some(name) => Token::Term(ctx.terms.intern(name)),
                None => {
                    return Err(GrammarError::Lex {
                        line,
                        text: slice.to_owned(),
                    });
                }
            },
            Err(()) => {
                return Err(GrammarError::Lex {
                    line,
                    text: slice.to_owned(),
                });
            }
        };
        out.push(tok);
    }
    if out.last() != Some(&Token::Newline) {
        out.push(Token::Newline);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_with_label_and_punctuation() {
        let mut ctx = SymbolContext::default();
        let toks = tokenize("field2: Field -> [ ident ] -- bracketed\n", &mut ctx).unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Label(0),
                Token::NonTerm(0),
                Token::Arrow,
                Token::Term(0),
                Token::Term(1),
                Token::Term(2),
                Token::Newline,
            ]
        );
        assert_eq!(ctx.terms.names(), ["leftBrack", "ident", "rightBrack"]);
        assert_eq!(ctx.labels.name(0), Some("field2"));
    }

    #[test]
    fn comment_lines_keep_their_line_break() {
        let mut ctx = SymbolContext::default();
        let toks = tokenize("-- header\n\nA -> b", &mut ctx).unwrap();
        assert_eq!(toks[0], Token::Newline);
        assert_eq!(toks[1], Token::Newline);
        assert_eq!(toks.last(), Some(&Token::Newline));
    }

    #[test]
    fn stray_characters_report_their_line() {
        let mut ctx = SymbolContext::default();
        let err = tokenize("A -> b\nB -> 9c\n", &mut ctx).unwrap_err();
        assert!(matches!(err, GrammarError::Lex { line: 2, .. }));
    }
}
