use super::error::GrammarError;
use super::grammar::{Grammar, capitalize_first};
use super::slr::{self, Act, Automaton, Tab};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::Path;

/// A conflict-free SLR(1) table together with the data it was built from.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    grammar: Grammar,
    automaton: Automaton,
    first: Vec<BTreeSet<usize>>,
    nullable: Vec<bool>,
    follow: Vec<BTreeSet<usize>>,
    tab: Tab,
}

/// Compiles grammar text into a parse table.
///
/// Fails with [`GrammarError::Conflicts`] listing every conflicting cell when
/// the grammar is not SLR(1).
pub fn compile(source: &str) -> Result<CompiledGrammar, GrammarError> {
    let grammar = Grammar::parse(source)?;
    let automaton = Automaton::build(&grammar);
    let (first, nullable) = slr::first_sets(&grammar);
    let follow = slr::follow_sets(&grammar, &first, &nullable);
    let tab = slr::construct_table(&grammar, &automaton, &follow);
    let conflicts = slr::conflicts(&grammar, &tab);
    if !conflicts.is_empty() {
        return Err(GrammarError::Conflicts(conflicts));
    }
    log::debug!(
        "compiled grammar: {} productions, {} symbols, {} states",
        grammar.prods.len(),
        grammar.n_symbols(),
        automaton.len()
    );
    Ok(CompiledGrammar {
        grammar,
        automaton,
        first,
        nullable,
        follow,
        tab,
    })
}

fn minimum_unsigned_type(n: usize) -> &'static str {
    if n <= u8::MAX as usize + 1 {
        "u8"
    } else if n <= u16::MAX as usize + 1 {
        "u16"
    } else {
        "u32"
    }
}

impl CompiledGrammar {
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn n_states(&self) -> usize {
        self.automaton.len()
    }

    /// The single action for `state` on the symbol called `name`, if any.
    pub fn action(&self, state: usize, name: &str) -> Option<Act> {
        let sym = self.grammar.symbol_names().iter().position(|s| *s == name)?;
        self.tab.get(state)?.get(sym)?.first().copied()
    }

    /// Writes the table as Rust source.
    ///
    /// With `debug` the leading comment also lists the LR(0) item sets and the
    /// FIRST/FOLLOW sets.
    pub fn write_rust<W: Write>(&self, out: &mut W, debug: bool) -> io::Result<()> {
        let g = &self.grammar;
        let names = g.symbol_names();
        let n_states = self.automaton.len();
        let n_prods = g.prods.len();

        writeln!(out, "/*")?;
        writeln!(out, "Produced by wiql-gen, the WIQL grammar table compiler.\n")?;
        slr::write_prods(out, g)?;
        if debug {
            writeln!(out)?;
            slr::write_states(out, g, &self.automaton)?;
            slr::write_sets(out, g, &self.first, Some(&self.nullable))?;
            writeln!(out)?;
            slr::write_sets(out, g, &self.follow, None)?;
        }
        writeln!(out, "*/\n")?;

        writeln!(out, "use num_enum::{{IntoPrimitive, TryFromPrimitive}};\n")?;
        writeln!(out, "pub const N_TOKENS: usize = {};", g.n_symbols())?;
        writeln!(out, "pub const N_NONTERMINALS: usize = {};", g.n_nonterminals())?;
        writeln!(out, "pub const N_TERMINALS: usize = {};", g.n_terminals())?;
        writeln!(out, "pub const N_PRODUCTIONS: usize = {n_prods};")?;
        writeln!(out, "pub const N_STATES: usize = {n_states};\n")?;

        writeln!(
            out,
            "#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]"
        )?;
        writeln!(out, "#[repr(usize)]\npub enum ProdID {{")?;
        for (i, label) in g.labels.iter().enumerate() {
            writeln!(out, "    {} = {i},", capitalize_first(label))?;
        }
        writeln!(out, "}}\n")?;

        writeln!(out, "pub const PRODUCTION_LABELS: [&str; N_PRODUCTIONS] = [")?;
        for (i, label) in g.labels.iter().enumerate() {
            writeln!(out, "    {label:?}, // {i}")?;
        }
        writeln!(out, "];\n")?;

        // No TryFromPrimitive here: a terminal named `error` would clash with
        // the trait's associated `Error` type.
        writeln!(out, "#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive)]")?;
        writeln!(out, "#[repr(usize)]\npub enum TokenID {{")?;
        for (i, name) in names.iter().enumerate() {
            if i == 0 {
                writeln!(out, "    // Nonterminals:")?;
            }
            if i == g.n_nonterminals() {
                writeln!(out, "\n    // Terminals:")?;
            }
            writeln!(out, "    {} = {i},", capitalize_first(name))?;
        }
        writeln!(out, "}}\n")?;

        writeln!(out, "pub const TOKEN_LABELS: [&str; N_TOKENS] = [")?;
        for (i, name) in names.iter().enumerate() {
            writeln!(out, "    {name:?}, // {i}")?;
        }
        writeln!(out, "];\n")?;

        writeln!(out, "pub const TERMINALS: [TokenID; N_TERMINALS] = [")?;
        for name in &g.terminals {
            writeln!(out, "    TokenID::{},", capitalize_first(name))?;
        }
        writeln!(out, "];\n")?;

        writeln!(out, "#[derive(Clone, Copy, Debug)]\npub struct Prod(")?;
        writeln!(out, "    pub TokenID, // left-hand side")?;
        writeln!(out, "    pub usize,   // right-hand side length")?;
        writeln!(out, ");\n")?;
        writeln!(out, "pub const PRODS: [Prod; N_PRODUCTIONS] = [")?;
        for (i, prod) in g.prods.iter().enumerate() {
            writeln!(
                out,
                "    Prod(TokenID::{}, {}), // {i}",
                capitalize_first(names[prod[0]]),
                prod.len() - 1
            )?;
        }
        writeln!(out, "];\n")?;

        let state_ty = minimum_unsigned_type(n_states);
        writeln!(out, "#[derive(Clone, Copy, Debug, PartialEq, Eq)]\npub enum Action {{")?;
        writeln!(out, "    Error,")?;
        writeln!(out, "    Accept,")?;
        writeln!(out, "    Shift({state_ty}),")?;
        writeln!(out, "    Reduce({}),", minimum_unsigned_type(n_prods))?;
        writeln!(out, "    Goto({state_ty}),")?;
        writeln!(out, "}}\n")?;

        writeln!(out, "pub const START_STATE: usize = 0;\n")?;
        writeln!(out, "pub const TAB: [[Action; N_TOKENS]; N_STATES] = [")?;
        for (i, row) in self.tab.iter().enumerate() {
            writeln!(out, "    /* STATE {i} */ [")?;
            for (j, acts) in row.iter().enumerate() {
                let cell = match acts.first() {
                    None => "Error".to_owned(),
                    Some(Act::Accept) => "Accept".to_owned(),
                    Some(Act::Shift(s)) => format!("Shift({s})"),
                    Some(Act::Reduce(p)) => format!("Reduce({p})"),
                    Some(Act::Goto(s)) => format!("Goto({s})"),
                };
                writeln!(out, "        Action::{cell}, /* {j}({}) */", names[j])?;
            }
            writeln!(out, "    ],")?;
        }
        writeln!(out, "];")?;
        Ok(())
    }
}

/// Compiles `grammar_path` and writes `<out_dir>/<name>.rs`.
///
/// Intended for `build.rs`; conflicts and malformed rules fail the build with
/// the full list of problems.
pub fn generate<P, Q, S>(grammar_path: P, out_dir: Q, name: S, debug: bool) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    S: AsRef<str>,
{
    let grammar_path = grammar_path.as_ref();
    let source = std::fs::read_to_string(grammar_path)
        .with_context(|| format!("can't read grammar {}", grammar_path.display()))?;
    let compiled =
        compile(&source).with_context(|| format!("in grammar {}", grammar_path.display()))?;
    let out_path = out_dir.as_ref().join(format!("{}.rs", name.as_ref()));
    let mut out = io::BufWriter::new(
        std::fs::File::create(&out_path)
            .with_context(|| format!("can't create {}", out_path.display()))?,
    );
    compiled.write_rust(&mut out, debug)?;
    out.flush()?;
    log::info!(
        "wrote {} ({} states) from {}",
        out_path.display(),
        compiled.n_states(),
        grammar_path.display()
    );
    Ok(())
}
