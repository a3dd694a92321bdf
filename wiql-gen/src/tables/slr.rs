// LR(0) item machinery, FIRST/FOLLOW sets and SLR(1) table construction.

use super::error::Conflict;
use super::grammar::Grammar;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Write};

/// An LR(0) item: production `prod` with the dot before `rhs[dot]`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Item {
    pub prod: usize,
    pub dot: usize,
}

pub type ItemSet = BTreeSet<Item>;

impl Item {
    fn next_symbol(&self, g: &Grammar) -> Option<usize> {
        g.rhs(self.prod).get(self.dot).copied()
    }
}

/// Adds the initial items of every nonterminal that appears right after a dot.
pub fn closure(g: &Grammar, kernel: ItemSet) -> ItemSet {
    let mut set = kernel;
    let mut work: Vec<Item> = set.iter().copied().collect();
    while let Some(item) = work.pop() {
        let Some(sym) = item.next_symbol(g) else {
            continue;
        };
        if !g.is_nonterminal(sym) {
            continue;
        }
        for prod in (0..g.prods.len()).filter(|&p| g.lhs(p) == sym) {
            let new = Item { prod, dot: 0 };
            if set.insert(new) {
                work.push(new);
            }
        }
    }
    set
}

/// The item set reached from `items` on `sym`; empty when there is no move.
pub fn goto(g: &Grammar, items: &ItemSet, sym: usize) -> ItemSet {
    let kernel: ItemSet = items
        .iter()
        .filter(|item| item.next_symbol(g) == Some(sym))
        .map(|item| Item {
            prod: item.prod,
            dot: item.dot + 1,
        })
        .collect();
    if kernel.is_empty() {
        kernel
    } else {
        closure(g, kernel)
    }
}

/// Canonical LR(0) collection with its transition function.
///
/// States are numbered in discovery order, so state `0` is always the
/// closure of `Start -> . S`.
#[derive(Debug, Clone)]
pub struct Automaton {
    pub states: Vec<ItemSet>,
    pub transitions: Vec<BTreeMap<usize, usize>>,
}

impl Automaton {
    pub fn build(g: &Grammar) -> Self {
        let start = closure(g, ItemSet::from([Item { prod: 0, dot: 0 }]));
        let mut states = vec![start.clone()];
        let mut index: HashMap<ItemSet, usize> = HashMap::from([(start, 0)]);
        let mut transitions = vec![BTreeMap::new()];
        let mut next = 0;
        while next < states.len() {
            let symbols: BTreeSet<usize> = states[next]
                .iter()
                .filter_map(|item| item.next_symbol(g))
                .collect();
            for sym in symbols {
                let target = goto(g, &states[next], sym);
                let id = match index.get(&target) {
                    Some(&id) => id,
                    None => {
                        let id = states.len();
                        index.insert(target.clone(), id);
                        states.push(target);
                        transitions.push(BTreeMap::new());
                        id
                    }
                };
                transitions[next].insert(sym, id);
            }
            next += 1;
        }
        Self {
            states,
            transitions,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }
}

/// FIRST set of every symbol and whether it derives the empty string.
pub fn first_sets(g: &Grammar) -> (Vec<BTreeSet<usize>>, Vec<bool>) {
    let n = g.n_symbols();
    let mut first = vec![BTreeSet::new(); n];
    let mut nullable = vec![false; n];
    for t in g.n_nonterminals()..n {
        first[t].insert(t);
    }
    let mut changed = true;
    while changed {
        changed = false;
        for prod in &g.prods {
            let lhs = prod[0];
            let mut all_nullable = true;
            for &sym in &prod[1..] {
                if sym != lhs {
                    let add: Vec<usize> = first[sym].difference(&first[lhs]).copied().collect();
                    changed |= !add.is_empty();
                    first[lhs].extend(add);
                }
                if !nullable[sym] {
                    all_nullable = false;
                    break;
                }
            }
            if all_nullable && !nullable[lhs] {
                nullable[lhs] = true;
                changed = true;
            }
        }
    }
    (first, nullable)
}

/// FOLLOW set of every nonterminal; `end` follows the start symbol.
pub fn follow_sets(g: &Grammar, first: &[BTreeSet<usize>], nullable: &[bool]) -> Vec<BTreeSet<usize>> {
    let mut follow = vec![BTreeSet::new(); g.n_nonterminals()];
    follow[0].insert(g.end());
    let mut changed = true;
    while changed {
        changed = false;
        for prod in &g.prods {
            let lhs = prod[0];
            let rhs = &prod[1..];
            for (i, &b) in rhs.iter().enumerate() {
                if !g.is_nonterminal(b) {
                    continue;
                }
                let mut add = BTreeSet::new();
                let mut rest_nullable = true;
                for &sym in &rhs[i + 1..] {
                    add.extend(first[sym].iter().copied());
                    if !nullable[sym] {
                        rest_nullable = false;
                        break;
                    }
                }
                if rest_nullable {
                    add.extend(follow[lhs].iter().copied());
                }
                let before = follow[b].len();
                follow[b].extend(add);
                changed |= follow[b].len() != before;
            }
        }
    }
    follow
}

/// A single parse table action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Act {
    Accept,
    Shift(usize),
    Reduce(usize),
    Goto(usize),
}

/// Rows are states, columns are symbols; a cell with two or more actions is
/// a conflict.
pub type Tab = Vec<Vec<BTreeSet<Act>>>;

pub fn construct_table(g: &Grammar, automaton: &Automaton, follow: &[BTreeSet<usize>]) -> Tab {
    let mut tab: Tab = vec![vec![BTreeSet::new(); g.n_symbols()]; automaton.len()];
    for (state, items) in automaton.states.iter().enumerate() {
        for (&sym, &target) in &automaton.transitions[state] {
            let act = if g.is_nonterminal(sym) {
                Act::Goto(target)
            } else {
                Act::Shift(target)
            };
            tab[state][sym].insert(act);
        }
        for item in items.iter().filter(|item| item.dot == g.rhs(item.prod).len()) {
            if item.prod == 0 {
                tab[state][g.end()].insert(Act::Accept);
            } else {
                for &t in &follow[g.lhs(item.prod)] {
                    tab[state][t].insert(Act::Reduce(item.prod));
                }
            }
        }
    }
    tab
}

fn describe(g: &Grammar, act: Act) -> String {
    match act {
        Act::Accept => "accept".to_owned(),
        Act::Shift(s) => format!("shift {s}"),
        Act::Reduce(p) => format!("reduce {}", g.labels[p]),
        Act::Goto(s) => format!("goto {s}"),
    }
}

/// Every cell holding more than one action.
pub fn conflicts(g: &Grammar, tab: &Tab) -> Vec<Conflict> {
    let mut out = Vec::new();
    for (state, row) in tab.iter().enumerate() {
        for (sym, acts) in row.iter().enumerate() {
            if acts.len() > 1 {
                out.push(Conflict {
                    state,
                    lookahead: g.symbol_name(sym).to_owned(),
                    actions: acts.iter().map(|&a| describe(g, a)).collect(),
                });
            }
        }
    }
    out
}

pub fn write_prods<W: Write>(out: &mut W, g: &Grammar) -> io::Result<()> {
    writeln!(out, "PRODUCTIONS {}\n", g.prods.len())?;
    for (i, prod) in g.prods.iter().enumerate() {
        write!(out, "{i:>4} {:<16} {} ->", g.labels[i], g.symbol_name(prod[0]))?;
        for &sym in &prod[1..] {
            write!(out, " {}", g.symbol_name(sym))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_states<W: Write>(out: &mut W, g: &Grammar, automaton: &Automaton) -> io::Result<()> {
    writeln!(out, "STATES {}\n", automaton.len())?;
    for (i, items) in automaton.states.iter().enumerate() {
        writeln!(out, "state {i}")?;
        for item in items {
            write!(out, "    {} ->", g.symbol_name(g.lhs(item.prod)))?;
            let rhs = g.rhs(item.prod);
            for (j, &sym) in rhs.iter().enumerate() {
                if j == item.dot {
                    write!(out, " .")?;
                }
                write!(out, " {}", g.symbol_name(sym))?;
            }
            if item.dot == rhs.len() {
                write!(out, " .")?;
            }
            writeln!(out)?;
        }
        for (&sym, &target) in &automaton.transitions[i] {
            writeln!(out, "    on {} -> {target}", g.symbol_name(sym))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes FIRST sets (when `nullable` is given) or FOLLOW sets.
pub fn write_sets<W: Write>(
    out: &mut W,
    g: &Grammar,
    sets: &[BTreeSet<usize>],
    nullable: Option<&[bool]>,
) -> io::Result<()> {
    let title = if nullable.is_some() { "FIRST" } else { "FOLLOW" };
    writeln!(out, "{title}\n")?;
    for (sym, set) in sets.iter().enumerate().take(g.n_nonterminals()) {
        write!(out, "    {}: {{", g.symbol_name(sym))?;
        let mut names: Vec<&str> = set.iter().map(|&t| g.symbol_name(t)).collect();
        if nullable.is_some_and(|n| n[sym]) {
            names.insert(0, "`empty'");
        }
        writeln!(out, "{}}}", names.join(", "))?;
    }
    Ok(())
}
