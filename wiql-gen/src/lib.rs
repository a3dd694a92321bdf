//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Grammar table compiler for the WIQL front end.
//!
//! `wiql-gen` reads a line-oriented `.g` grammar, builds the canonical LR(0)
//! collection, computes FIRST/FOLLOW sets and emits an SLR(1) action table as
//! Rust source. The `wiql` crate runs it from `build.rs` so the table is a
//! static constant of the runtime parser.
//!
//! Unlike a general-purpose generator, `wiql-gen` refuses grammars with
//! shift/reduce or reduce/reduce conflicts: the runtime parser has no hook for
//! resolving them, so each conflict is reported with its state, lookahead and
//! the competing actions.

pub mod tables;

pub use tables::{CompiledGrammar, Conflict, GrammarError, compile, generate};
