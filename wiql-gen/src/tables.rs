//! SLR(1) table construction.
//!
//! [`compile`] turns grammar text into a [`CompiledGrammar`]; [`generate`]
//! additionally writes the Rust source of the table into an output directory,
//! which is what `build.rs` scripts call.

mod error;
mod generate;
mod grammar;
mod lexer;
mod parser;
mod slr;
mod symtab;

pub use error::{Conflict, GrammarError};
pub use generate::{CompiledGrammar, compile, generate};
pub use grammar::Grammar;
pub use slr::Act;
