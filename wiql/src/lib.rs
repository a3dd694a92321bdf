//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! # wiql
//!
//! Language front end for the Work Item Query Language: a tokenizer, a
//! table-driven parser that keeps going after syntax errors, a semantic
//! checker driven by field metadata and a canonical formatter.
//!
//! ## Pipeline
//!
//! ```text
//! lines ─▶ Tokenizer ─▶ tokens ─▶ Parser ─▶ SelectStatement + diagnostics
//!                                                 │
//!                          FieldSet ─▶ ErrorChecker ┴─▶ full diagnostic set
//!                                                 └─▶ Formatter ─▶ TextEdit
//! ```
//!
//! - [`tokenizer`] splits lines into [`Token`]s; lexical errors stay in the
//!   stream as error tokens.
//! - [`parser`] drives the SLR(1) table compiled from `src/wiql.g` by
//!   `wiql-gen` at build time and recovers from syntax errors at the
//!   grammar's `error` points.
//! - [`checker`] validates field references, operators and literals against a
//!   [`FieldSet`].
//! - [`formatter`] re-renders well-formed queries canonically.
//!
//! Every pass is a pure function of its inputs. Positions are 0-based lines
//! and character columns.
//!
//! ## Example
//!
//! ```rust
//! use wiql::{FieldMetadata, FieldSet, FieldType, FormatOptions, check_document, format_document};
//!
//! let fields = FieldSet::new([FieldMetadata::new("System.Id", "ID", FieldType::Integer)]);
//!
//! let diagnostics = check_document(&["select id from workitems where [Bogus] = 1"], &fields);
//! assert_eq!(diagnostics.len(), 1);
//! assert!(diagnostics[0].message.starts_with("unknown field"));
//!
//! let edit = format_document(&["select [id] from workitems"], Some(&fields), &FormatOptions::default()).unwrap();
//! assert_eq!(edit.text, "SELECT [ID]\nFROM WORKITEMS");
//! ```

pub mod ast;
pub mod checker;
pub mod diagnostics;
pub mod fields;
pub mod formatter;
pub mod parser;
pub mod span;
pub mod token;
pub mod tokenizer;

pub use ast::{
    AsOfClause, BooleanExpression, ComparisonOperator, FieldList, FieldRef, Literal, LiteralKind,
    OrderByClause, SelectStatement, SortDirection, SortItem, Source,
};
pub use checker::{ErrorChecker, check_document};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use fields::{FieldMetadata, FieldSet, FieldType};
pub use formatter::{
    FormatError, FormatOptions, KeywordCase, TextEdit, format_document, format_parsed,
    format_statement,
};
pub use parser::parser_data::TokenID;
pub use parser::{ParseResult, Parser, ParserError, ParserStats, parse};
pub use span::{Position, Span};
pub use token::{Token, TokenKind};
pub use tokenizer::{Tokenizer, TokenizerConfig, split_lines, tokenize};
