//! Command-line front end for the WIQL tokenizer, parser, checker and
//! formatter.
//!
//! Every subcommand reads one query file (`-` for standard input) and writes
//! its report to the given writer. Diagnostics are printed as
//! `path:line:col: severity: message` with 1-based line and column.

pub mod config;

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;

use wiql::{
    Diagnostic, ErrorChecker, FieldSet, FormatError, Tokenizer, format_parsed, parse, split_lines,
};

use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "wiql", version, about = "Tokenize, parse, check and format WIQL queries")]
pub struct Args {
    /// TOML configuration file (defaults to ./wiql.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Field metadata as JSON, either a list or `{"value": [...]}`
    #[arg(short, long, global = true)]
    pub fields: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints the token stream
    Tokenize {
        /// Query file, or `-` for standard input
        input: PathBuf,
    },
    /// Prints the syntax tree as an S-expression with syntax diagnostics
    Parse { input: PathBuf },
    /// Reports lexical, syntax and semantic problems
    Check { input: PathBuf },
    /// Prints the query in canonical layout
    Format {
        input: PathBuf,
        /// Rewrite the input file instead of printing
        #[arg(short, long)]
        write: bool,
    },
}

impl Command {
    fn input(&self) -> &Path {
        match self {
            Self::Tokenize { input }
            | Self::Parse { input }
            | Self::Check { input }
            | Self::Format { input, .. } => input,
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("can't read standard input")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("can't read {}", path.display()))
}

fn load_fields(path: Option<&Path>) -> Result<Option<FieldSet>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let json =
        fs::read_to_string(path).with_context(|| format!("can't read {}", path.display()))?;
    let fields = FieldSet::from_json(&json)
        .with_context(|| format!("invalid field metadata in {}", path.display()))?;
    info!("loaded {} fields from {}", fields.len(), path.display());
    Ok(Some(fields))
}

/// Renders a diagnostic for humans: `path:line:col: severity: message`.
pub fn render_diagnostic(path: &Path, diagnostic: &Diagnostic) -> String {
    format!(
        "{}:{}:{}: {}: {}",
        path.display(),
        diagnostic.range.start.line + 1,
        diagnostic.range.start.column + 1,
        diagnostic.severity,
        diagnostic.message
    )
}

fn write_diagnostics(out: &mut dyn Write, path: &Path, diagnostics: &[Diagnostic]) -> Result<()> {
    for diagnostic in diagnostics {
        writeln!(out, "{}", render_diagnostic(path, diagnostic))?;
    }
    Ok(())
}

/// Runs one subcommand, writing its report to `out`.
///
/// Returns `Ok(false)` when the query has error-severity diagnostics (or
/// cannot be formatted), so the binary can exit non-zero.
pub fn run(args: &Args, out: &mut dyn Write) -> Result<bool> {
    let config: CliConfig = config::load_config(args.config.as_ref())?;
    let fields = load_fields(args.fields.as_deref())?;
    let path = args.command.input();
    let text = read_input(path)?;
    let lines = split_lines(&text);
    let tokens = Tokenizer::new(&config.tokenizer).tokenize(&lines);
    info!("{}: {} lines, {} tokens", path.display(), lines.len(), tokens.len());

    match &args.command {
        Command::Tokenize { .. } => {
            if args.json {
                serde_json::to_writer_pretty(&mut *out, &tokens)?;
                writeln!(out)?;
            } else {
                for token in &tokens {
                    writeln!(out, "{}\t{:?}\t{}", token.span, token.kind, token.text())?;
                }
            }
            Ok(true)
        }
        Command::Parse { .. } => {
            let parsed = parse(&tokens);
            if args.json {
                let report = json!({
                    "statement": parsed.statement,
                    "diagnostics": parsed.diagnostics,
                    "skipped": parsed.skipped,
                    "dropped_fields": parsed.dropped_fields,
                    "stats": parsed.stats,
                });
                serde_json::to_writer_pretty(&mut *out, &report)?;
                writeln!(out)?;
            } else {
                match &parsed.statement {
                    Some(statement) => writeln!(out, "{}", statement.to_sexpr())?,
                    None => writeln!(out, "(no statement)")?,
                }
                write_diagnostics(out, path, &parsed.diagnostics)?;
            }
            Ok(!parsed.diagnostics.iter().any(Diagnostic::is_error))
        }
        Command::Check { .. } => {
            let parsed = parse(&tokens);
            let empty = FieldSet::default();
            let diagnostics = ErrorChecker::new(fields.as_ref().unwrap_or(&empty)).check(&parsed);
            if args.json {
                serde_json::to_writer_pretty(&mut *out, &diagnostics)?;
                writeln!(out)?;
            } else {
                write_diagnostics(out, path, &diagnostics)?;
            }
            Ok(!diagnostics.iter().any(Diagnostic::is_error))
        }
        Command::Format { write, .. } => {
            let parsed = parse(&tokens);
            match format_parsed(&parsed, fields.as_ref(), &config.format) {
                Ok(formatted) if *write => {
                    fs::write(path, format!("{formatted}\n"))
                        .with_context(|| format!("can't write {}", path.display()))?;
                    info!("formatted {}", path.display());
                    Ok(true)
                }
                Ok(formatted) => {
                    if args.json {
                        serde_json::to_writer_pretty(&mut *out, &json!({ "text": formatted }))?;
                        writeln!(out)?;
                    } else {
                        writeln!(out, "{formatted}")?;
                    }
                    Ok(true)
                }
                Err(FormatError::Malformed(diagnostics)) => {
                    write_diagnostics(out, path, &diagnostics)?;
                    Ok(false)
                }
            }
        }
    }
}
