//! Command-line interface for the grammar table compiler.
//!
//! Reads a `.g` grammar and writes `<output-dir>/<name>.rs`, exactly as the
//! `wiql` build script does. Useful for inspecting the automaton with
//! `--debug`, which adds item sets and FIRST/FOLLOW sets to the output.

#[cfg(feature = "cli")]
mod real {
    use clap::Parser;
    use std::path::PathBuf;

    #[derive(Parser)]
    #[command(version, about = "Compile a WIQL grammar into SLR(1) parser tables")]
    struct Args {
        /// Path to the input grammar file
        #[arg(short = 'g', long)]
        grammar: PathBuf,

        /// Path to the output directory
        #[arg(short = 'o', long)]
        output_dir: PathBuf,

        /// Output file name without the `.rs` extension
        #[arg(short = 'n', long, default_value = "parser_data")]
        name: String,

        /// Include item sets and FIRST/FOLLOW sets in the output comment
        #[arg(short = 'd', long)]
        debug: bool,
    }

    pub fn main() -> anyhow::Result<()> {
        env_logger::init();
        let args = Args::parse();
        wiql_gen::generate(args.grammar, args.output_dir, args.name, args.debug)
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    real::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("wiql-gen disabled (compiled without `cli` feature)");
}
