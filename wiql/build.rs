// build.rs
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    let grammar = manifest_dir.join("src/wiql.g");
    println!("cargo:rerun-if-changed={}", grammar.display());
    wiql_gen::generate(&grammar, &out_dir, "parser_data", false)
}
