use std::{io, process};

use clap::Parser;
use log::{debug, error};

use wiql_cli::{Args, run};

fn main() {
    env_logger::init();

    let args = Args::parse();
    debug!("{args:?}");

    let stdout = io::stdout();
    match run(&args, &mut stdout.lock()) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("{err:#}");
            eprintln!("wiql: {err:#}");
            process::exit(2);
        }
    }
}
