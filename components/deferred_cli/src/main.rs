//! Deferred value demo CLI
//!
//! Entry point for the demo. Parses CLI arguments, installs logging and
//! delegates to the Runtime for execution.

use clap::Parser as ClapParser;
use deferred_cli::{logging, Cli, Runtime};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: {}", e);
    }

    let mut runtime = Runtime::from_cli(&cli).with_echo(true);
    if let Err(e) = runtime.run_file(&cli.file) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
