//! `postpro` entry point: parses the command line, initialises tracing, and
//! dispatches to the subcommand implementations in `run.rs`.

mod cli;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Export(args) => run::export(args),
        Command::Preview(args) => run::preview(args),
        Command::Effects(args) => run::list_effects(args),
    }
}
