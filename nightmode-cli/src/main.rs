// nightmode-cli/src/main.rs
//
// Entry point of the `nightmode` binary.
//
// Responsibilities include:
// - Parsing command-line arguments with clap.
// - Installing the console (and optional file) logger.
// - Dispatching to the subcommand implementations.
// - Reporting failures and mapping them to exit code 1.

use clap::Parser;
use nightmode_cli::logging::init_logging;
use nightmode_cli::terminal::styling;
use nightmode_cli::{Cli, CliResult, Commands, run_batch, run_create, run_peak, run_plan};
use std::process;

fn main() {
    let cli = Cli::parse();

    let log_path = match init_logging(cli.verbose, cli.log_dir.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{} {}", styling::ERROR_SYMBOL, e);
            process::exit(1);
        }
    };
    if let Some(path) = &log_path {
        log::info!("Log file: {}", path.display());
    }

    if let Err(e) = run(cli.command) {
        log::error!("{} {}", styling::ERROR_SYMBOL, e);
        process::exit(1);
    }
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Batch(args) => run_batch(args),
        Commands::Plan(args) => run_plan(args),
        Commands::Create(args) => run_create(args),
        Commands::Peak(args) => run_peak(args),
    }
}
