mod commands;
mod logging;
mod sysexits;

use crate::commands::{Cli, Commands};
use clap::Parser;
use std::process;

/// Entry point for the bernard CLI application.
/// Parses command-line arguments and dispatches to the appropriate command handler.
fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let commands = match cli.commands {
        Some(commands) => commands,
        None => {
            eprintln!("bernard requires a command to execute. See 'bernard --help' for usage.");
            process::exit(sysexits::EX_USAGE);
        }
    };

    let dir = cli.directory;
    let result = match commands {
        Commands::Backup {
            names,
            paths,
            resolve_symlinks,
        } => commands::backup(dir, names, paths, resolve_symlinks),
        Commands::Restore { name } => {
            eprintln!("Cannot restore '{name}': restore is not implemented.");
            process::exit(sysexits::EX_UNAVAILABLE);
        }
        Commands::List { name } => commands::list(dir, name),
        Commands::Config { name } => commands::config(dir, name),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(commands::exit_code(&e));
    }
}
