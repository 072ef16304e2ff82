//! `bootlite` command-line entry point.

mod cli;
mod commands;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let log = bootlite::util::init_logging("info");
    if cli.global.debug {
        log.raise_to_debug();
    }

    let result = match cli.command {
        Commands::Upgrade(args) => commands::upgrade::execute(args, &cli.global),
        Commands::Status(args) => commands::status::execute(args, &cli.global),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
