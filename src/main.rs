use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod credentials;
mod daemon;
mod error;
mod git;
mod platform;

use cli::{Args, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(error::exit_code_for(&e));
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = args.config.as_deref();

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run(config, args.verbose),
        Commands::CheckNow => commands::check_now(config, args.verbose),
        Commands::Status => commands::status(config, args.verbose),
        Commands::Init { force } => commands::init(force),
    }
}
