use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Checkpoint daemon
///
/// Periodically commits work in progress to a dedicated branch and pushes
/// it, caching git credentials so pushes never prompt.
#[derive(Parser, Debug)]
#[command(name = "anti-eneo")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the config file (default: search anti_eneo.json upward from the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Activate credentials and checkpoint until the credential window closes (default)
    Run,
    /// Make one checkpoint now, using already cached credentials
    CheckNow,
    /// Show configuration and the last recorded daemon activity
    Status,
    /// Write an example anti_eneo.json into the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}
