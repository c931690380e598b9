//! Command-line surface: `codeck-daemon run` (default) and the
//! `codeck-daemon config {show,validate}` diagnostics.

use clap::{Parser, Subcommand};

/// codeck-daemon — runtime server for a single workstation workspace.
#[derive(Parser)]
#[command(name = "codeck-daemon")]
#[command(author, version, about = "codeck daemon — runtime server for a single workstation workspace")]
pub struct Cli {
    /// Subcommand to run; `None` behaves like `Commands::Run`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the daemon and serve the gateway (the default if no
    /// subcommand is given).
    Run,
    /// Inspect the resolved configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the fully resolved configuration, with secrets redacted.
    Show {
        /// Output format: `toml` or `json`.
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
    /// Load and validate configuration without starting the daemon.
    Validate,
}
