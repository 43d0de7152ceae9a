//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use repo_fetch::output::OutputConfig;

use crate::commands;

/// repo-fetch - Fetch a git repository or one of its subdirectories
#[derive(Parser, Debug)]
#[command(name = "repo-fetch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a repository, or a single directory of it, into a local directory
    Fetch(commands::fetch::FetchArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // RUST_LOG wins over --log-level when set.
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or(&self.log_level))
            .format_timestamp(None)
            .try_init();

        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Fetch(args) => commands::fetch::execute(args, output),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
