//! # repo-fetch CLI
//!
//! This is the binary entry point for the `repo-fetch` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging and executing the selected command.
//! - Handling top-level errors and translating them into user-friendly output.
//!
//! The fetch logic itself lives in the `repo_fetch` library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
