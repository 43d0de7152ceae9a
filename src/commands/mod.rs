//! # CLI Command Implementations
//!
//! Each subcommand of the `repo-fetch` tool lives in its own file and
//! provides:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `repo_fetch` library.

pub mod completions;
pub mod fetch;
