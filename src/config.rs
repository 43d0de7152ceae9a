//! Fetch configuration.
//!
//! A `FetchConfig` is resolved once, at startup, and passed by reference to
//! everything that needs it. Nothing in the crate mutates it afterwards.
//!
//! | Setting         | Default | Override                            |
//! |-----------------|---------|-------------------------------------|
//! | `verbose`       | `false` | `--verbose`                         |
//! | `git_program`   | `git`   | `REPO_FETCH_GIT`, then `--git`      |
//! | `poll_interval` | 10 ms   | library callers only                |

use std::env;
use std::time::Duration;

use crate::defaults::{DEFAULT_GIT_PROGRAM, DEFAULT_POLL_INTERVAL};

/// Environment variable naming the git executable to run.
pub const GIT_PROGRAM_ENV: &str = "REPO_FETCH_GIT";

/// Configuration shared by the git client and the fetch orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Pass git's error stream through to the logger line by line instead of
    /// rendering deduplicated progress rows.
    pub verbose: bool,
    /// The git executable (a name resolved through `PATH`, or a full path).
    pub git_program: String,
    /// How often the exit-wait loop checks for process exit and cancellation.
    pub poll_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            git_program: DEFAULT_GIT_PROGRAM.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl FetchConfig {
    /// Builds a configuration from defaults plus the process environment.
    ///
    /// An empty `REPO_FETCH_GIT` is treated as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(program) = lookup(GIT_PROGRAM_ENV).filter(|p| !p.trim().is_empty()) {
            config.git_program = program;
        }
        config
    }

    /// Sets verbose passthrough mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Overrides the git executable.
    pub fn with_git_program(mut self, program: impl Into<String>) -> Self {
        self.git_program = program.into();
        self
    }

    /// Overrides the exit-wait poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
