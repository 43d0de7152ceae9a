//! # Output
//!
//! User-facing messages and colour handling.
//!
//! Messages go through the `Logger` trait, a line-oriented informational
//! sink. `ConsoleLogger` writes to stdout and, when progress bars are being
//! drawn, prints through the bars' `MultiProgress` so the two do not tear.
//! `LogLogger` forwards to the `log` facade for library callers that already
//! have a logger configured.
//!
//! ## Respecting User Preferences
//!
//! `OutputConfig` decides whether emoji and colours are used:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals

use std::env;
use std::io::{self, Write};

use indicatif::MultiProgress;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// In auto mode, colors are disabled if `NO_COLOR` is set, `CLICOLOR=0`,
    /// `TERM=dumb`, or stdout is not a TTY (unless `CLICOLOR_FORCE=1`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns `emoji_str` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// A line-oriented informational sink.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
}

/// Prints messages to stdout.
pub struct ConsoleLogger {
    output: OutputConfig,
    multi: Option<MultiProgress>,
}

impl ConsoleLogger {
    pub fn new(output: OutputConfig) -> Self {
        Self {
            output,
            multi: None,
        }
    }

    /// Prints through `multi` so lines appear above any active bars.
    pub fn with_progress(mut self, multi: MultiProgress) -> Self {
        self.multi = Some(multi);
        self
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }
}

impl Logger for ConsoleLogger {
    fn info(&self, message: &str) {
        // stdout write errors are ignored.
        let print = || {
            let _ = writeln!(io::stdout(), "{}", message);
        };
        match &self.multi {
            Some(multi) => multi.suspend(print),
            None => print(),
        }
    }
}

/// Forwards messages to `log::info!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn info(&self, message: &str) {
        log::info!("{}", message);
    }
}
