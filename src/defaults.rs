//! Default values for repo-fetch configuration.
//!
//! This module provides centralized default values used across the library
//! and the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// The git executable used when nothing overrides it.
pub const DEFAULT_GIT_PROGRAM: &str = "git";

/// How often a running process is checked for exit or cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long a cancelled fetch waits for the stderr reader before detaching it.
pub const READER_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Number of unrecognised stderr lines kept for error messages.
pub const DIAGNOSTIC_LINES: usize = 20;

/// Minimum percentage advance that forwards a progress row immediately.
pub const PROGRESS_THROTTLE_STEP: u8 = 10;

/// Returns the directory a clone of `url` lands in when none is given.
///
/// Mirrors git's own choice: the last path segment of the URL with any
/// trailing `/` and `.git` removed. SCP-style URLs (`host:owner/repo`) are
/// handled by also splitting on `:`. Falls back to `repository` when the URL
/// has no usable segment.
pub fn default_target_dir(url: &str) -> PathBuf {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let name = trimmed
        .rsplit(['/', ':', '\\'])
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("repository");
    PathBuf::from(name)
}
