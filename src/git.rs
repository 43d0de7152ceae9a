//! # Git Client
//!
//! Drives the system `git` binary, which automatically handles SSH keys,
//! credential helpers and anything else configured in `~/.gitconfig`.
//!
//! Two operations are provided:
//!
//! - **`clone`** performs a normal clone of a ref into a directory.
//! - **`clone_sparse`** fetches only the tree under one sub-path. It runs in
//!   two steps: a blobless, shallow clone whose checkout is restricted to the
//!   top level (`--sparse`), followed by `sparse-checkout set` to materialise
//!   the requested sub-path.
//!
//! Every invocation goes through a `CommandRunner`, and git's error stream is
//! routed to a `Reporter` (or, in verbose mode, straight to the logger) while
//! the process runs.

use std::path::Path;
use std::sync::Arc;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::output::Logger;
use crate::reporter::{LineMode, Reporter, StderrSink};
use crate::runner::{execute, CancelToken, CommandRunner};

const AUTH_FAILURE_MARKERS: [&str; 3] = [
    "Authentication failed",
    "Permission denied",
    "Could not read from remote repository",
];

/// Runs git through a `CommandRunner`.
pub struct GitClient {
    runner: Arc<dyn CommandRunner>,
    logger: Arc<dyn Logger>,
}

impl GitClient {
    /// `logger` receives raw stderr lines when no reporter is supplied.
    pub fn new(runner: Arc<dyn CommandRunner>, logger: Arc<dyn Logger>) -> Self {
        Self { runner, logger }
    }

    /// Clones `repo_url` at `ref_name` into `target_dir`.
    ///
    /// An empty `ref_name` clones the remote's default branch.
    pub fn clone(
        &self,
        cancel: &CancelToken,
        repo_url: &str,
        ref_name: &str,
        target_dir: &Path,
        config: &FetchConfig,
        reporter: Option<Reporter>,
    ) -> Result<()> {
        let args = clone_args(repo_url, ref_name, target_dir, false);
        self.run(cancel, repo_url, ref_name, args, config, reporter)
            .map(drop)
    }

    /// Fetches only the tree under `sub_path` of `repo_url` at `ref_name`
    /// into `target_dir`, which must be empty.
    pub fn clone_sparse(
        &self,
        cancel: &CancelToken,
        repo_url: &str,
        ref_name: &str,
        sub_path: &Path,
        target_dir: &Path,
        config: &FetchConfig,
        reporter: Option<Reporter>,
    ) -> Result<()> {
        let args = clone_args(repo_url, ref_name, target_dir, true);
        let reporter = self.run(cancel, repo_url, ref_name, args, config, reporter)?;

        let args = sparse_checkout_args(target_dir, sub_path);
        self.run(cancel, repo_url, ref_name, args, config, reporter)
            .map(drop)
    }

    /// Runs one git invocation and hands the reporter back for the next one.
    fn run(
        &self,
        cancel: &CancelToken,
        repo_url: &str,
        ref_name: &str,
        args: Vec<String>,
        config: &FetchConfig,
        reporter: Option<Reporter>,
    ) -> Result<Option<Reporter>> {
        let mode = match reporter {
            Some(reporter) => LineMode::Progress(reporter),
            None => LineMode::Passthrough(Arc::clone(&self.logger)),
        };
        let process = self.runner.command(&config.git_program, &args);
        let (exit, sink) = execute(process, cancel, config.poll_interval, StderrSink::new(mode))?;
        let (reporter, diagnostics) = sink.finish();

        if exit.success() {
            return Ok(reporter);
        }

        let hint = AUTH_FAILURE_MARKERS
            .iter()
            .any(|marker| diagnostics.contains(marker))
            .then(|| {
                "Make sure you have access to the repository: check your SSH agent, \
                 git credential helper or personal access token"
                    .to_string()
            });
        let message = if diagnostics.is_empty() {
            format!("git {} failed", args.first().map(String::as_str).unwrap_or(""))
        } else {
            diagnostics
        };

        Err(Error::CloneFailed {
            url: repo_url.to_string(),
            r#ref: ref_name.to_string(),
            code: exit.code,
            message,
            hint,
        })
    }
}

fn clone_args(repo_url: &str, ref_name: &str, target_dir: &Path, sparse: bool) -> Vec<String> {
    let mut args = vec!["clone".to_string(), "--progress".to_string()];
    if sparse {
        args.extend(
            ["--filter=blob:none", "--depth", "1", "--sparse"]
                .iter()
                .map(|s| s.to_string()),
        );
    }
    if !ref_name.is_empty() {
        args.push("--branch".to_string());
        args.push(ref_name.to_string());
    }
    args.push("--".to_string());
    args.push(repo_url.to_string());
    args.push(target_dir.to_string_lossy().into_owned());
    args
}

fn sparse_checkout_args(target_dir: &Path, sub_path: &Path) -> Vec<String> {
    vec![
        "-C".to_string(),
        target_dir.to_string_lossy().into_owned(),
        "sparse-checkout".to_string(),
        "set".to_string(),
        "--".to_string(),
        to_git_path(sub_path),
    ]
}

/// git pathspecs use `/` on every platform.
fn to_git_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
