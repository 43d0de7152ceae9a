//! # Fetch Orchestration
//!
//! `GitFetcher` is the entry point of the library. It turns a `FetchRequest`
//! into files on disk, either as a full clone (`fetch`) or as the contents of
//! a single subdirectory (`fetch_subdirectory`).
//!
//! ## States
//!
//! ```text
//! Idle -> Validating -> Cloning -> [Extracting] -> Done
//!             |            |            |
//!             +------------+------------+-------> Failed
//! ```
//!
//! - **Validating** rejects an empty repository URL, and for subdirectory
//!   fetches an empty, absolute or escaping sub-path, before any I/O.
//!   Nothing is reported to the metrics sink for requests that never get
//!   past this state.
//! - **Cloning** announces the fetch, notifies the metrics sink and runs git.
//!   Progress rows are rendered through a `Reporter` unless verbose mode asks
//!   for raw git output instead.
//! - **Extracting** (subdirectory fetches only) checks that the sub-path
//!   exists in the sparse checkout and copies it to the target directory.
//!   The sparse checkout lives in a `TempWorkspace` that is removed on every
//!   exit path.
//! - **Done** / **Failed** report the outcome to the metrics sink.
//!
//! A failed full clone leaves whatever git wrote in the target directory.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use tempfile::TempDir;

use crate::config::FetchConfig;
use crate::copy::{FsTreeCopier, TreeCopier};
use crate::error::{Error, FetchPhase, Result};
use crate::git::GitClient;
use crate::metrics::MetricsSink;
use crate::output::{LogLogger, Logger};
use crate::progress::{NoopTracker, ProgressTracker};
use crate::reporter::Reporter;
use crate::runner::{CancelToken, CommandRunner, SystemRunner};

/// What to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub repo_url: String,
    /// Branch or tag. Empty means the remote's default branch.
    pub r#ref: String,
    pub target_dir: PathBuf,
    /// Repository-relative directory to extract, for subdirectory fetches.
    pub sub_path: Option<PathBuf>,
}

impl FetchRequest {
    pub fn new(repo_url: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_url: repo_url.into(),
            r#ref: String::new(),
            target_dir: target_dir.into(),
            sub_path: None,
        }
    }

    pub fn with_ref(mut self, r#ref: impl Into<String>) -> Self {
        self.r#ref = r#ref.into();
        self
    }

    pub fn with_sub_path(mut self, sub_path: impl Into<PathBuf>) -> Self {
        self.sub_path = Some(sub_path.into());
        self
    }

    fn display_source(&self) -> String {
        if self.r#ref.is_empty() {
            self.repo_url.clone()
        } else {
            format!("{}@{}", self.repo_url, self.r#ref)
        }
    }
}

/// The stages a single fetch moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Validating,
    Cloning,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A scratch directory owned by one subdirectory fetch.
///
/// Removed by `close`, or on drop if the fetch unwinds.
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    /// Creates a fresh, empty directory under `root`, or under the system
    /// temporary directory when `root` is `None`.
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("repo-fetch-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the directory and everything in it.
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// Fetches repositories and repository subdirectories with the system `git`.
pub struct GitFetcher {
    config: FetchConfig,
    runner: Arc<dyn CommandRunner>,
    logger: Arc<dyn Logger>,
    tracker: Arc<dyn ProgressTracker>,
    metrics: Option<Arc<dyn MetricsSink>>,
    copier: Arc<dyn TreeCopier>,
    workspace_root: Option<PathBuf>,
}

impl GitFetcher {
    /// A fetcher that runs real processes, logs through `log`, draws no
    /// progress and reports no metrics.
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            runner: Arc::new(SystemRunner),
            logger: Arc::new(LogLogger),
            tracker: Arc::new(NoopTracker),
            metrics: None,
            copier: Arc::new(FsTreeCopier),
            workspace_root: None,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn ProgressTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_copier(mut self, copier: Arc<dyn TreeCopier>) -> Self {
        self.copier = copier;
        self
    }

    /// Creates temporary workspaces under `root` instead of the system
    /// temporary directory.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Runs `fetch_subdirectory` when the request names a sub-path and
    /// `fetch` otherwise.
    pub fn fetch_request(&self, cancel: &CancelToken, request: &FetchRequest) -> Result<()> {
        if request.sub_path.is_some() {
            self.fetch_subdirectory(cancel, request)
        } else {
            self.fetch(cancel, request)
        }
    }

    /// Clones the whole repository into `request.target_dir`.
    pub fn fetch(&self, cancel: &CancelToken, request: &FetchRequest) -> Result<()> {
        self.transition(request, FetchState::Validating);
        if let Err(e) = validate_repo_url(&request.repo_url) {
            self.transition(request, FetchState::Failed);
            return Err(e.in_phase(FetchPhase::Validation));
        }

        self.start_clone(request);
        let result = self
            .client()
            .clone(
                cancel,
                &request.repo_url,
                &request.r#ref,
                &request.target_dir,
                &self.config,
                self.reporter(),
            )
            .map_err(|e| e.in_phase(FetchPhase::Clone));
        self.tracker.render();

        self.finish(request, result)
    }

    /// Fetches only `request.sub_path` and copies its contents into
    /// `request.target_dir`.
    pub fn fetch_subdirectory(&self, cancel: &CancelToken, request: &FetchRequest) -> Result<()> {
        self.transition(request, FetchState::Validating);
        let sub_path = match validate_repo_url(&request.repo_url)
            .and_then(|()| validate_sub_path(request.sub_path.as_deref()))
        {
            Ok(sub_path) => sub_path,
            Err(e) => {
                self.transition(request, FetchState::Failed);
                return Err(e.in_phase(FetchPhase::Validation));
            }
        };

        self.start_clone(request);
        let result = self.fetch_into_workspace(cancel, request, &sub_path);
        self.finish(request, result)
    }

    fn fetch_into_workspace(
        &self,
        cancel: &CancelToken,
        request: &FetchRequest,
        sub_path: &Path,
    ) -> Result<()> {
        let workspace = TempWorkspace::create(self.workspace_root.as_deref())
            .map_err(|e| e.in_phase(FetchPhase::Clone))?;
        debug!("sparse workspace for {}: {}", request.repo_url, workspace.path().display());

        let result = self.clone_and_extract(cancel, request, sub_path, workspace.path());

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            warn!(
                "Failed to remove temporary workspace '{}': {}",
                workspace_path.display(),
                e
            );
        }
        result
    }

    fn clone_and_extract(
        &self,
        cancel: &CancelToken,
        request: &FetchRequest,
        sub_path: &Path,
        workspace: &Path,
    ) -> Result<()> {
        let cloned = self.client().clone_sparse(
            cancel,
            &request.repo_url,
            &request.r#ref,
            sub_path,
            workspace,
            &self.config,
            self.reporter(),
        );
        self.tracker.render();
        cloned.map_err(|e| e.in_phase(FetchPhase::Clone))?;

        self.transition(request, FetchState::Extracting);
        let source = workspace.join(sub_path);
        if !is_checked_out_dir(workspace, &source) {
            return Err(Error::SubdirectoryNotFound {
                path: sub_path.to_path_buf(),
                url: request.repo_url.clone(),
            }
            .in_phase(FetchPhase::Extraction));
        }
        self.copier
            .copy_tree(&source, &request.target_dir)
            .map_err(|e| e.in_phase(FetchPhase::Extraction))
    }

    fn client(&self) -> GitClient {
        GitClient::new(Arc::clone(&self.runner), Arc::clone(&self.logger))
    }

    fn reporter(&self) -> Option<Reporter> {
        (!self.config.verbose).then(|| Reporter::new(Arc::clone(&self.tracker)))
    }

    fn start_clone(&self, request: &FetchRequest) {
        self.transition(request, FetchState::Cloning);
        let what = match &request.sub_path {
            Some(sub_path) => format!("{} from {}", sub_path.display(), request.display_source()),
            None => request.display_source(),
        };
        self.logger.info(&format!("Fetching {}...", what));
        if let Some(metrics) = &self.metrics {
            metrics.clone_started(&request.repo_url);
        }
    }

    fn finish(&self, request: &FetchRequest, result: Result<()>) -> Result<()> {
        match &result {
            Ok(()) => {
                self.transition(request, FetchState::Done);
                self.logger.info(&format!(
                    "Fetched {} into {}",
                    request.display_source(),
                    request.target_dir.display()
                ));
            }
            Err(e) => {
                self.transition(request, FetchState::Failed);
                debug!("fetch of {} failed: {}", request.repo_url, e);
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.clone_finished(&request.repo_url, result.as_ref().err());
        }
        result
    }

    fn transition(&self, request: &FetchRequest, state: FetchState) {
        debug!("fetch {}: {}", request.repo_url, state);
    }
}

/// Whether `source` is a real directory inside `workspace`. A symlinked
/// sub-path, or one reached through a symlinked parent, does not count.
fn is_checked_out_dir(workspace: &Path, source: &Path) -> bool {
    let is_dir = fs::symlink_metadata(source)
        .map(|meta| meta.file_type().is_dir())
        .unwrap_or(false);
    if !is_dir {
        return false;
    }
    match (workspace.canonicalize(), source.canonicalize()) {
        (Ok(root), Ok(resolved)) => resolved.starts_with(root),
        _ => false,
    }
}

fn validate_repo_url(repo_url: &str) -> Result<()> {
    if repo_url.trim().is_empty() {
        return Err(Error::validation("repository URL", "must not be empty"));
    }
    Ok(())
}

/// Checks a sub-path and returns it without `.` components.
fn validate_sub_path(sub_path: Option<&Path>) -> Result<PathBuf> {
    let sub_path = sub_path.unwrap_or_else(|| Path::new(""));
    let mut normalized = PathBuf::new();
    for component in sub_path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::validation(
                    "sub-path",
                    format!("'{}' must not contain '..'", sub_path.display()),
                ))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::validation(
                    "sub-path",
                    format!("'{}' must be relative to the repository root", sub_path.display()),
                ))
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(Error::validation("sub-path", "must not be empty"));
    }
    Ok(normalized)
}
