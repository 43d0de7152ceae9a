//! Integration tests that drive the real `git` binary.
//!
//! Each test builds a throwaway source repository on disk and fetches it over
//! a `file://` URL, so no network is needed, only a `git` on `PATH` that
//! supports sparse checkout (2.25 or newer).
//!
//! ```bash
//! # Run all tests including integration tests
//! cargo test --features integration-tests
//!
//! # Run only integration tests
//! cargo test --test integration_test --features integration-tests
//! ```

#[allow(dead_code)]
mod common;
use common::SourceRepo;

use repo_fetch::config::FetchConfig;
use repo_fetch::error::Error;
use repo_fetch::fetcher::{FetchRequest, GitFetcher};
use repo_fetch::progress::{MemoryTracker, ProgressTracker};
use repo_fetch::runner::CancelToken;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn source() -> SourceRepo {
    let repo = SourceRepo::with_files(&[
        ("README.md", "# source\n"),
        ("templates/rust/Cargo.toml", "[package]\nname = \"demo\"\n"),
        ("templates/rust/bin/setup.sh", "#!/bin/sh\necho setup\n"),
        ("templates/go/go.mod", "module demo\n"),
    ]);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let script = repo.path().join("templates/rust/bin/setup.sh");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        repo.commit("make setup executable");
    }
    repo
}

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(temp.path().join("scratch")).unwrap();
        Self { temp }
    }

    fn fetcher(&self, tracker: Arc<MemoryTracker>) -> GitFetcher {
        GitFetcher::new(FetchConfig::default())
            .with_tracker(tracker)
            .with_workspace_root(self.temp.path().join("scratch"))
    }

    fn target(&self) -> std::path::PathBuf {
        self.temp.path().join("out")
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.temp.path().join("scratch"))
            .unwrap()
            .next()
            .is_none()
    }
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_full_fetch_clones_whole_repository() {
    let repo = source();
    let workspace = Workspace::new();
    let tracker = Arc::new(MemoryTracker::new());

    let request = FetchRequest::new(repo.url(), workspace.target()).with_ref("main");
    workspace
        .fetcher(tracker.clone())
        .fetch_request(&CancelToken::new(), &request)
        .expect("fetch should succeed");

    let out = workspace.target();
    assert!(out.join(".git").is_dir());
    assert!(out.join("README.md").is_file());
    assert!(out.join("templates/go/go.mod").is_file());
    assert!(tracker.progress_rows().iter().all(|row| row.percent <= 100));
    assert!(workspace.scratch_is_empty());
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_subdirectory_fetch_copies_only_sub_path() {
    let repo = source();
    let workspace = Workspace::new();
    let tracker = Arc::new(MemoryTracker::new());

    let request = FetchRequest::new(repo.url(), workspace.target()).with_sub_path("templates/rust");
    workspace
        .fetcher(tracker)
        .fetch_request(&CancelToken::new(), &request)
        .expect("fetch should succeed");

    let out = workspace.target();
    assert_eq!(
        fs::read_to_string(out.join("Cargo.toml")).unwrap(),
        "[package]\nname = \"demo\"\n"
    );
    assert!(out.join("bin/setup.sh").is_file());
    assert!(!out.join(".git").exists());
    assert!(!out.join("README.md").exists());
    assert!(!out.join("go.mod").exists());
    assert!(workspace.scratch_is_empty());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(out.join("bin/setup.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_subdirectory_fetch_missing_path() {
    let repo = source();
    let workspace = Workspace::new();

    let request = FetchRequest::new(repo.url(), workspace.target()).with_sub_path("templates/java");
    let err = workspace
        .fetcher(Arc::new(MemoryTracker::new()))
        .fetch_request(&CancelToken::new(), &request)
        .unwrap_err();

    assert!(matches!(err.root(), Error::SubdirectoryNotFound { .. }));
    assert!(err.to_string().contains("not found"));
    assert!(!workspace.target().exists());
    assert!(workspace.scratch_is_empty());
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_unknown_ref_fails() {
    let repo = source();
    let workspace = Workspace::new();

    let request = FetchRequest::new(repo.url(), workspace.target()).with_ref("no-such-branch");
    let err = workspace
        .fetcher(Arc::new(MemoryTracker::new()))
        .fetch_request(&CancelToken::new(), &request)
        .unwrap_err();

    match err.root() {
        Error::CloneFailed { code, message, .. } => {
            assert_ne!(*code, Some(0));
            assert!(message.contains("no-such-branch"), "message: {}", message);
        }
        other => panic!("expected CloneFailed, got {:?}", other),
    }
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_missing_repository_fails() {
    let workspace = Workspace::new();
    let missing = workspace.temp.path().join("missing-repo");
    let url = format!("file://{}", missing.display());

    let request = FetchRequest::new(url, workspace.target());
    let err = workspace
        .fetcher(Arc::new(MemoryTracker::new()))
        .fetch_request(&CancelToken::new(), &request)
        .unwrap_err();

    assert!(matches!(err.root(), Error::CloneFailed { .. }));
    assert!(workspace.scratch_is_empty());
}
