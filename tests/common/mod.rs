//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_fake_git(scripts::SUCCESS);
//!     fixture.command().arg("fetch").arg("u").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::scripts;
    #[allow(unused_imports)]
    pub use super::SourceRepo;
    pub use super::TestFixture;
}

/// Shell scripts that stand in for `git` in CLI tests.
#[allow(dead_code)]
pub mod scripts {
    /// Prints clone progress and succeeds. A `clone` creates `docs/readme.txt`
    /// in the destination (the last argument).
    pub const SUCCESS: &str = r#"#!/bin/sh
if [ "$1" = "clone" ]; then
  for last; do :; done
  mkdir -p "$last/docs"
  echo hello > "$last/docs/readme.txt"
  printf 'Receiving objects:  50%% (1/2)\rReceiving objects: 100%% (2/2), done.\n' >&2
fi
exit 0
"#;

    /// Fails the way git does for an unknown repository.
    pub const NOT_FOUND: &str = r#"#!/bin/sh
echo "Cloning into 'x'..." >&2
echo "fatal: repository 'https://example.invalid/x.git/' not found" >&2
exit 128
"#;

    /// Never finishes on its own.
    pub const HANG: &str = r#"#!/bin/sh
exec sleep 30
"#;
}

/// A test fixture that provides a temporary working directory and,
/// optionally, a fake `git` executable.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
    git: Option<PathBuf>,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
            git: None,
        }
    }

    /// Install `script` as the git executable used by `command()`.
    #[cfg(unix)]
    pub fn with_fake_git(mut self, script: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let child = self.temp_dir.child("fake-git.sh");
        child.write_str(script).expect("Failed to write fake git");
        std::fs::set_permissions(child.path(), std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake git executable");
        self.git = Some(child.path().to_path_buf());
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A `repo-fetch` command running in the temp directory, with logging
    /// quiet and the fake git (if any) selected.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("repo-fetch");
        cmd.current_dir(self.path())
            .env_remove("RUST_LOG")
            .env_remove("REPO_FETCH_GIT");
        if let Some(git) = &self.git {
            cmd.env("REPO_FETCH_GIT", git);
        }
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A local git repository to fetch from, built with the real `git`.
pub struct SourceRepo {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl SourceRepo {
    /// Initialise a repository on branch `main` holding `files` in one commit.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        let repo = Self { temp_dir };
        repo.git(&["init", "--quiet", "--initial-branch=main"]);
        repo.git(&["config", "uploadpack.allowFilter", "true"]);
        for (path, content) in files {
            repo.temp_dir
                .child(path)
                .write_str(content)
                .expect("Failed to write file");
        }
        repo.commit("initial");
        repo
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A `file://` URL, so git honours `--depth` and `--filter`.
    pub fn url(&self) -> String {
        format!("file://{}", self.path().display())
    }

    pub fn commit(&self, message: &str) {
        self.git(&["add", "--all"]);
        self.git(&[
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "commit",
            "--quiet",
            "-m",
            message,
        ]);
    }

    pub fn git(&self, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .status()
            .expect("Failed to run git");
        assert!(status.success(), "git {:?} failed", args);
    }
}
