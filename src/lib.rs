//! # Repository Fetch Library
//!
//! This library materializes a remote git repository, or a single
//! subdirectory of one, onto local disk by driving the system `git` binary.
//! While git runs, its progress output is parsed into a small set of
//! deduplicated progress rows that a terminal (or any other display) can
//! render live.
//!
//! ## Quick Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use repo_fetch::config::FetchConfig;
//! use repo_fetch::fetcher::{FetchRequest, GitFetcher};
//! use repo_fetch::progress::{MemoryTracker, ProgressTracker};
//! use repo_fetch::runner::CancelToken;
//!
//! let tracker = Arc::new(MemoryTracker::new());
//! let fetcher = GitFetcher::new(FetchConfig::from_env()).with_tracker(tracker.clone());
//!
//! let request = FetchRequest::new("https://github.com/example/templates.git", "templates")
//!     .with_ref("main")
//!     .with_sub_path("rust/cli");
//! fetcher.fetch_subdirectory(&CancelToken::new(), &request).unwrap();
//!
//! for row in tracker.progress_rows() {
//!     println!("{}: {}%", row.label, row.percent);
//! }
//! ```
//!
//! ## Core Concepts
//!
//! - **Process execution (`runner`)**: `CommandRunner` and `Process` abstract
//!   the external binary; `execute` drains the error stream and waits for
//!   exit concurrently, honouring a `CancelToken`.
//! - **Progress (`reporter`, `progress`)**: the `Reporter` parses
//!   `"<label>: NN%"` lines into progress events and forwards only meaningful
//!   changes to a `ProgressTracker`.
//! - **Git (`git`)**: `GitClient` runs full and sparse clones.
//! - **Orchestration (`fetcher`)**: `GitFetcher` validates requests, runs the
//!   clone, extracts subdirectories through a `TreeCopier` (`copy`) and
//!   reports to a `MetricsSink` (`metrics`).

pub mod config;
pub mod copy;
pub mod defaults;
pub mod error;
pub mod fetcher;
pub mod git;
pub mod metrics;
pub mod output;
pub mod progress;
pub mod reporter;
pub mod runner;
