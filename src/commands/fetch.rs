//! Fetch command implementation
//!
//! Clones a repository, or only one of its directories, into a local
//! directory while drawing clone progress as it goes:
//!
//! ```bash
//! repo-fetch fetch https://github.com/example/templates.git
//! repo-fetch fetch https://github.com/example/templates.git my-app --ref v2 --path rust/cli
//! ```

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use repo_fetch::config::FetchConfig;
use repo_fetch::defaults::default_target_dir;
use repo_fetch::fetcher::{FetchRequest, GitFetcher};
use repo_fetch::metrics::LogMetrics;
use repo_fetch::output::{emoji, ConsoleLogger, OutputConfig};
use repo_fetch::progress::{ProgressTracker, TerminalTracker};
use repo_fetch::runner::CancelToken;

/// Arguments for the fetch command
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Repository URL (anything `git clone` accepts)
    #[arg(value_name = "URL")]
    pub url: String,

    /// Destination directory (defaults to the repository name)
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Branch or tag to fetch (defaults to the remote's default branch)
    #[arg(short, long = "ref", value_name = "REF", default_value = "")]
    pub reference: String,

    /// Only fetch this directory of the repository and copy its contents
    /// into DIR
    #[arg(short, long, value_name = "SUBPATH")]
    pub path: Option<PathBuf>,

    /// Show git's raw output instead of progress bars
    #[arg(short, long)]
    pub verbose: bool,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// git executable to run
    #[arg(long, value_name = "PROGRAM", env = "REPO_FETCH_GIT")]
    pub git: Option<String>,
}

/// Execute the fetch command
pub fn execute(args: FetchArgs, output: OutputConfig) -> Result<()> {
    let start_time = Instant::now();

    let mut config = FetchConfig::from_env().with_verbose(args.verbose);
    if let Some(git) = args.git.filter(|g| !g.trim().is_empty()) {
        config = config.with_git_program(git);
    }

    let target_dir = args.dir.unwrap_or_else(|| default_target_dir(&args.url));
    let mut request = FetchRequest::new(args.url, target_dir).with_ref(args.reference);
    if let Some(path) = args.path {
        request = request.with_sub_path(path);
    }

    let tracker = Arc::new(TerminalTracker::new());
    let logger = ConsoleLogger::new(output.clone()).with_progress(tracker.multi().clone());
    let fetcher = GitFetcher::new(config)
        .with_logger(Arc::new(logger))
        .with_tracker(tracker.clone())
        .with_metrics(Arc::new(LogMetrics::new()));

    let cancel = CancelToken::new();
    if let Some(seconds) = args.timeout {
        cancel.cancel_after(Duration::from_secs(seconds));
    }

    let result = fetcher.fetch_request(&cancel, &request);
    tracker.clear();

    match result {
        Ok(()) => {
            println!(
                "{} Done in {:.2}s",
                emoji(&output, "✅", "[OK]"),
                start_time.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("{} Fetch cancelled", emoji(&output, "⏹️", "[CANCELLED]"));
            Err(e).context(format!("Fetching {} was cancelled", request.repo_url))
        }
        Err(e) => {
            eprintln!("{} Fetch failed", emoji(&output, "❌", "[ERROR]"));
            Err(e).with_context(|| format!("Failed to fetch {}", request.repo_url))
        }
    }
}
