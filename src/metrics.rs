//! Fetch telemetry.
//!
//! A `MetricsSink` hears about every fetch attempt exactly twice: once when
//! the clone starts and once when the fetch finishes, with the error if it
//! failed. Sinks cannot fail a fetch; any problem they have is their own.

use std::sync::Mutex;
use std::time::Instant;

use log::{debug, info};

use crate::error::Error;

/// Receives start and finish notifications for fetch attempts.
pub trait MetricsSink: Send + Sync {
    fn clone_started(&self, repo_url: &str);
    fn clone_finished(&self, repo_url: &str, error: Option<&Error>);
}

/// Emits fetch telemetry as `log` records under the `repo_fetch::metrics`
/// target, including how long each attempt took.
#[derive(Debug, Default)]
pub struct LogMetrics {
    started: Mutex<Vec<(String, Instant)>>,
}

impl LogMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for LogMetrics {
    fn clone_started(&self, repo_url: &str) {
        if let Ok(mut started) = self.started.lock() {
            started.push((repo_url.to_string(), Instant::now()));
        }
        debug!(target: "repo_fetch::metrics", "clone_started repo={}", repo_url);
    }

    fn clone_finished(&self, repo_url: &str, error: Option<&Error>) {
        let elapsed = self.started.lock().ok().and_then(|mut started| {
            let index = started.iter().rposition(|(url, _)| url == repo_url)?;
            Some(started.remove(index).1.elapsed())
        });
        let elapsed_ms = elapsed.map(|d| d.as_millis()).unwrap_or_default();
        match error {
            None => info!(
                target: "repo_fetch::metrics",
                "clone_finished repo={} success=true elapsed_ms={}", repo_url, elapsed_ms
            ),
            Some(e) => info!(
                target: "repo_fetch::metrics",
                "clone_finished repo={} success=false elapsed_ms={} error=\"{}\"", repo_url, elapsed_ms, e
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// One recorded sink call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MetricsCall {
        Started(String),
        Finished { repo: String, failed: bool },
    }

    #[derive(Debug, Default)]
    pub struct RecordingMetrics {
        calls: Mutex<Vec<MetricsCall>>,
    }

    impl RecordingMetrics {
        pub fn calls(&self) -> Vec<MetricsCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MetricsSink for RecordingMetrics {
        fn clone_started(&self, repo_url: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(MetricsCall::Started(repo_url.to_string()));
        }

        fn clone_finished(&self, repo_url: &str, error: Option<&Error>) {
            self.calls.lock().unwrap().push(MetricsCall::Finished {
                repo: repo_url.to_string(),
                failed: error.is_some(),
            });
        }
    }
}
