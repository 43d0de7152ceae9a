//! # Clone Progress Reporting
//!
//! git reports clone progress on its error stream as lines shaped like
//!
//! ```text
//! remote: Counting objects: 100% (12/12), done.
//! Receiving objects:  42% (5/12)
//! Resolving deltas: 100% (3/3), done.
//! ```
//!
//! `parse_progress_line` recognises that shape and turns it into a
//! `ProgressEvent`. Anything else yields `None` and is never an error.
//!
//! `Reporter` sits between the raw lines and a `ProgressTracker`. It keeps
//! the display from being flooded by git's frequent redraws:
//!
//! - a value lower than the last one forwarded for a module is dropped, so
//!   each row only moves forward;
//! - otherwise the value becomes pending, and is forwarded immediately if it
//!   reaches 100% or has moved at least `PROGRESS_THROTTLE_STEP` points
//!   since the last forwarded value;
//! - a pending value is flushed when a line for another module arrives and
//!   when `finish` is called at the end of the stream.
//!
//! The last value seen for every module therefore always reaches the
//! tracker, and a 100% value is never held back.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};

use log::trace;
use regex::Regex;

use crate::defaults::{DIAGNOSTIC_LINES, PROGRESS_THROTTLE_STEP};
use crate::output::Logger;
use crate::progress::ProgressTracker;
use crate::runner::LineSink;

/// A single recognised progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub module_id: String,
    pub percent: u8,
    pub label: String,
}

fn progress_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:remote:\s*)?([a-z][a-z \t-]*?)\s*:\s*(\d{1,3})\s*%")
            .expect("progress pattern is valid")
    })
}

/// Derives a module ID from a phase label: lower-cased, with every run of
/// non-alphanumeric characters collapsed to a single `-`.
pub fn module_id(label: &str) -> String {
    let mut id = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.is_empty() && !id.ends_with('-') {
            id.push('-');
        }
    }
    while id.ends_with('-') {
        id.pop();
    }
    id
}

/// Parses one line of git's error stream.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let captures = progress_pattern().captures(line)?;
    let label = captures.get(1)?.as_str().trim();
    let percent: u8 = captures.get(2)?.as_str().parse().ok()?;
    if percent > 100 {
        return None;
    }
    let module_id = module_id(label);
    if module_id.is_empty() {
        return None;
    }
    Some(ProgressEvent {
        module_id,
        percent,
        label: label.to_string(),
    })
}

/// Converts raw stderr lines into deduplicated tracker updates.
pub struct Reporter {
    tracker: Arc<dyn ProgressTracker>,
    throttle_step: u8,
    pending: Option<ProgressEvent>,
    forwarded: HashMap<String, u8>,
}

impl Reporter {
    pub fn new(tracker: Arc<dyn ProgressTracker>) -> Self {
        Self {
            tracker,
            throttle_step: PROGRESS_THROTTLE_STEP,
            pending: None,
            forwarded: HashMap::new(),
        }
    }

    /// Changes the advance that forwards a row immediately. `0` forwards
    /// every increase.
    pub fn with_throttle_step(mut self, step: u8) -> Self {
        self.throttle_step = step;
        self
    }

    /// Feeds one line. Returns whether it was a progress line.
    pub fn handle_line(&mut self, line: &str) -> bool {
        match parse_progress_line(line) {
            Some(event) => {
                self.observe(event);
                true
            }
            None => false,
        }
    }

    /// Flushes the pending update. Call once the stream has ended.
    pub fn finish(&mut self) {
        if let Some(event) = self.pending.take() {
            self.forward(event);
        }
    }

    fn observe(&mut self, event: ProgressEvent) {
        let floor = self.forwarded.get(&event.module_id).copied();
        if floor.is_some_and(|last| event.percent <= last) {
            return;
        }

        match self.pending.take() {
            Some(pending) if pending.module_id != event.module_id => self.forward(pending),
            Some(pending) if pending.percent > event.percent => {
                self.pending = Some(pending);
                return;
            }
            _ => {}
        }

        let advanced = event.percent.saturating_sub(floor.unwrap_or(0)) >= self.throttle_step;
        if event.percent == 100 || floor.is_none() || advanced {
            self.forward(event);
        } else {
            self.pending = Some(event);
        }
    }

    fn forward(&mut self, event: ProgressEvent) {
        let last = self.forwarded.get(&event.module_id).copied();
        if last.is_some_and(|last| event.percent < last) {
            return;
        }
        self.tracker.set(&event.module_id, event.percent, &event.label);
        self.forwarded.insert(event.module_id, event.percent);
    }
}

/// Where a clone's stderr lines go.
pub(crate) enum LineMode {
    /// Parse progress and update the tracker.
    Progress(Reporter),
    /// Hand every raw line to the logger.
    Passthrough(Arc<dyn Logger>),
}

/// The reader-thread side of a git invocation: routes lines by mode and
/// keeps the tail of non-progress output for error messages.
pub(crate) struct StderrSink {
    mode: LineMode,
    diagnostics: VecDeque<String>,
}

impl StderrSink {
    pub(crate) fn new(mode: LineMode) -> Self {
        Self {
            mode,
            diagnostics: VecDeque::with_capacity(DIAGNOSTIC_LINES),
        }
    }

    /// Ends the stream, flushing any pending progress. Returns the reporter,
    /// if there was one, and the captured diagnostic text.
    pub(crate) fn finish(self) -> (Option<Reporter>, String) {
        let reporter = match self.mode {
            LineMode::Progress(mut reporter) => {
                reporter.finish();
                Some(reporter)
            }
            LineMode::Passthrough(_) => None,
        };
        (reporter, Vec::from(self.diagnostics).join("\n"))
    }

    fn remember(&mut self, line: &str) {
        if self.diagnostics.len() == DIAGNOSTIC_LINES {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(line.trim_end().to_string());
    }
}

impl LineSink for StderrSink {
    fn line(&mut self, line: &str) {
        let is_progress = match &mut self.mode {
            LineMode::Progress(reporter) => reporter.handle_line(line),
            LineMode::Passthrough(logger) => {
                logger.info(line);
                parse_progress_line(line).is_some()
            }
        };
        if !is_progress {
            trace!("git: {}", line);
            self.remember(line);
        }
    }
}
