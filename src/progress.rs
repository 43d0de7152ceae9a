//! # Progress Display
//!
//! A `ProgressTracker` is a keyed set of progress rows. Each row is
//! identified by a module ID (one per clone phase, such as
//! `receiving-objects`) and holds the latest percentage and label for it.
//!
//! Three implementations are provided:
//!
//! - **`NoopTracker`** discards everything.
//! - **`MemoryTracker`** keeps rows in memory, for library callers that want
//!   a snapshot and for tests.
//! - **`TerminalTracker`** draws one `indicatif` bar per row.
//!
//! All of them serialize `set` behind a single mutex, so `progress_rows`,
//! `render` and `clear` always observe a complete row set. A poisoned lock is
//! recovered rather than propagated, since a broken display must never abort
//! a fetch.

use std::sync::{Mutex, MutexGuard, PoisonError};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// One row of the progress display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRow {
    pub id: String,
    pub percent: u8,
    pub label: String,
}

/// A thread-safe, set-by-key progress display.
pub trait ProgressTracker: Send + Sync {
    /// Creates or updates the row for `id`.
    fn set(&self, id: &str, percent: u8, label: &str);

    /// Redraws the display.
    fn render(&self);

    /// Removes every row from the display.
    fn clear(&self);

    /// A snapshot of the current rows, in insertion order.
    fn progress_rows(&self) -> Vec<ProgressRow>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn upsert(rows: &mut Vec<ProgressRow>, id: &str, percent: u8, label: &str) -> usize {
    match rows.iter().position(|row| row.id == id) {
        Some(index) => {
            rows[index].percent = percent;
            rows[index].label = label.to_string();
            index
        }
        None => {
            rows.push(ProgressRow {
                id: id.to_string(),
                percent,
                label: label.to_string(),
            });
            rows.len() - 1
        }
    }
}

/// A tracker that displays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl ProgressTracker for NoopTracker {
    fn set(&self, _id: &str, _percent: u8, _label: &str) {}
    fn render(&self) {}
    fn clear(&self) {}
    fn progress_rows(&self) -> Vec<ProgressRow> {
        Vec::new()
    }
}

/// A tracker that only records rows.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    rows: Mutex<Vec<ProgressRow>>,
    renders: Mutex<usize>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `render` has been called.
    pub fn render_count(&self) -> usize {
        *lock(&self.renders)
    }
}

impl ProgressTracker for MemoryTracker {
    fn set(&self, id: &str, percent: u8, label: &str) {
        upsert(&mut lock(&self.rows), id, percent, label);
    }

    fn render(&self) {
        *lock(&self.renders) += 1;
    }

    fn clear(&self) {
        lock(&self.rows).clear();
    }

    fn progress_rows(&self) -> Vec<ProgressRow> {
        lock(&self.rows).clone()
    }
}

struct TerminalRows {
    rows: Vec<ProgressRow>,
    bars: Vec<ProgressBar>,
}

/// Draws each row as an `indicatif` progress bar on stderr.
pub struct TerminalTracker {
    multi: MultiProgress,
    style: ProgressStyle,
    state: Mutex<TerminalRows>,
}

impl TerminalTracker {
    pub fn new() -> Self {
        Self::with_multi(MultiProgress::new())
    }

    /// Uses an existing `MultiProgress`, e.g. one with a hidden draw target.
    pub fn with_multi(multi: MultiProgress) -> Self {
        let style = ProgressStyle::with_template("{msg:<24} [{bar:30}] {pos:>3}%")
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        Self {
            multi,
            style,
            state: Mutex::new(TerminalRows {
                rows: Vec::new(),
                bars: Vec::new(),
            }),
        }
    }

    /// The underlying `MultiProgress`, for printing lines above the bars.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for TerminalTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker for TerminalTracker {
    fn set(&self, id: &str, percent: u8, label: &str) {
        let mut state = lock(&self.state);
        let index = upsert(&mut state.rows, id, percent, label);
        if index == state.bars.len() {
            let bar = self.multi.add(ProgressBar::new(100));
            bar.set_style(self.style.clone());
            state.bars.push(bar);
        }
        let bar = &state.bars[index];
        bar.set_message(label.to_string());
        bar.set_position(u64::from(percent));
    }

    fn render(&self) {
        let state = lock(&self.state);
        for bar in &state.bars {
            bar.tick();
        }
    }

    fn clear(&self) {
        let mut state = lock(&self.state);
        for bar in state.bars.drain(..) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        state.rows.clear();
        let _ = self.multi.clear();
    }

    fn progress_rows(&self) -> Vec<ProgressRow> {
        lock(&self.state).rows.clone()
    }
}
