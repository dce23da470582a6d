//! Progress Tracker - shared counter/maximum pair driving the loading bar
//!
//! One tracker is shared by the ingestion units and the exporters of a run.
//! Counters are atomics, so callers only need an `Arc<ProgressTracker>`.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const BAR_WIDTH: u64 = 40;
const NOT_DRAWN: u64 = u64::MAX;

pub struct ProgressTracker {
    description: String,
    max: AtomicU64,
    current: AtomicU64,
    /// Last rendered position in permille, used to skip redundant redraws
    last_drawn: AtomicU64,
    target: Option<Mutex<Box<dyn Write + Send>>>,
}

impl ProgressTracker {
    /// Tracker drawing to stderr when stderr is a terminal, silent otherwise
    pub fn new(description: impl Into<String>) -> Self {
        let target: Option<Box<dyn Write + Send>> = if io::stderr().is_terminal() {
            Some(Box::new(io::stderr()))
        } else {
            None
        };
        Self::build(description.into(), target)
    }

    /// Tracker that only counts
    pub fn hidden() -> Self {
        Self::build(String::new(), None)
    }

    pub fn with_writer(description: impl Into<String>, writer: Box<dyn Write + Send>) -> Self {
        Self::build(description.into(), Some(writer))
    }

    fn build(description: String, target: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            description,
            max: AtomicU64::new(0),
            current: AtomicU64::new(0),
            last_drawn: AtomicU64::new(NOT_DRAWN),
            target: target.map(Mutex::new),
        }
    }

    pub fn set_max(&self, max: u64) {
        self.max.store(max, Ordering::SeqCst);
        self.last_drawn.store(NOT_DRAWN, Ordering::SeqCst);
        self.redraw();
    }

    pub fn advance(&self, n: u64) {
        self.current.fetch_add(n, Ordering::SeqCst);
        self.redraw();
    }

    pub fn position(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::SeqCst)
    }

    /// Back to zero, keeping the maximum
    pub fn reset(&self) {
        self.current.store(0, Ordering::SeqCst);
        self.last_drawn.store(NOT_DRAWN, Ordering::SeqCst);
    }

    /// Fills the bar up to its maximum
    pub fn finish(&self) {
        self.current.fetch_max(self.max(), Ordering::SeqCst);
        self.redraw();
    }

    /// Erases the rendered bar from the terminal line
    pub fn clear(&self) {
        if let Some(target) = &self.target {
            if let Ok(mut out) = target.lock() {
                let _ = write!(out, "\r\x1b[2K");
                let _ = out.flush();
            }
        }
        self.last_drawn.store(NOT_DRAWN, Ordering::SeqCst);
    }

    fn redraw(&self) {
        let Some(target) = &self.target else {
            return;
        };

        let max = self.max();
        let current = if max > 0 { self.position().min(max) } else { self.position() };
        let permille = if max == 0 { 0 } else { current * 1000 / max };
        if self.last_drawn.swap(permille, Ordering::SeqCst) == permille {
            return;
        }

        let filled = if max == 0 { 0 } else { current * BAR_WIDTH / max };
        let mut bar = "=".repeat(filled as usize);
        if filled < BAR_WIDTH {
            bar.push('>');
            bar.push_str(&" ".repeat((BAR_WIDTH - filled - 1) as usize));
        }

        if let Ok(mut out) = target.lock() {
            let _ = write!(out, "\r{} [{}] {}/{}", self.description, bar, current, max);
            let _ = out.flush();
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::hidden()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("description", &self.description)
            .field("current", &self.position())
            .field("max", &self.max())
            .finish()
    }
}
