//! Recording sink for testing.
//!
//! `RecordingSink` implements [`StatusSink`] and captures every event for
//! later assertion.
//!
//! # Example
//!
//! ```
//! use deckhand::ui::{RecordingSink, StatusSink};
//!
//! let sink = RecordingSink::new();
//! sink.on_log_line("Cloning into 'app'...");
//! sink.on_warning("Could not get latest tag");
//!
//! assert!(sink.has_log_line("Cloning"));
//! assert!(sink.has_warning("latest tag"));
//! ```

use std::sync::Mutex;

use super::StatusSink;

#[derive(Debug, Default)]
struct Recorded {
    statuses: Vec<String>,
    log_lines: Vec<String>,
    warnings: Vec<String>,
    progress: Vec<(usize, usize)>,
    ready: usize,
}

/// Sink that records everything it is given.
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<Recorded>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// All status texts, oldest first.
    pub fn statuses(&self) -> Vec<String> {
        self.with(|r| r.statuses.clone())
    }

    /// All log lines, oldest first.
    pub fn log_lines(&self) -> Vec<String> {
        self.with(|r| r.log_lines.clone())
    }

    /// All warnings, oldest first.
    pub fn warnings(&self) -> Vec<String> {
        self.with(|r| r.warnings.clone())
    }

    /// All progress ticks, oldest first.
    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.with(|r| r.progress.clone())
    }

    /// The most recent progress tick.
    pub fn last_progress(&self) -> Option<(usize, usize)> {
        self.with(|r| r.progress.last().copied())
    }

    /// The most recent status text.
    pub fn last_status(&self) -> Option<String> {
        self.with(|r| r.statuses.last().cloned())
    }

    /// How many times `on_ready` was called.
    pub fn ready_count(&self) -> usize {
        self.with(|r| r.ready)
    }

    /// Check if any status contains `text`.
    pub fn has_status(&self, text: &str) -> bool {
        self.with(|r| r.statuses.iter().any(|s| s.contains(text)))
    }

    /// Check if any log line contains `text`.
    pub fn has_log_line(&self, text: &str) -> bool {
        self.with(|r| r.log_lines.iter().any(|s| s.contains(text)))
    }

    /// Check if any warning contains `text`.
    pub fn has_warning(&self, text: &str) -> bool {
        self.with(|r| r.warnings.iter().any(|s| s.contains(text)))
    }
}

impl StatusSink for RecordingSink {
    fn on_status(&self, text: &str) {
        self.with(|r| r.statuses.push(text.to_string()));
    }

    fn on_log_line(&self, text: &str) {
        self.with(|r| r.log_lines.push(text.to_string()));
    }

    fn on_progress(&self, current: usize, max: usize) {
        self.with(|r| r.progress.push((current, max)));
    }

    fn on_warning(&self, text: &str) {
        self.with(|r| r.warnings.push(text.to_string()));
    }

    fn on_ready(&self) {
        self.with(|r| r.ready += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_every_kind_of_event() {
        let sink = RecordingSink::new();
        sink.on_status("one");
        sink.on_status("two");
        sink.on_log_line("line");
        sink.on_warning("careful");
        sink.on_progress(1, 3);
        sink.on_progress(2, 3);
        sink.on_ready();

        assert_eq!(sink.statuses(), vec!["one", "two"]);
        assert_eq!(sink.last_status().as_deref(), Some("two"));
        assert_eq!(sink.log_lines(), vec!["line"]);
        assert_eq!(sink.warnings(), vec!["careful"]);
        assert_eq!(sink.progress(), vec![(1, 3), (2, 3)]);
        assert_eq!(sink.ready_count(), 1);
    }

    #[test]
    fn empty_recorder_has_nothing() {
        let sink = RecordingSink::new();
        assert!(sink.last_progress().is_none());
        assert!(!sink.has_status("x"));
        assert!(!sink.has_warning("x"));
    }
}
