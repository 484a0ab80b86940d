//! Status and log reporting.
//!
//! The orchestration core never talks to a terminal directly. Everything it
//! wants to show goes through a [`StatusSink`]:
//!
//! - [`ConsoleSink`] renders a progress bar and styled lines on the terminal
//! - [`ChannelSink`] forwards [`SinkEvent`]s over a channel so a front-end can
//!   consume them on its own thread
//! - [`RecordingSink`] captures everything for assertions in tests
//! - [`NullSink`] discards everything
//!
//! # Example
//!
//! ```
//! use deckhand::ui::{RecordingSink, StatusSink};
//!
//! let sink = RecordingSink::new();
//! sink.on_status("Installing Python...");
//! sink.on_progress(1, 4);
//!
//! assert!(sink.has_status("Installing Python"));
//! assert_eq!(sink.last_progress(), Some((1, 4)));
//! ```

pub mod channel;
pub mod console;
pub mod mock;
pub mod output;
pub mod theme;

pub use channel::{ChannelSink, SinkEvent};
pub use console::ConsoleSink;
pub use mock::RecordingSink;
pub use output::OutputMode;
pub use theme::{should_use_colors, DeckTheme};

use std::sync::Arc;

/// Receiver of pipeline status, log lines and progress ticks.
///
/// Every method may be called from whatever thread is driving the pipeline.
/// Implementations that feed a UI with thread affinity must marshal onto
/// their own context.
pub trait StatusSink: Send + Sync {
    /// Replace the headline status text.
    fn on_status(&self, text: &str);

    /// Append one line of log output.
    fn on_log_line(&self, text: &str);

    /// Report progress as `current` of `max` completed steps.
    fn on_progress(&self, current: usize, max: usize);

    /// Report an advisory problem that does not stop the run.
    fn on_warning(&self, text: &str) {
        self.on_log_line(&format!("Warning: {}", text));
    }

    /// The run has ended and a new one may be started.
    fn on_ready(&self) {}
}

impl<T: StatusSink + ?Sized> StatusSink for Arc<T> {
    fn on_status(&self, text: &str) {
        (**self).on_status(text)
    }

    fn on_log_line(&self, text: &str) {
        (**self).on_log_line(text)
    }

    fn on_progress(&self, current: usize, max: usize) {
        (**self).on_progress(current, max)
    }

    fn on_warning(&self, text: &str) {
        (**self).on_warning(text)
    }

    fn on_ready(&self) {
        (**self).on_ready()
    }
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn on_status(&self, _text: &str) {}
    fn on_log_line(&self, _text: &str) {}
    fn on_progress(&self, _current: usize, _max: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_warning_is_a_prefixed_log_line() {
        let sink = RecordingSink::new();
        // Call through the trait default rather than RecordingSink's override.
        struct Forward<'a>(&'a RecordingSink);
        impl StatusSink for Forward<'_> {
            fn on_status(&self, text: &str) {
                self.0.on_status(text)
            }
            fn on_log_line(&self, text: &str) {
                self.0.on_log_line(text)
            }
            fn on_progress(&self, current: usize, max: usize) {
                self.0.on_progress(current, max)
            }
        }

        Forward(&sink).on_warning("pip is outdated");
        assert_eq!(sink.log_lines(), vec!["Warning: pip is outdated".to_string()]);
    }

    #[test]
    fn arc_sink_forwards() {
        let inner = Arc::new(RecordingSink::new());
        let sink: Arc<dyn StatusSink> = inner.clone();
        sink.on_status("hello");
        sink.on_ready();
        assert!(inner.has_status("hello"));
        assert_eq!(inner.ready_count(), 1);
    }

    #[test]
    fn null_sink_accepts_everything() {
        let sink = NullSink;
        sink.on_status("a");
        sink.on_log_line("b");
        sink.on_progress(1, 2);
        sink.on_warning("c");
        sink.on_ready();
    }
}
