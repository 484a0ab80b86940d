//! Terminal sink with a progress bar.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::theme::DeckTheme;
use crate::shell::is_ci;
use super::{OutputMode, StatusSink};

/// Renders pipeline events on the terminal.
///
/// The progress bar is drawn on stderr; status changes become the bar
/// message, warnings and (in verbose mode) child output are printed above it.
pub struct ConsoleSink {
    bar: ProgressBar,
    mode: OutputMode,
    theme: DeckTheme,
}

impl ConsoleSink {
    /// Create a console sink for the given verbosity.
    pub fn new(mode: OutputMode) -> Self {
        Self::with_theme(mode, DeckTheme::detect())
    }

    /// Create a console sink with an explicit theme.
    pub fn with_theme(mode: OutputMode, theme: DeckTheme) -> Self {
        // CI logs get plain status lines instead of redraws.
        let bar = if mode.shows_progress() && !is_ci() {
            let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{bar:24.magenta/dim} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        Self { bar, mode, theme }
    }

    /// Print a final success line and close the bar.
    pub fn finish_success(&self, msg: &str) {
        self.bar.finish_and_clear();
        if self.mode.shows_status() {
            println!("{}", self.theme.format_success(msg));
        }
    }

    /// Print a final error line and leave the bar where it stopped.
    pub fn finish_error(&self, msg: &str) {
        self.bar.abandon();
        eprintln!("{}", self.theme.format_error(msg));
    }
}

impl StatusSink for ConsoleSink {
    fn on_status(&self, text: &str) {
        if self.mode.shows_status() {
            self.bar.set_message(text.to_string());
            if self.bar.is_hidden() {
                println!("{}", self.theme.format_status(text));
            }
        }
    }

    fn on_log_line(&self, text: &str) {
        if self.mode.shows_log_lines() {
            self.print_above(self.theme.format_log(text));
        }
    }

    fn on_progress(&self, current: usize, max: usize) {
        self.bar.set_length(max as u64);
        self.bar.set_position(current as u64);
    }

    fn on_warning(&self, text: &str) {
        if self.mode.shows_status() {
            self.print_above(self.theme.format_warning(text));
        }
    }
}

impl ConsoleSink {
    // A hidden bar swallows println, so fall back to plain stderr.
    fn print_above(&self, line: String) {
        if self.bar.is_hidden() {
            eprintln!("{}", line);
        } else {
            self.bar.println(line);
        }
    }
}
