//! Output verbosity.

use std::str::FromStr;

/// Output verbosity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Echo every log line, including child process output.
    Verbose,
    /// Show status, warnings and the progress bar.
    #[default]
    Normal,
    /// Show only the final outcome and errors.
    Quiet,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "verbose" => Ok(Self::Verbose),
            "normal" => Ok(Self::Normal),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("unknown output mode: {}", s)),
        }
    }
}

impl OutputMode {
    /// Check if this mode echoes process output.
    pub fn shows_log_lines(&self) -> bool {
        matches!(self, Self::Verbose)
    }

    /// Check if this mode shows the progress bar.
    pub fn shows_progress(&self) -> bool {
        matches!(self, Self::Verbose | Self::Normal)
    }

    /// Check if this mode shows status and warnings.
    pub fn shows_status(&self) -> bool {
        !matches!(self, Self::Quiet)
    }
}
