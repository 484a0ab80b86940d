//! Pipeline run state.

use chrono::{DateTime, Local};
use std::time::Duration;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Pending,
    Success,
    /// A fatal step failed; `stage` is its label.
    Failed { stage: String, message: String },
}

/// Progress and log of the current (or last) run.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub phase: Phase,
    /// Steps completed so far; never decreases within a run.
    pub current_step: usize,
    pub total_steps: usize,
    /// Every log line and warning of the run, in order.
    pub log: Vec<String>,
    pub warnings: Vec<String>,
    pub outcome: Outcome,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
}

impl PipelineState {
    /// Reset for a new run of `total` steps.
    pub fn begin(&mut self, total: usize) {
        *self = Self {
            phase: Phase::Running,
            total_steps: total,
            started_at: Some(Local::now()),
            ..Self::default()
        };
    }

    /// Mark one more step completed.
    pub fn advance(&mut self) {
        if self.current_step < self.total_steps {
            self.current_step += 1;
        }
    }

    pub fn succeed(&mut self) {
        self.current_step = self.total_steps;
        self.phase = Phase::Succeeded;
        self.outcome = Outcome::Success;
        self.finished_at = Some(Local::now());
    }

    /// Stop at the current step with a fatal failure.
    pub fn fail(&mut self, stage: &str, message: &str) {
        self.phase = Phase::Failed;
        self.outcome = Outcome::Failed {
            stage: stage.to_string(),
            message: message.to_string(),
        };
        self.finished_at = Some(Local::now());
    }

    pub fn push_log(&mut self, line: &str) {
        self.log.push(line.to_string());
    }

    pub fn push_warning(&mut self, text: &str) {
        self.warnings.push(text.to_string());
        self.log.push(format!("Warning: {}", text));
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Wall-clock duration of the run, if it has finished.
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        (end - start).to_std().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_resets_previous_run() {
        let mut state = PipelineState::default();
        state.begin(3);
        state.advance();
        state.push_log("line");
        state.fail("Build", "exit 1");

        state.begin(5);
        assert_eq!(state.phase, Phase::Running);
        assert_eq!(state.current_step, 0);
        assert_eq!(state.total_steps, 5);
        assert!(state.log.is_empty());
        assert_eq!(state.outcome, Outcome::Pending);
    }

    #[test]
    fn advance_never_exceeds_total() {
        let mut state = PipelineState::default();
        state.begin(1);
        state.advance();
        state.advance();
        assert_eq!(state.current_step, 1);
    }

    #[test]
    fn succeed_forces_progress_to_max() {
        let mut state = PipelineState::default();
        state.begin(4);
        state.advance();
        state.succeed();
        assert_eq!(state.current_step, 4);
        assert_eq!(state.outcome, Outcome::Success);
        assert!(state.duration().is_some());
    }

    #[test]
    fn fail_keeps_progress() {
        let mut state = PipelineState::default();
        state.begin(4);
        state.advance();
        state.fail("Create Steam shortcut", "Steam executable not found");
        assert_eq!(state.current_step, 1);
        assert_eq!(state.phase, Phase::Failed);
        assert!(matches!(state.outcome, Outcome::Failed { ref stage, .. } if stage == "Create Steam shortcut"));
    }

    #[test]
    fn warnings_are_also_logged() {
        let mut state = PipelineState::default();
        state.push_warning("could not verify certifi");
        assert_eq!(state.warnings, vec!["could not verify certifi"]);
        assert_eq!(state.log, vec!["Warning: could not verify certifi"]);
    }
}
