//! The installation sequencer.
//!
//! A [`Sequencer`] owns an ordered list of [`InstallStep`]s and runs them
//! one after another:
//!
//! ```text
//! Idle ──start──▶ Running ──all steps done──▶ Succeeded
//!                    │
//!                    └──fatal step fails────▶ Failed
//! ```
//!
//! `start` while a run is in flight returns [`StartOutcome::AlreadyRunning`]
//! immediately and leaves the running instance alone.

use crate::error::InstallerError;
use crate::pipeline::flight::SingleFlight;
use crate::pipeline::state::{Outcome, Phase, PipelineState};
use crate::pipeline::step::{InstallStep, StepContext};
use crate::ui::StatusSink;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// What a call to [`Sequencer::start`] did.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    Completed(RunReport),
    /// Another run holds the single-flight guard; nothing was done.
    AlreadyRunning,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub phase: Phase,
    pub outcome: Outcome,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub log: Vec<String>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.phase == Phase::Succeeded
    }

    /// The failure as one human-readable line, if the run failed.
    pub fn failure_message(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Failed { stage, message } => {
                Some(InstallerError::step(stage.as_str(), message).to_string())
            }
            _ => None,
        }
    }
}

impl From<&PipelineState> for RunReport {
    fn from(state: &PipelineState) -> Self {
        Self {
            phase: state.phase,
            outcome: state.outcome.clone(),
            completed_steps: state.current_step,
            total_steps: state.total_steps,
            log: state.log.clone(),
            warnings: state.warnings.clone(),
            duration: state.duration().unwrap_or_default(),
        }
    }
}

/// Runs installation steps in order under a single-flight guard.
pub struct Sequencer {
    steps: Vec<InstallStep>,
    context: tokio::sync::Mutex<StepContext>,
    state: Mutex<PipelineState>,
    flight: SingleFlight,
    sink: Arc<dyn StatusSink>,
}

impl Sequencer {
    pub fn new(steps: Vec<InstallStep>, context: StepContext, sink: Arc<dyn StatusSink>) -> Self {
        let state = PipelineState {
            total_steps: steps.len(),
            ..PipelineState::default()
        };
        Self {
            steps,
            context: tokio::sync::Mutex::new(context),
            state: Mutex::new(state),
            flight: SingleFlight::new(),
            sink,
        }
    }

    /// Step labels in run order.
    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn steps(&self) -> &[InstallStep] {
        &self.steps
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// A snapshot of the current (or last) run.
    pub fn state(&self) -> PipelineState {
        self.with_state(|s| s.clone())
    }

    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    /// Run every step, unless a run is already in progress.
    pub async fn start(&self) -> StartOutcome {
        let Some(_flight) = self.flight.try_acquire(self.sink.as_ref()) else {
            info!("Installation already running; ignoring start request");
            return StartOutcome::AlreadyRunning;
        };

        let total = self.steps.len();
        self.with_state(|s| s.begin(total));
        let sink = TeeSink {
            inner: self.sink.as_ref(),
            state: &self.state,
        };
        sink.on_progress(0, total);

        let mut ctx = self.context.lock().await;
        ctx.release_scratch();

        for (index, step) in self.steps.iter().enumerate() {
            info!(step = %step.label, index = index + 1, total, "Step starting");
            sink.on_status(&format!("{}...", step.label));

            let (result, panicked) = match AssertUnwindSafe(step.run(&mut ctx, &sink))
                .catch_unwind()
                .await
            {
                Ok(result) => (result, false),
                Err(payload) => (Err(panic_error(payload)), true),
            };

            if let Err(e) = result {
                if panicked || (step.is_fatal() && !e.is_advisory()) {
                    let failure = InstallerError::step(step.label.as_str(), &e);
                    warn!(step = %step.label, error = %e, "Fatal step failed");
                    sink.on_log_line(&failure.to_string());
                    self.with_state(|s| s.fail(&step.label, &e.to_string()));
                    sink.on_status(&format!("Failed: {}", failure));
                    ctx.release_scratch();
                    return StartOutcome::Completed(self.report());
                }

                warn!(step = %step.label, error = %e, "Advisory step failed");
                sink.on_warning(&format!("{}: {}", step.label, e));
            }

            let current = self.with_state(|s| {
                s.advance();
                s.current_step
            });
            sink.on_progress(current, total);
        }

        ctx.release_scratch();
        self.with_state(|s| s.succeed());
        sink.on_progress(total, total);
        sink.on_status("Installation complete");
        info!(total, "Installation complete");

        StartOutcome::Completed(self.report())
    }

    fn report(&self) -> RunReport {
        self.with_state(|s| RunReport::from(&*s))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PipelineState) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

/// A panicking step fails the run like a fatal error.
fn panic_error(payload: Box<dyn Any + Send>) -> InstallerError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    InstallerError::Other(anyhow::anyhow!("step panicked: {}", message))
}

/// Forwards to the caller's sink and records log lines into the run state.
struct TeeSink<'a> {
    inner: &'a dyn StatusSink,
    state: &'a Mutex<PipelineState>,
}

impl TeeSink<'_> {
    fn record(&self, f: impl FnOnce(&mut PipelineState)) {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}

impl StatusSink for TeeSink<'_> {
    fn on_status(&self, text: &str) {
        self.inner.on_status(text);
    }

    fn on_log_line(&self, text: &str) {
        self.record(|s| s.push_log(text));
        self.inner.on_log_line(text);
    }

    fn on_progress(&self, current: usize, max: usize) {
        self.inner.on_progress(current, max);
    }

    fn on_warning(&self, text: &str) {
        self.record(|s| s.push_warning(text));
        self.inner.on_warning(text);
    }

    fn on_ready(&self) {
        self.inner.on_ready();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::fetch::MemoryDownloader;
    use crate::pipeline::step::{Severity, StepAction};
    use crate::shell::{FixedMachinePath, PathManager, ScriptedRunner};
    use crate::ui::RecordingSink;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn context() -> StepContext {
        StepContext::new(
            Arc::new(ScriptedRunner::new()),
            Arc::new(MemoryDownloader::new()),
            PathManager::detached("", FixedMachinePath::none()),
        )
    }

    fn counting(label: &str, severity: Severity, calls: &Arc<AtomicUsize>, fail: bool) -> InstallStep {
        let calls = Arc::clone(calls);
        let label_owned = label.to_string();
        InstallStep::from_fn(label, severity, move |_, sink| {
            calls.fetch_add(1, Ordering::SeqCst);
            sink.on_log_line(&format!("ran {}", label_owned));
            if fail {
                Err(InstallerError::NonZeroExit {
                    command: "build".to_string(),
                    code: Some(1),
                })
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn all_steps_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(RecordingSink::new());
        let seq = Sequencer::new(
            vec![
                counting("One", Severity::Fatal, &calls, false),
                counting("Two", Severity::Fatal, &calls, false),
                counting("Three", Severity::Advisory, &calls, false),
            ],
            context(),
            sink.clone(),
        );

        let StartOutcome::Completed(report) = seq.start().await else {
            panic!("expected a completed run");
        };

        assert!(report.success());
        assert_eq!(report.completed_steps, 3);
        assert_eq!(sink.last_progress(), Some((3, 3)));
        assert_eq!(sink.last_status().as_deref(), Some("Installation complete"));
        assert_eq!(report.log, vec!["ran One", "ran Two", "ran Three"]);
        assert_eq!(sink.ready_count(), 1);
        assert!(!seq.is_running());
    }

    #[tokio::test]
    async fn fatal_failure_skips_remaining_steps() {
        let calls = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(RecordingSink::new());
        let seq = Sequencer::new(
            vec![
                counting("Prepare", Severity::Fatal, &calls, false),
                counting("Build loader", Severity::Fatal, &calls, true),
                counting("Autostart", Severity::Fatal, &after, false),
            ],
            context(),
            sink.clone(),
        );

        let StartOutcome::Completed(report) = seq.start().await else {
            panic!("expected a completed run");
        };

        assert_eq!(report.phase, Phase::Failed);
        assert_eq!(report.completed_steps, 1);
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert!(report
            .failure_message()
            .unwrap()
            .starts_with("Build loader: Command failed"));
        assert!(sink.last_status().unwrap().contains("Build loader"));
        assert_eq!(sink.last_progress(), Some((1, 3)));
        assert_eq!(sink.ready_count(), 1);
    }

    #[tokio::test]
    async fn advisory_failure_is_a_warning_and_counts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(RecordingSink::new());
        let seq = Sequencer::new(
            vec![
                counting("Verify packages", Severity::Advisory, &calls, true),
                counting("Build", Severity::Fatal, &calls, false),
            ],
            context(),
            sink.clone(),
        );

        let StartOutcome::Completed(report) = seq.start().await else {
            panic!("expected a completed run");
        };

        assert!(report.success());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(sink.has_warning("Verify packages"));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(sink.progress(), vec![(0, 2), (1, 2), (2, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn verification_errors_never_abort_even_in_fatal_steps() {
        let sink = Arc::new(RecordingSink::new());
        let seq = Sequencer::new(
            vec![InstallStep::from_fn("Verify", Severity::Fatal, |_, _| {
                Err(InstallerError::VerificationFailed {
                    artifact: "certifi".to_string(),
                    attempts: 3,
                })
            })],
            context(),
            sink.clone(),
        );

        let StartOutcome::Completed(report) = seq.start().await else {
            panic!("expected a completed run");
        };
        assert!(report.success());
        assert!(sink.has_warning("certifi"));
    }

    #[tokio::test]
    async fn panicking_step_fails_the_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(RecordingSink::new());
        let seq = Sequencer::new(
            vec![
                InstallStep::from_fn("Explode", Severity::Advisory, |_, _| {
                    panic!("boom");
                }),
                counting("After", Severity::Fatal, &calls, false),
            ],
            context(),
            sink.clone(),
        );

        let StartOutcome::Completed(report) = seq.start().await else {
            panic!("expected a completed run");
        };

        assert_eq!(report.phase, Phase::Failed);
        assert_eq!(seq.state().phase, Phase::Failed);
        assert!(!seq.state().is_running());
        assert!(!seq.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report.failure_message().unwrap().contains("step panicked: boom"));
        assert_eq!(sink.ready_count(), 1);
    }

    #[tokio::test]
    async fn rerun_resets_progress() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(RecordingSink::new());
        let seq = Sequencer::new(
            vec![counting("Only", Severity::Fatal, &calls, false)],
            context(),
            sink.clone(),
        );

        seq.start().await;
        seq.start().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(seq.state().current_step, 1);
        assert_eq!(seq.state().log, vec!["ran Only"]);
        assert_eq!(sink.ready_count(), 2);
    }

    struct Gate {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl StepAction for Gate {
        fn run<'a>(
            &'a self,
            _ctx: &'a mut StepContext,
            _sink: &'a dyn StatusSink,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn second_start_while_running_is_ignored() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sink = Arc::new(RecordingSink::new());
        let seq = Arc::new(Sequencer::new(
            vec![InstallStep::fatal(
                "Wait",
                Gate {
                    entered: Arc::clone(&entered),
                    release: Arc::clone(&release),
                },
            )],
            context(),
            sink.clone(),
        ));

        let first = tokio::spawn({
            let seq = Arc::clone(&seq);
            async move { seq.start().await }
        });
        entered.notified().await;

        assert!(matches!(seq.start().await, StartOutcome::AlreadyRunning));
        assert_eq!(seq.state().phase, Phase::Running);
        assert_eq!(sink.ready_count(), 0);

        release.notify_one();
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, StartOutcome::Completed(ref r) if r.success()));
        assert_eq!(sink.ready_count(), 1);
    }
}
