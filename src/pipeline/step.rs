//! Installation steps and the context they run in.

use crate::error::Result;
use crate::fetch::Downloader;
use crate::shell::{ManagedPathRunner, PathManager, ProcessRunner};
use crate::ui::StatusSink;
use futures::future::BoxFuture;
use std::sync::Arc;
use tempfile::TempPath;

/// Services and mutable state shared by the steps of one run.
pub struct StepContext {
    /// Runs children with `paths` as their search path.
    pub runner: Arc<dyn ProcessRunner>,
    pub downloader: Arc<dyn Downloader>,
    pub paths: PathManager,
    /// A downloaded file handed from one step to the next. Dropping it
    /// deletes the file.
    pub scratch: Option<TempPath>,
}

impl StepContext {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        downloader: Arc<dyn Downloader>,
        paths: PathManager,
    ) -> Self {
        let runner = Arc::new(ManagedPathRunner::new(runner, paths.search_path()));
        Self {
            runner,
            downloader,
            paths,
            scratch: None,
        }
    }

    /// Delete any downloaded file still held.
    pub fn release_scratch(&mut self) {
        if let Some(path) = self.scratch.take() {
            // best effort; the OS temp dir is cleaned eventually anyway
            let _ = path.close();
        }
    }
}

/// Whether a step's failure stops the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Advisory,
}

/// Work performed by one step.
pub trait StepAction: Send + Sync {
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Adapts a synchronous closure to [`StepAction`].
pub struct FnAction<F>(pub F);

impl<F> StepAction for FnAction<F>
where
    F: Fn(&mut StepContext, &dyn StatusSink) -> Result<()> + Send + Sync,
{
    fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        let result = (self.0)(ctx, sink);
        Box::pin(async move { result })
    }
}

/// A labelled step of the pipeline.
pub struct InstallStep {
    pub label: String,
    pub severity: Severity,
    action: Box<dyn StepAction>,
}

impl std::fmt::Debug for InstallStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallStep")
            .field("label", &self.label)
            .field("severity", &self.severity)
            .finish()
    }
}

impl InstallStep {
    pub fn new(label: impl Into<String>, severity: Severity, action: impl StepAction + 'static) -> Self {
        Self {
            label: label.into(),
            severity,
            action: Box::new(action),
        }
    }

    pub fn fatal(label: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self::new(label, Severity::Fatal, action)
    }

    pub fn advisory(label: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self::new(label, Severity::Advisory, action)
    }

    /// A step backed by a synchronous closure.
    pub fn from_fn<F>(label: impl Into<String>, severity: Severity, f: F) -> Self
    where
        F: Fn(&mut StepContext, &dyn StatusSink) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(label, severity, FnAction(f))
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn run<'a>(
        &'a self,
        ctx: &'a mut StepContext,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<()>> {
        self.action.run(ctx, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallerError;
    use crate::fetch::MemoryDownloader;
    use crate::shell::{FixedMachinePath, ScriptedRunner};
    use crate::ui::RecordingSink;

    fn context() -> StepContext {
        StepContext::new(
            Arc::new(ScriptedRunner::new()),
            Arc::new(MemoryDownloader::new()),
            PathManager::detached("", FixedMachinePath::none()),
        )
    }

    #[tokio::test]
    async fn closure_steps_run_with_context() {
        let step = InstallStep::from_fn("Add tools dir", Severity::Fatal, |ctx, sink| {
            ctx.paths.ensure("/opt/tools");
            sink.on_log_line("added");
            Ok(())
        });
        let mut ctx = context();
        let sink = RecordingSink::new();

        step.run(&mut ctx, &sink).await.unwrap();

        assert!(ctx.paths.contains("/opt/tools"));
        assert!(sink.has_log_line("added"));
        assert!(step.is_fatal());
    }

    #[tokio::test]
    async fn later_invocations_see_ensured_directories() {
        let scripted = Arc::new(ScriptedRunner::new());
        let mut ctx = StepContext::new(
            scripted.clone(),
            Arc::new(MemoryDownloader::new()),
            PathManager::detached("/usr/bin", FixedMachinePath::none()),
        );
        ctx.paths.ensure("/opt/nodejs");

        let inv = crate::shell::ProcessInvocation::new("node").arg("--version");
        ctx.runner.execute(&inv, &RecordingSink::new()).await.unwrap();

        let path = scripted.invocations()[0].env.get("PATH").cloned().unwrap();
        assert!(path.starts_with("/opt/nodejs"), "{path}");
    }

    #[tokio::test]
    async fn closure_errors_propagate() {
        let step = InstallStep::from_fn("Broken", Severity::Advisory, |_, _| {
            Err(InstallerError::Other(anyhow::anyhow!("nope")))
        });
        let err = step
            .run(&mut context(), &RecordingSink::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert!(!step.is_fatal());
    }

    #[test]
    fn release_scratch_deletes_file() {
        let mut ctx = context();
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        ctx.scratch = Some(file.into_temp_path());

        ctx.release_scratch();

        assert!(!path.exists());
        assert!(ctx.scratch.is_none());
    }
}
