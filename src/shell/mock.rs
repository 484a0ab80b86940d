//! Scripted process runner for testing.
//!
//! `ScriptedRunner` answers invocations from a table of canned replies
//! keyed by command-line prefix, and records every invocation it sees.
//!
//! # Example
//!
//! ```
//! use deckhand::shell::{ProcessInvocation, ProcessRunner, Reply, ScriptedRunner};
//! use deckhand::ui::NullSink;
//!
//! let runner = ScriptedRunner::new();
//! runner.respond("node --version", Reply::stdout(["v18.18.0"]));
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let inv = ProcessInvocation::new("node").arg("--version");
//! let result = rt.block_on(runner.execute(&inv, &NullSink)).unwrap();
//! assert_eq!(result.first_line(), Some("v18.18.0"));
//! assert_eq!(runner.count("node"), 1);
//! ```

use std::sync::Mutex;

use futures::future::BoxFuture;

use super::command::{CaptureMode, ProcessInvocation, ProcessResult, ProcessRunner};
use crate::error::{InstallerError, Result};
use crate::ui::StatusSink;

/// A canned response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Exit {
        code: i32,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },
    /// The program could not be started.
    LaunchError,
    /// Elevation was refused.
    PermissionDenied,
}

impl Reply {
    /// Exit 0 with no output.
    pub fn ok() -> Self {
        Self::exit(0)
    }

    /// Exit with `code` and no output.
    pub fn exit(code: i32) -> Self {
        Self::Exit {
            code,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Exit 0 printing `lines` on stdout.
    pub fn stdout<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exit {
            code: 0,
            stdout: lines.into_iter().map(Into::into).collect(),
            stderr: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Rule {
    prefix: String,
    replies: Vec<Reply>,
    used: usize,
}

impl Rule {
    fn next(&mut self) -> Reply {
        let idx = self.used.min(self.replies.len().saturating_sub(1));
        self.used += 1;
        self.replies
            .get(idx)
            .cloned()
            .unwrap_or_else(Reply::ok)
    }
}

/// Runner that never touches the host.
#[derive(Debug)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<ProcessInvocation>>,
    fallback: Reply,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    /// Every unmatched invocation succeeds silently.
    pub fn new() -> Self {
        Self::with_fallback(Reply::ok())
    }

    /// Unmatched invocations get `fallback`.
    pub fn with_fallback(fallback: Reply) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fallback,
        }
    }

    /// Answer invocations whose command line starts with `prefix`.
    ///
    /// Later rules take precedence over earlier ones.
    pub fn respond(&self, prefix: &str, reply: Reply) {
        self.respond_seq(prefix, vec![reply]);
    }

    /// Answer successive matching invocations with `replies` in turn; the
    /// last reply repeats.
    pub fn respond_seq(&self, prefix: &str, replies: Vec<Reply>) {
        lock(&self.rules).push(Rule {
            prefix: prefix.to_string(),
            replies,
            used: 0,
        });
    }

    /// Command lines seen so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.command_line()).collect()
    }

    /// Full invocations seen so far.
    pub fn invocations(&self) -> Vec<ProcessInvocation> {
        lock(&self.calls).clone()
    }

    /// How many command lines started with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn reply_for(&self, invocation: &ProcessInvocation) -> Reply {
        let line = invocation.command_line();
        let mut rules = lock(&self.rules);
        match rules.iter_mut().rev().find(|r| line.starts_with(&r.prefix)) {
            Some(rule) => rule.next(),
            None => self.fallback.clone(),
        }
    }
}

impl ProcessRunner for ScriptedRunner {
    fn execute<'a>(
        &'a self,
        invocation: &'a ProcessInvocation,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<ProcessResult>> {
        Box::pin(async move {
            lock(&self.calls).push(invocation.clone());

            match self.reply_for(invocation) {
                Reply::LaunchError => Err(InstallerError::Launch {
                    program: invocation.program.clone(),
                    message: "program not found".to_string(),
                }),
                Reply::PermissionDenied => Err(InstallerError::PermissionDenied {
                    program: invocation.program.clone(),
                    message: "elevation refused".to_string(),
                }),
                Reply::Exit {
                    code,
                    stdout,
                    stderr,
                } => {
                    if invocation.capture == CaptureMode::Stream {
                        for line in stdout.iter().chain(stderr.iter()) {
                            sink.on_log_line(line);
                        }
                    }
                    Ok(ProcessResult::new(Some(code), stdout, stderr))
                }
            }
        })
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RecordingSink;

    #[tokio::test]
    async fn unmatched_calls_use_fallback() {
        let runner = ScriptedRunner::with_fallback(Reply::exit(1));
        let sink = RecordingSink::new();
        let result = runner
            .execute(&ProcessInvocation::new("git").arg("--version"), &sink)
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(runner.calls(), vec!["git --version"]);
    }

    #[tokio::test]
    async fn sequence_repeats_last_reply() {
        let runner = ScriptedRunner::new();
        runner.respond_seq("python -c", vec![Reply::exit(1), Reply::ok()]);
        let sink = RecordingSink::new();
        let inv = ProcessInvocation::new("python").args(["-c", "import aiohttp"]);

        let mut codes = Vec::new();
        for _ in 0..3 {
            codes.push(runner.execute(&inv, &sink).await.unwrap().exit_code);
        }
        assert_eq!(codes, vec![Some(1), Some(0), Some(0)]);
    }

    #[tokio::test]
    async fn later_rules_win() {
        let runner = ScriptedRunner::new();
        runner.respond("git", Reply::exit(1));
        runner.respond("git --version", Reply::stdout(["git version 2.43.0"]));
        let sink = RecordingSink::new();

        let result = runner
            .execute(&ProcessInvocation::new("git").arg("--version"), &sink)
            .await
            .unwrap();
        assert!(result.success());
        assert!(sink.has_log_line("2.43.0"));
    }

    #[tokio::test]
    async fn launch_error_reply() {
        let runner = ScriptedRunner::new();
        runner.respond("node", Reply::LaunchError);
        let err = runner
            .execute(&ProcessInvocation::new("node"), &RecordingSink::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::Launch { .. }));
    }
}
