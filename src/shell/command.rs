//! External process execution.
//!
//! Every installer step reaches the host through a [`ProcessRunner`]. The
//! system implementation spawns the child with tokio, reads stdout and stderr
//! concurrently line by line, and forwards each line to the [`StatusSink`]
//! while the process is still running.

use crate::error::{InstallerError, Result};
use crate::shell::path::prepend_paths;
use crate::shell::platform::is_elevated;
use crate::ui::StatusSink;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

/// What to do with the child's output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Collect lines and forward each to the sink as it arrives.
    #[default]
    Stream,
    /// Collect lines only; used by probes.
    Capture,
}

/// A single external program run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Directories placed in front of the inherited search path.
    pub path_prepend: Vec<PathBuf>,
    pub elevated: bool,
    pub capture: CaptureMode,
}

impl ProcessInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn prepend_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_prepend.push(dir.into());
        self
    }

    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// Capture output without forwarding it to the sink.
    pub fn quiet(mut self) -> Self {
        self.capture = CaptureMode::Capture;
        self
    }

    /// The program and its arguments joined by spaces.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of a completed process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub duration: Duration,
}

impl ProcessResult {
    /// Build a result from an exit code and captured lines.
    pub fn new(exit_code: Option<i32>, stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration: Duration::ZERO,
        }
    }

    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Captured stdout joined with newlines.
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }

    /// First non-empty stdout line, trimmed.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }

    /// Turn a non-zero exit into `NonZeroExit`.
    pub fn check(self, invocation: &ProcessInvocation) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(InstallerError::NonZeroExit {
                command: invocation.command_line(),
                code: self.exit_code,
            })
        }
    }
}

/// Runs external programs on behalf of installer steps.
///
/// Implementations must deliver each stream's lines to the sink in the order
/// the child wrote them, and must never block the caller's runtime while the
/// child is running.
pub trait ProcessRunner: Send + Sync {
    /// Run `invocation` to completion.
    ///
    /// A non-zero exit is not an error here; callers decide with
    /// [`ProcessResult::check`].
    fn execute<'a>(
        &'a self,
        invocation: &'a ProcessInvocation,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<ProcessResult>>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<T> {
    fn execute<'a>(
        &'a self,
        invocation: &'a ProcessInvocation,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<ProcessResult>> {
        (**self).execute(invocation, sink)
    }
}

/// Runs programs on the host with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, invocation: &ProcessInvocation, sink: &dyn StatusSink) -> Result<ProcessResult> {
        let start = Instant::now();
        let launch = Launch::for_invocation(invocation)?;

        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        if !invocation.path_prepend.is_empty() {
            let inherited = match invocation.env.get("PATH") {
                Some(path) => OsString::from(path),
                None => std::env::var_os("PATH").unwrap_or_default(),
            };
            let path = prepend_paths(&invocation.path_prepend, &inherited).map_err(|e| {
                InstallerError::Launch {
                    program: invocation.program.clone(),
                    message: format!("invalid search path entry: {}", e),
                }
            })?;
            cmd.env("PATH", path);
        }

        debug!(command = %invocation.command_line(), elevated = invocation.elevated, "Spawning process");

        let mut child = cmd
            .spawn()
            .map_err(|e| spawn_error(&invocation.program, e))?;

        let forward = invocation.capture == CaptureMode::Stream;
        let (stdout, stderr) = tokio::join!(
            collect_lines(child.stdout.take(), sink, forward),
            collect_lines(child.stderr.take(), sink, forward),
        );
        let status = child.wait().await?;

        let mut result = ProcessResult::new(status.code(), stdout, stderr);
        result.duration = start.elapsed();

        debug!(
            command = %invocation.command_line(),
            exit_code = ?result.exit_code,
            duration_ms = result.duration.as_millis() as u64,
            "Process finished"
        );

        launch.interpret(invocation, result)
    }
}

impl ProcessRunner for SystemRunner {
    fn execute<'a>(
        &'a self,
        invocation: &'a ProcessInvocation,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<ProcessResult>> {
        Box::pin(self.run(invocation, sink))
    }
}

/// The argv actually handed to the OS, after elevation and shell wrapping.
#[derive(Debug)]
struct Launch {
    program: String,
    args: Vec<String>,
    via_sudo: bool,
    via_cmd: bool,
}

impl Launch {
    fn for_invocation(invocation: &ProcessInvocation) -> Result<Self> {
        let needs_elevation = invocation.elevated && !is_elevated();

        if needs_elevation && cfg!(windows) {
            return Err(InstallerError::PermissionDenied {
                program: invocation.program.clone(),
                message: "administrator rights are required; re-run from an elevated prompt"
                    .to_string(),
            });
        }

        if needs_elevation {
            // Non-interactive: fail instead of prompting for a password.
            let mut args = vec!["-n".to_string(), invocation.program.clone()];
            args.extend(invocation.args.iter().cloned());
            return Ok(Self {
                program: "sudo".to_string(),
                args,
                via_sudo: true,
                via_cmd: false,
            });
        }

        if cfg!(windows) && needs_command_interpreter(&invocation.program) {
            // CreateProcess cannot start batch files directly.
            let mut args = vec!["/C".to_string(), invocation.program.clone()];
            args.extend(invocation.args.iter().cloned());
            return Ok(Self {
                program: "cmd.exe".to_string(),
                args,
                via_sudo: false,
                via_cmd: true,
            });
        }

        Ok(Self {
            program: invocation.program.clone(),
            args: invocation.args.clone(),
            via_sudo: false,
            via_cmd: false,
        })
    }

    fn interpret(&self, invocation: &ProcessInvocation, result: ProcessResult) -> Result<ProcessResult> {
        if self.via_sudo && result.exit_code == Some(1) && sudo_refused(&result.stderr) {
            return Err(InstallerError::PermissionDenied {
                program: invocation.program.clone(),
                message: result.stderr.join(" ").trim().to_string(),
            });
        }

        // cmd.exe reports "not recognized" with exit code 9009.
        if self.via_cmd && result.exit_code == Some(9009) {
            return Err(InstallerError::Launch {
                program: invocation.program.clone(),
                message: "program not found".to_string(),
            });
        }

        Ok(result)
    }
}

/// Node's package managers ship as `.cmd` batch shims on Windows.
const BATCH_SHIMS: &[&str] = &["npm", "npx", "pnpm", "pnpx", "yarn"];

fn needs_command_interpreter(program: &str) -> bool {
    let path = std::path::Path::new(program);
    if path.extension().is_some() {
        return false;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| BATCH_SHIMS.iter().any(|shim| name.eq_ignore_ascii_case(shim)))
}

fn sudo_refused(stderr: &[String]) -> bool {
    stderr.iter().any(|line| {
        line.starts_with("sudo:")
            && (line.contains("a password is required") || line.contains("not in the sudoers"))
    })
}

fn spawn_error(program: &str, err: std::io::Error) -> InstallerError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => InstallerError::PermissionDenied {
            program: program.to_string(),
            message: err.to_string(),
        },
        _ => InstallerError::Launch {
            program: program.to_string(),
            message: err.to_string(),
        },
    }
}

async fn collect_lines<R>(reader: Option<R>, sink: &dyn StatusSink, forward: bool) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Vec::new();
    };

    let mut reader = BufReader::new(reader);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if forward {
                    sink.on_log_line(&line);
                }
                lines.push(line);
            }
        }
    }

    lines
}
