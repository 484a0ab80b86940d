//! Search-path management.
//!
//! Installers frequently add directories to the machine-wide search path
//! (for example `C:\Program Files\nodejs`). Those changes are not visible to
//! a process that is already running, so the installer keeps its own view of
//! the search path and can re-read the machine-level value after an
//! installer ran. The process environment is never modified: every child
//! started through a [`ManagedPathRunner`] gets the current view as its
//! `PATH`.
//!
//! # Example
//!
//! ```
//! use deckhand::shell::{FixedMachinePath, PathManager};
//!
//! let mut paths = PathManager::detached("", FixedMachinePath::none());
//! assert!(paths.ensure("/opt/node/bin"));
//! assert!(!paths.ensure("/opt/node/bin"));
//! assert_eq!(paths.entries().len(), 1);
//! ```

use crate::error::Result;
use crate::shell::command::{ProcessInvocation, ProcessResult, ProcessRunner};
use crate::shell::platform::PATH_SEPARATOR;
use crate::ui::StatusSink;
use futures::future::BoxFuture;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Supplies the machine-level search path, as a freshly started process
/// would inherit it.
pub trait MachinePathSource: Send + Sync {
    fn read(&self) -> Option<OsString>;
}

/// Reads the machine-level search path from the operating system.
///
/// On Windows this asks PowerShell for the `Machine` scoped `Path`; elsewhere
/// the `PATH=` line of `/etc/environment` is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMachinePath;

impl MachinePathSource for SystemMachinePath {
    #[cfg(windows)]
    fn read(&self) -> Option<OsString> {
        let output = std::process::Command::new("powershell")
            .args([
                "-NoProfile",
                "-Command",
                "[Environment]::GetEnvironmentVariable('Path','Machine')",
            ])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!text.is_empty()).then(|| OsString::from(text))
    }

    #[cfg(not(windows))]
    fn read(&self) -> Option<OsString> {
        let content = std::fs::read_to_string("/etc/environment").ok()?;
        parse_environment_file(&content).map(OsString::from)
    }
}

/// A fixed machine path, for tests and detached managers.
#[derive(Debug, Clone, Default)]
pub struct FixedMachinePath(Option<OsString>);

impl FixedMachinePath {
    pub fn new(value: impl Into<OsString>) -> Self {
        Self(Some(value.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl MachinePathSource for FixedMachinePath {
    fn read(&self) -> Option<OsString> {
        self.0.clone()
    }
}

/// Extract the `PATH` value from an `/etc/environment` style file.
#[cfg_attr(windows, allow(dead_code))]
fn parse_environment_file(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("PATH=")?;
        Some(value.trim_matches('"').trim_matches('\'').to_string())
    })
}

/// A read handle on a [`PathManager`]'s current search path.
#[derive(Debug, Clone, Default)]
pub struct SearchPath(Arc<RwLock<OsString>>);

impl SearchPath {
    /// The joined search path as of now.
    pub fn current(&self) -> OsString {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, value: OsString) {
        *self
            .0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }
}

/// The installer's view of the executable search path.
pub struct PathManager {
    entries: Vec<PathBuf>,
    ensured: Vec<PathBuf>,
    shared: SearchPath,
    machine: Box<dyn MachinePathSource>,
}

impl std::fmt::Debug for PathManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathManager")
            .field("entries", &self.entries)
            .field("ensured", &self.ensured)
            .finish()
    }
}

impl PathManager {
    /// Start from this process's `PATH`, refreshing from the OS.
    pub fn from_process() -> Self {
        let current = std::env::var_os("PATH").unwrap_or_default();
        Self::with_source(&current, Box::new(SystemMachinePath))
    }

    /// Start from `initial`, refreshing from `machine`.
    pub fn detached(initial: impl AsRef<OsStr>, machine: impl MachinePathSource + 'static) -> Self {
        Self::with_source(initial.as_ref(), Box::new(machine))
    }

    fn with_source(initial: &OsStr, machine: Box<dyn MachinePathSource>) -> Self {
        let manager = Self {
            entries: split(initial),
            ensured: Vec::new(),
            shared: SearchPath::default(),
            machine,
        };
        manager.publish();
        manager
    }

    /// A handle that always reads the latest search path.
    pub fn search_path(&self) -> SearchPath {
        self.shared.clone()
    }

    /// Current entries, in search order.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Whether `dir` is already on the path.
    pub fn contains(&self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        self.entries.iter().any(|e| same_entry(e, dir))
    }

    /// The entries joined with the platform separator.
    pub fn joined(&self) -> OsString {
        std::env::join_paths(&self.entries).unwrap_or_else(|_| {
            let parts: Vec<String> = self
                .entries
                .iter()
                .map(|e| e.to_string_lossy().into_owned())
                .collect();
            OsString::from(parts.join(&PATH_SEPARATOR.to_string()))
        })
    }

    /// Put `dir` in front of the search path unless it is already present.
    ///
    /// Returns whether the path changed. Calling this twice for the same
    /// directory leaves a single entry.
    pub fn ensure(&mut self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        if !self.ensured.iter().any(|e| same_entry(e, dir)) {
            self.ensured.push(dir.to_path_buf());
        }
        if self.contains(dir) {
            return false;
        }

        debug!(dir = %dir.display(), "Adding directory to search path");
        self.entries.insert(0, dir.to_path_buf());
        self.publish();
        true
    }

    /// Merge the machine-level search path into the current one.
    ///
    /// Directories passed to [`ensure`](Self::ensure) stay first, machine
    /// entries follow, then whatever else was already present. Returns
    /// whether the path changed; if the machine value cannot be read the
    /// path is left as is.
    pub fn refresh(&mut self) -> bool {
        let Some(machine) = self.machine.read() else {
            warn!("Could not read the machine search path; keeping the current one");
            return false;
        };

        let mut merged: Vec<PathBuf> = Vec::new();
        let candidates = self
            .ensured
            .iter()
            .cloned()
            .chain(split(&machine))
            .chain(self.entries.iter().cloned());
        for entry in candidates {
            if !merged.iter().any(|m| same_entry(m, &entry)) {
                merged.push(entry);
            }
        }

        if merged == self.entries {
            return false;
        }

        debug!(entries = merged.len(), "Search path refreshed");
        self.entries = merged;
        self.publish();
        true
    }

    fn publish(&self) {
        match std::env::join_paths(&self.entries) {
            Ok(joined) => self.shared.set(joined),
            Err(e) => warn!(error = %e, "Search path contains an invalid entry; not published"),
        }
    }
}

/// Runs every invocation with a [`PathManager`]'s current search path.
///
/// An invocation that sets `PATH` itself is passed through untouched.
pub struct ManagedPathRunner {
    inner: Arc<dyn ProcessRunner>,
    search_path: SearchPath,
}

impl ManagedPathRunner {
    pub fn new(inner: Arc<dyn ProcessRunner>, search_path: SearchPath) -> Self {
        Self { inner, search_path }
    }

    fn scoped(&self, invocation: &ProcessInvocation) -> Option<ProcessInvocation> {
        if invocation.env.contains_key("PATH") {
            return None;
        }
        let current = self.search_path.current();
        if current.is_empty() {
            return None;
        }
        let mut scoped = invocation.clone();
        scoped
            .env
            .insert("PATH".to_string(), current.to_string_lossy().into_owned());
        Some(scoped)
    }
}

impl ProcessRunner for ManagedPathRunner {
    fn execute<'a>(
        &'a self,
        invocation: &'a ProcessInvocation,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<ProcessResult>> {
        Box::pin(async move {
            match self.scoped(invocation) {
                Some(scoped) => self.inner.execute(&scoped, sink).await,
                None => self.inner.execute(invocation, sink).await,
            }
        })
    }
}

/// Place `overlay` in front of `inherited`, dropping later duplicates.
pub fn prepend_paths(
    overlay: &[PathBuf],
    inherited: &OsStr,
) -> std::result::Result<OsString, std::env::JoinPathsError> {
    let mut parts: Vec<PathBuf> = Vec::new();
    for entry in overlay.iter().cloned().chain(split(inherited)) {
        if !parts.iter().any(|p| same_entry(p, &entry)) {
            parts.push(entry);
        }
    }
    std::env::join_paths(parts)
}

fn split(value: &OsStr) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

/// Compare entries ignoring trailing separators (and case, on Windows).
fn same_entry(a: &Path, b: &Path) -> bool {
    normalize(a) == normalize(b)
}

fn normalize(p: &Path) -> String {
    let s = p.to_string_lossy();
    let trimmed = s.trim_end_matches(['/', '\\']);
    let trimmed = if trimmed.is_empty() { s.as_ref() } else { trimmed };
    if cfg!(windows) {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}
