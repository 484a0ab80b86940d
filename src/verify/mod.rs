//! Post-install verification with bounded retries.
//!
//! After the build tool installs the Python side of the loader, each
//! package is probed by importing it. A failed probe triggers a fallback
//! install, then another probe, up to `max_attempts` rounds. Verification
//! is advisory: it warns but never fails the pipeline.

use crate::error::InstallerError;
use crate::shell::{CommandTemplate, ProcessInvocation, ProcessRunner};
use crate::ui::StatusSink;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_probe() -> CommandTemplate {
    CommandTemplate::new(python(), ["-c", "import ${artifact}"])
}

fn default_primary() -> CommandTemplate {
    CommandTemplate::new(python(), ["-m", "pip", "install", "${artifact}"])
}

fn default_secondary() -> CommandTemplate {
    CommandTemplate::new(python(), ["-m", "pip", "install", "${package}"])
}

fn default_batch_probe() -> CommandTemplate {
    CommandTemplate::new(python(), ["-c", "import ${artifacts}"])
}

fn default_packages() -> Vec<String> {
    [
        "aiohttp",
        "aiohttp_jinja2",
        "aiohttp_cors",
        "watchdog",
        "certifi",
        "PyInstaller",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn python() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

/// How verification probes and repairs artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPolicy {
    /// Fallback rounds before giving up (at least 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between rounds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Presence probe; `${artifact}` is the import name.
    #[serde(default = "default_probe")]
    pub probe: CommandTemplate,

    /// First repair command; `${artifact}` is the import name.
    #[serde(default = "default_primary")]
    pub primary: CommandTemplate,

    /// Second repair command; `${package}` is the derived package name.
    #[serde(default = "default_secondary")]
    pub secondary: CommandTemplate,

    /// Loads every verified artifact in one process; `${artifacts}` is a
    /// comma separated list.
    #[serde(default = "default_batch_probe")]
    pub batch_probe: CommandTemplate,

    /// Import names to verify, in order.
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            probe: default_probe(),
            primary: default_primary(),
            secondary: default_secondary(),
            batch_probe: default_batch_probe(),
            packages: default_packages(),
        }
    }
}

impl VerifyPolicy {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Package name derived from an import name: lower-cased, `_` becomes `-`.
///
/// ```
/// assert_eq!(deckhand::verify::package_name("aiohttp_jinja2"), "aiohttp-jinja2");
/// assert_eq!(deckhand::verify::package_name("PyInstaller"), "pyinstaller");
/// ```
pub fn package_name(artifact: &str) -> String {
    artifact.to_lowercase().replace('_', "-")
}

/// Outcome of verifying every configured package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub verified: Vec<String>,
    pub failed: Vec<String>,
    /// Whether the verified artifacts load together.
    pub batch_ok: bool,
}

impl VerifyReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty() && self.batch_ok
    }
}

/// Runs probes and repairs.
pub struct Verifier<'a> {
    runner: &'a dyn ProcessRunner,
    policy: &'a VerifyPolicy,
}

impl<'a> Verifier<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, policy: &'a VerifyPolicy) -> Self {
        Self { runner, policy }
    }

    /// Probe `artifact`, repairing it up to `max_attempts` times.
    ///
    /// Never errors: a missing artifact after the last round is reported
    /// as a warning and `false`.
    pub async fn verify(&self, artifact: &str, sink: &dyn StatusSink) -> bool {
        let max = self.policy.max_attempts.max(1);

        for attempt in 1..=max {
            if self.probe(artifact, sink).await {
                return true;
            }

            sink.on_log_line(&format!(
                "{} is not importable (attempt {}/{}), reinstalling",
                artifact, attempt, max
            ));
            if !self.run_template(&self.policy.primary, artifact, sink).await {
                debug!(artifact, "Primary install failed; trying derived package name");
                self.run_template(&self.policy.secondary, artifact, sink).await;
            }

            if attempt < max && !self.policy.retry_delay().is_zero() {
                tokio::time::sleep(self.policy.retry_delay()).await;
            }
        }

        if self.probe(artifact, sink).await {
            return true;
        }

        let failure = InstallerError::VerificationFailed {
            artifact: artifact.to_string(),
            attempts: max,
        };
        warn!(artifact, attempts = max, "Verification failed");
        sink.on_warning(&failure.to_string());
        false
    }

    /// Load all `artifacts` together in one process.
    ///
    /// Failure is only logged.
    pub async fn verify_batch(&self, artifacts: &[String], sink: &dyn StatusSink) -> bool {
        if artifacts.is_empty() {
            return true;
        }

        let vars = self.vars("", artifacts);
        let inv = match self.policy.batch_probe.render(&vars) {
            Ok(inv) => inv.quiet(),
            Err(e) => {
                sink.on_warning(&format!("Batch import check skipped: {}", e));
                return false;
            }
        };

        match self.runner.execute(&inv, sink).await {
            Ok(result) if result.success() => true,
            Ok(result) => {
                for line in &result.stderr {
                    sink.on_log_line(line);
                }
                sink.on_log_line(&format!(
                    "Loading {} together failed; packages may conflict",
                    artifacts.join(", ")
                ));
                false
            }
            Err(e) => {
                sink.on_log_line(&format!("Batch import check could not run: {}", e));
                false
            }
        }
    }

    /// Verify every configured package, then load the survivors together.
    pub async fn verify_all(&self, sink: &dyn StatusSink) -> VerifyReport {
        let mut report = VerifyReport::default();
        for artifact in &self.policy.packages {
            if self.verify(artifact, sink).await {
                report.verified.push(artifact.clone());
            } else {
                report.failed.push(artifact.clone());
            }
        }
        report.batch_ok = self.verify_batch(&report.verified, sink).await;
        report
    }

    async fn probe(&self, artifact: &str, sink: &dyn StatusSink) -> bool {
        match self.render(&self.policy.probe, artifact) {
            Some(inv) => matches!(
                self.runner.execute(&inv.quiet(), sink).await,
                Ok(result) if result.success()
            ),
            None => false,
        }
    }

    async fn run_template(
        &self,
        template: &CommandTemplate,
        artifact: &str,
        sink: &dyn StatusSink,
    ) -> bool {
        let Some(inv) = self.render(template, artifact) else {
            return false;
        };
        match self.runner.execute(&inv, sink).await {
            Ok(result) => result.success(),
            Err(e) => {
                debug!(artifact, error = %e, "Repair command could not run");
                false
            }
        }
    }

    fn render(&self, template: &CommandTemplate, artifact: &str) -> Option<ProcessInvocation> {
        template
            .render(&self.vars(artifact, &[]))
            .map_err(|e| warn!(artifact, error = %e, "Bad verification template"))
            .ok()
    }

    fn vars(&self, artifact: &str, artifacts: &[String]) -> HashMap<&'static str, String> {
        HashMap::from([
            ("artifact", artifact.to_string()),
            ("package", package_name(artifact)),
            ("artifacts", artifacts.join(", ")),
        ])
    }
}
