//! Check command implementation.
//!
//! The `deckhand check` command probes every configured dependency and
//! reports what it found. Nothing is installed.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::config::DeckhandConfig;
use crate::error::{InstallerError, Result};
use crate::fetch::HttpDownloader;
use crate::requirements::{DependencySpec, Presence, Resolver};
use crate::shell::{ProcessRunner, SystemRunner};
use crate::ui::{DeckTheme, NullSink};

use super::dispatcher::{Command, CommandResult};

/// The check command implementation.
pub struct CheckCommand {
    config: DeckhandConfig,
    theme: DeckTheme,
    runner: Arc<dyn ProcessRunner>,
}

impl CheckCommand {
    pub fn new(config: DeckhandConfig, theme: DeckTheme) -> Self {
        Self::with_runner(config, theme, Arc::new(SystemRunner::new()))
    }

    pub fn with_runner(
        config: DeckhandConfig,
        theme: DeckTheme,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            theme,
            runner,
        }
    }

    /// Probe every dependency in declaration order.
    pub async fn probe_all(&self) -> Result<Vec<(&DependencySpec, Presence)>> {
        let downloader = HttpDownloader::new()?;
        let resolver = Resolver::new(
            self.runner.as_ref(),
            &downloader,
            &self.config.package_manager,
        );

        let mut found = Vec::with_capacity(self.config.dependencies.len());
        for spec in &self.config.dependencies {
            found.push((spec, resolver.probe(spec, &NullSink).await));
        }
        Ok(found)
    }

    fn describe(&self, spec: &DependencySpec, presence: &Presence) -> String {
        match presence {
            Presence::Present(Some(version)) => {
                self.theme.format_success(&format!("{} {}", spec.name, version))
            }
            Presence::Present(None) => self.theme.format_success(&spec.name),
            Presence::WrongVersion(version) => {
                let mismatch = InstallerError::VersionMismatch {
                    name: spec.name.clone(),
                    found: version.to_string(),
                    required: spec.version.map(|v| v.to_string()).unwrap_or_default(),
                };
                self.theme.format_warning(&mismatch.to_string())
            }
            Presence::Missing if spec.required => {
                self.theme.format_error(&format!("{} not found", spec.name))
            }
            Presence::Missing => self
                .theme
                .format_warning(&format!("{} not found (optional)", spec.name)),
        }
    }
}

impl Command for CheckCommand {
    fn execute(&self) -> BoxFuture<'_, Result<CommandResult>> {
        Box::pin(async move {
            let results = self.probe_all().await?;
            let mut missing_required = 0;
            for (spec, presence) in &results {
                println!("  {}", self.describe(spec, presence));
                if spec.required && !presence.is_present() {
                    missing_required += 1;
                }
            }

            if missing_required == 0 {
                Ok(CommandResult::success())
            } else {
                tracing::debug!(missing_required, "Dependencies missing");
                Ok(CommandResult::failure(1))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::VersionRequirement;
    use crate::shell::{Reply, ScriptedRunner};

    fn config() -> DeckhandConfig {
        DeckhandConfig {
            dependencies: vec![
                DependencySpec::new("Python", "python3", &["python3", "--version"]),
                DependencySpec::new("Node.js", "nodejs", &["node", "--version"])
                    .with_version(VersionRequirement::new(18, 18)),
                DependencySpec::new("Git", "git", &["git", "--version"]).optional(),
            ],
            ..Default::default()
        }
    }

    fn runner() -> Arc<ScriptedRunner> {
        let runner = ScriptedRunner::with_fallback(Reply::exit(127));
        runner.respond("python3 --version", Reply::stdout(["Python 3.11.4"]));
        runner.respond("node --version", Reply::stdout(["v20.1.0"]));
        Arc::new(runner)
    }

    #[tokio::test]
    async fn probes_in_declaration_order() {
        let runner = runner();
        let cmd = CheckCommand::with_runner(config(), DeckTheme::plain(), runner.clone());

        let results = cmd.probe_all().await.unwrap();
        let names: Vec<_> = results.iter().map(|(s, _)| s.name.as_str()).collect();
        assert_eq!(names, ["Python", "Node.js", "Git"]);
        assert_eq!(
            runner.calls(),
            ["python3 --version", "node --version", "git --version"]
        );
    }

    #[tokio::test]
    async fn describes_each_outcome() {
        let cmd = CheckCommand::with_runner(config(), DeckTheme::plain(), runner());
        let results = cmd.probe_all().await.unwrap();
        let lines: Vec<_> = results.iter().map(|(s, p)| cmd.describe(s, p)).collect();

        assert!(lines[0].contains("Python 3.11.4"));
        assert!(lines[1].contains("Node.js 20.1.0 found, but 18.18.x is required"));
        assert!(lines[2].contains("Git not found (optional)"));
    }

    #[tokio::test]
    async fn missing_required_dependency_fails() {
        let cmd = CheckCommand::with_runner(config(), DeckTheme::plain(), runner());
        let result = cmd.execute().await.unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn all_present_succeeds() {
        let runner = ScriptedRunner::with_fallback(Reply::stdout(["v18.18.2"]));
        let cmd = CheckCommand::with_runner(config(), DeckTheme::plain(), Arc::new(runner));
        assert!(cmd.execute().await.unwrap().success);
    }
}
