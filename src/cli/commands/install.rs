//! Install command implementation.
//!
//! The `deckhand install` command runs the build or prebuilt plan.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::cli::args::InstallArgs;
use crate::config::{ensure_valid, DeckhandConfig, InstallMode};
use crate::error::Result;
use crate::fetch::HttpDownloader;
use crate::pipeline::{plan_for, RunReport, Sequencer, StartOutcome, StepContext};
use crate::shell::{PathManager, SystemRunner};
use crate::ui::{ConsoleSink, DeckTheme, OutputMode};

use super::dispatcher::{Command, CommandResult};

/// The install command implementation.
pub struct InstallCommand {
    config: DeckhandConfig,
    args: InstallArgs,
    output_mode: OutputMode,
    theme: DeckTheme,
}

impl InstallCommand {
    pub fn new(
        config: DeckhandConfig,
        args: InstallArgs,
        output_mode: OutputMode,
        theme: DeckTheme,
    ) -> Self {
        Self {
            config,
            args,
            output_mode,
            theme,
        }
    }

    /// The configuration with command-line overrides applied.
    pub fn effective_config(&self) -> Result<DeckhandConfig> {
        let mut config = self.config.clone();
        if let Some(release) = &self.args.release {
            config.release = release.clone();
        }
        if self.args.prebuilt {
            config.mode = InstallMode::Prebuilt;
        }
        if let Some(attempts) = self.args.max_attempts {
            config.verification.max_attempts = attempts;
        }
        ensure_valid(&config)?;
        Ok(config)
    }

    fn report(&self, console: &ConsoleSink, report: &RunReport) -> CommandResult {
        if let Some(message) = report.failure_message() {
            console.finish_error(&message);
            return CommandResult::failure(1);
        }

        console.finish_success(&format!(
            "Decky installed in {:.1}s",
            report.duration.as_secs_f64()
        ));
        if !report.warnings.is_empty() && self.output_mode != OutputMode::Quiet {
            println!(
                "{}",
                self.theme
                    .format_warning(&format!("{} warning(s) during install", report.warnings.len()))
            );
        }
        CommandResult::success()
    }
}

impl Command for InstallCommand {
    fn execute(&self) -> BoxFuture<'_, Result<CommandResult>> {
        Box::pin(async move {
            let config = self.effective_config()?;
            let console = Arc::new(ConsoleSink::with_theme(self.output_mode, self.theme.clone()));

            let context = StepContext::new(
                Arc::new(SystemRunner::new()),
                Arc::new(HttpDownloader::new()?),
                PathManager::from_process(),
            );
            let sequencer = Sequencer::new(plan_for(&config), context, console.clone());
            tracing::info!(steps = sequencer.total_steps(), release = %config.release, "Starting install");

            match sequencer.start().await {
                StartOutcome::Completed(report) => Ok(self.report(&console, &report)),
                StartOutcome::AlreadyRunning => {
                    console.finish_error("An installation is already running");
                    Ok(CommandResult::already_running())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: InstallArgs) -> InstallCommand {
        InstallCommand::new(
            DeckhandConfig::default(),
            args,
            OutputMode::Quiet,
            DeckTheme::plain(),
        )
    }

    #[test]
    fn flags_override_config() {
        let config = command(InstallArgs {
            release: Some("v3.0.2".to_string()),
            prebuilt: true,
            max_attempts: Some(7),
        })
        .effective_config()
        .unwrap();

        assert_eq!(config.release, "v3.0.2");
        assert_eq!(config.mode, InstallMode::Prebuilt);
        assert_eq!(config.verification.max_attempts, 7);
    }

    #[test]
    fn no_flags_keep_config() {
        let config = command(InstallArgs::default()).effective_config().unwrap();
        assert_eq!(config, DeckhandConfig::default());
    }

    #[test]
    fn empty_release_is_rejected() {
        let result = command(InstallArgs {
            release: Some(String::new()),
            ..Default::default()
        })
        .effective_config();
        assert!(result.is_err());
    }
}
