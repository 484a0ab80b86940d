//! Command dispatching.
//!
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;

use crate::cli::args::{Cli, Commands};
use crate::config::load_config;
use crate::error::Result;
use crate::ui::{DeckTheme, OutputMode};

use super::check::CheckCommand;
use super::install::InstallCommand;
use super::plan::PlanCommand;

/// One CLI subcommand.
pub trait Command {
    fn execute(&self) -> BoxFuture<'_, Result<CommandResult>>;
}

/// Result of command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,

    /// Process exit code: 0 success, 1 failure, 2 already running.
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    /// Another install held the single-flight guard.
    pub fn already_running() -> Self {
        Self::failure(2)
    }
}

/// Loads configuration and routes the CLI subcommand to its implementation.
pub struct CommandDispatcher {
    project_root: PathBuf,
    output_mode: OutputMode,
    theme: DeckTheme,
}

impl CommandDispatcher {
    pub fn new(project_root: PathBuf, output_mode: OutputMode, theme: DeckTheme) -> Self {
        Self {
            project_root,
            output_mode,
            theme,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub async fn dispatch(&self, cli: &Cli) -> Result<CommandResult> {
        let config = load_config(&self.project_root, cli.config.as_deref())?;
        tracing::debug!(release = %config.release, mode = ?config.mode, "Configuration loaded");

        match &cli.command {
            Commands::Install(args) => {
                let cmd = InstallCommand::new(config, args.clone(), self.output_mode, self.theme.clone());
                cmd.execute().await
            }
            Commands::Check => {
                let cmd = CheckCommand::new(config, self.theme.clone());
                cmd.execute().await
            }
            Commands::Plan(args) => {
                let cmd = PlanCommand::new(config, args.clone(), self.theme.clone());
                cmd.execute().await
            }
        }
    }
}
