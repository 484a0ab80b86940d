//! Plan command implementation.
//!
//! The `deckhand plan` command prints the ordered steps an install would
//! run, marking the ones whose failure does not stop the install.

use futures::future::BoxFuture;

use crate::cli::args::PlanArgs;
use crate::config::DeckhandConfig;
use crate::error::Result;
use crate::pipeline::{plan_for, prebuilt_plan, InstallStep};
use crate::ui::DeckTheme;

use super::dispatcher::{Command, CommandResult};

/// The plan command implementation.
pub struct PlanCommand {
    config: DeckhandConfig,
    args: PlanArgs,
    theme: DeckTheme,
}

impl PlanCommand {
    pub fn new(config: DeckhandConfig, args: PlanArgs, theme: DeckTheme) -> Self {
        Self {
            config,
            args,
            theme,
        }
    }

    pub fn steps(&self) -> Vec<InstallStep> {
        if self.args.prebuilt {
            prebuilt_plan(&self.config)
        } else {
            plan_for(&self.config)
        }
    }

    /// One formatted line per step.
    pub fn lines(&self) -> Vec<String> {
        self.steps()
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let marker = if step.is_fatal() {
                    String::new()
                } else {
                    format!(" {}", self.theme.dim.apply_to("(advisory)"))
                };
                format!("{:>3}. {}{}", i + 1, step.label, marker)
            })
            .collect()
    }
}

impl Command for PlanCommand {
    fn execute(&self) -> BoxFuture<'_, Result<CommandResult>> {
        Box::pin(async move {
            for line in self.lines() {
                println!("{}", line);
            }
            Ok(CommandResult::success())
        })
    }
}
