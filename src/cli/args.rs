//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::ui::OutputMode;

/// Deckhand - installs and wires up the Decky plugin loader.
#[derive(Debug, Parser)]
#[command(name = "deckhand")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides ./deckhand.yml and ~/.deckhand/config.yml)
    #[arg(short, long, global = true, env = "DECKHAND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Echo the output of every command
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.quiet {
            OutputMode::Quiet
        } else if self.verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install the loader
    Install(InstallArgs),

    /// Report which dependencies are present, without installing anything
    Check,

    /// Print the steps an install would run
    Plan(PlanArgs),
}

/// Arguments for the `install` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct InstallArgs {
    /// Release tag or branch to build (overrides config)
    #[arg(short, long)]
    pub release: Option<String>,

    /// Download a prebuilt loader instead of building it
    #[arg(long)]
    pub prebuilt: bool,

    /// Verification attempts per package (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PlanArgs {
    /// Show the prebuilt plan
    #[arg(long)]
    pub prebuilt: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_install_flags() {
        let cli = Cli::parse_from([
            "deckhand",
            "install",
            "--release",
            "v3.0.2",
            "--max-attempts",
            "5",
        ]);
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.release.as_deref(), Some("v3.0.2"));
                assert_eq!(args.max_attempts, Some(5));
                assert!(!args.prebuilt);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["deckhand", "check", "--quiet", "--config", "x.yml"]);
        assert_eq!(cli.output_mode(), OutputMode::Quiet);
        assert_eq!(cli.config, Some(PathBuf::from("x.yml")));
    }

    #[test]
    fn zero_attempts_rejected() {
        let parsed = Cli::try_parse_from(["deckhand", "install", "--max-attempts", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["deckhand", "-v", "-q", "plan"]).is_err());
    }
}
